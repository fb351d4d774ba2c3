//! Security subsystem: the request-guard pipeline.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (check declared body size)
//!     → rate_limit.rs (check per-IP fixed-window limits)
//!     → pow.rs (verify proof-of-work solution, register only)
//!     → Pass to handler domain logic
//! ```
//!
//! # Design Decisions
//! - Guards run in order, cheapest first; the first rejection wins
//! - Fail closed: an error while evaluating a guard is a rejection
//! - Client identity comes from the connection peer address only;
//!   forwarded headers are never trusted

pub mod limits;
pub mod pow;
pub mod rate_limit;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::header::CONTENT_LENGTH;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::http::response::ApiError;
use crate::observability::metrics;

/// Request-scoped facts a guard may inspect.
///
/// Built once per request from the head of the request, before the body is
/// read. Guards never see the body itself.
pub struct GuardContext<'a> {
    /// Peer address of the connection, when known. `None` means the
    /// connection info was unavailable (e.g. in-process test routers).
    pub ip: Option<IpAddr>,
    pub headers: &'a HeaderMap,
    /// Declared `Content-Length`, if the client sent a parseable one.
    pub content_length: Option<u64>,
}

impl<'a> GuardContext<'a> {
    pub fn from_parts(parts: &'a Parts) -> Self {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let content_length = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        Self {
            ip,
            headers: &parts.headers,
            content_length,
        }
    }
}

/// A request-time check that may reject a request before domain logic runs.
pub trait Guard: Send + Sync {
    fn name(&self) -> &'static str;

    /// Allow (`Ok`) or reject with the response-determining error.
    fn check(&self, ctx: &GuardContext<'_>) -> Result<(), ApiError>;
}

/// An ordered, short-circuiting chain of guards for one route.
#[derive(Clone, Default)]
pub struct GuardChain {
    guards: Vec<Arc<dyn Guard>>,
}

impl GuardChain {
    pub fn new(guards: Vec<Arc<dyn Guard>>) -> Self {
        Self { guards }
    }

    /// Run every guard in order; the first rejection stops the chain.
    pub fn check(&self, ctx: &GuardContext<'_>) -> Result<(), ApiError> {
        for guard in &self.guards {
            if let Err(rejection) = guard.check(ctx) {
                tracing::warn!(
                    guard = guard.name(),
                    ip = ?ctx.ip,
                    "request rejected by guard"
                );
                metrics::record_guard_rejection(guard.name());
                return Err(rejection);
            }
        }
        Ok(())
    }
}

/// A route's guard chain plus the byte ceiling its handler must apply when
/// draining the body stream.
pub struct RouteProtection {
    pub chain: GuardChain,
    /// Cap for the streamed body read; `usize::MAX` when unlimited.
    pub body_cap: usize,
}

impl RouteProtection {
    pub fn new(chain: GuardChain, body_cap: usize) -> Self {
        Self { chain, body_cap }
    }

    /// A chain with no guards and no body cap.
    pub fn open() -> Self {
        Self {
            chain: GuardChain::default(),
            body_cap: usize::MAX,
        }
    }
}
