//! Gatehouse: an account service behind a request-guard pipeline.
//!
//! Registration, login, logout, and profile retrieval over HTTP, backed by
//! SQLite. Every route sits behind an ordered chain of guards (body size,
//! per-IP rate limiting, proof-of-work) that runs before any handler touches
//! the database; authenticated requests are resolved through opaque session
//! cookies instead of password re-entry.

pub mod accounts;
pub mod config;
pub mod db;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::Config;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
