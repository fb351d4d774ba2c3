//! Request body size limits.

use crate::config::schema::BodyLimitSection;
use crate::http::response::ApiError;
use crate::security::{Guard, GuardContext};

/// Ceiling applied when a section is enabled but configured with a
/// non-positive byte count.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024;

/// Clamp a configured ceiling to something protective.
///
/// Zero or negative never means "unlimited": an operator who enabled the
/// limiter but mistyped the number still gets the default cap.
pub fn normalize_body_limit(raw: i64) -> u64 {
    if raw <= 0 {
        DEFAULT_MAX_BODY_BYTES
    } else {
        raw as u64
    }
}

/// Rejects requests whose declared payload exceeds the ceiling.
///
/// The declared `Content-Length` is checked here, before the body is read;
/// the handler applies the same ceiling to the streamed read so clients that
/// lie about (or omit) the length are cut off without the JSON decoder ever
/// running.
pub struct BodySizeGuard {
    enabled: bool,
    max_bytes: u64,
}

impl BodySizeGuard {
    pub fn from_config(section: &BodyLimitSection) -> Self {
        Self {
            enabled: section.enable,
            max_bytes: normalize_body_limit(section.max_body_bytes),
        }
    }

    /// Ceiling for the streamed body read; `usize::MAX` when disabled.
    pub fn stream_cap(&self) -> usize {
        if self.enabled {
            usize::try_from(self.max_bytes).unwrap_or(usize::MAX)
        } else {
            usize::MAX
        }
    }
}

impl Guard for BodySizeGuard {
    fn name(&self) -> &'static str {
        "body_size"
    }

    fn check(&self, ctx: &GuardContext<'_>) -> Result<(), ApiError> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(declared) = ctx.content_length {
            if declared > self.max_bytes {
                return Err(ApiError::RateLimited);
            }
        }
        Ok(())
    }
}
