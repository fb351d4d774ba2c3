//! Per-IP fixed-window rate limiting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::schema::RateLimitSection;
use crate::http::response::ApiError;
use crate::security::{Guard, GuardContext};

const DEFAULT_MAX_REQUESTS: u32 = 10;
const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

struct Window {
    started: Instant,
    counts: HashMap<String, u32>,
}

/// Fixed-window counter over string keys.
///
/// All counts belong to the current window. When the window elapses the whole
/// map is replaced with an empty one, so memory is reclaimed at every window
/// boundary no matter how many distinct keys a burst produced. The trade-off
/// is boundary bursting: up to 2x the threshold can land in a short span
/// straddling a window edge.
pub struct FixedWindowCounter {
    max_requests: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl FixedWindowCounter {
    /// Non-positive parameters fall back to the built-in defaults rather than
    /// producing a counter that admits nothing (or everything).
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let max_requests = if max_requests == 0 {
            DEFAULT_MAX_REQUESTS
        } else {
            max_requests
        };
        let window = if window.is_zero() { DEFAULT_WINDOW } else { window };

        Self {
            max_requests,
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                counts: HashMap::new(),
            }),
        }
    }

    /// Record one request for `key` and report whether it is within the limit.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().expect("counter mutex poisoned");

        // Expired window: discard every stored count at once.
        if now.duration_since(state.started) >= self.window {
            state.counts = HashMap::new();
            state.started = now;
        }

        let count = state.counts.get(key).copied().unwrap_or(0);
        if count >= self.max_requests {
            return false;
        }
        state.counts.insert(key.to_string(), count + 1);
        true
    }

    /// Current count for a key and the window start. Debug/test use.
    pub fn inspect(&self, key: &str) -> (Option<u32>, Instant) {
        let state = self.state.lock().expect("counter mutex poisoned");
        (state.counts.get(key).copied(), state.started)
    }

    /// Number of keys tracked in the current window.
    pub fn tracked_keys(&self) -> usize {
        let state = self.state.lock().expect("counter mutex poisoned");
        state.counts.len()
    }
}

/// Gates a route by the connection peer IP.
pub struct IpRateGuard {
    enabled: bool,
    counter: FixedWindowCounter,
}

impl IpRateGuard {
    pub fn from_config(section: &RateLimitSection) -> Self {
        Self {
            enabled: section.enable,
            counter: FixedWindowCounter::new(
                section.max_requests,
                Duration::from_millis(section.window_ms),
            ),
        }
    }
}

impl Guard for IpRateGuard {
    fn name(&self) -> &'static str {
        "ip_rate"
    }

    fn check(&self, ctx: &GuardContext<'_>) -> Result<(), ApiError> {
        if !self.enabled {
            return Ok(());
        }
        // Policy: a request without usable connection info is allowed, not
        // rejected. Identity comes from the peer address only; when that is
        // missing there is no key worth counting.
        let Some(ip) = ctx.ip else {
            return Ok(());
        };
        if self.counter.allow(&ip.to_string()) {
            Ok(())
        } else {
            Err(ApiError::RateLimited)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn threshold_is_exact() {
        let counter = FixedWindowCounter::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(counter.allow("10.0.0.5"));
        }
        assert!(!counter.allow("10.0.0.5"));
    }

    #[test]
    fn keys_are_independent() {
        let counter = FixedWindowCounter::new(1, Duration::from_secs(60));

        assert!(counter.allow("10.0.0.1"));
        assert!(!counter.allow("10.0.0.1"));
        assert!(counter.allow("10.0.0.2"));
    }

    #[test]
    fn window_rollover_resets_all_counts() {
        let counter = FixedWindowCounter::new(2, Duration::from_millis(40));

        assert!(counter.allow("a"));
        assert!(counter.allow("a"));
        assert!(!counter.allow("a"));

        std::thread::sleep(Duration::from_millis(50));

        // Rollover happens on the next call and discards the old map.
        assert!(counter.allow("a"));
        assert_eq!(counter.tracked_keys(), 1);
    }

    #[test]
    fn burst_of_distinct_keys_is_reclaimed() {
        let counter = FixedWindowCounter::new(5, Duration::from_millis(40));

        for i in 0..100 {
            counter.allow(&format!("10.0.{}.{}", i / 256, i % 256));
        }
        assert_eq!(counter.tracked_keys(), 100);

        std::thread::sleep(Duration::from_millis(50));
        counter.allow("fresh");
        assert_eq!(counter.tracked_keys(), 1);
    }

    #[test]
    fn zero_params_fall_back_to_defaults() {
        let counter = FixedWindowCounter::new(0, Duration::ZERO);
        assert!(counter.allow("k"));
    }

    #[test]
    fn disabled_guard_allows_everything() {
        let guard = IpRateGuard::from_config(&RateLimitSection {
            enable: false,
            max_requests: 1,
            window_ms: 60_000,
        });
        let headers = HeaderMap::new();
        let ctx = GuardContext {
            ip: Some("10.0.0.1".parse().unwrap()),
            headers: &headers,
            content_length: None,
        };

        for _ in 0..10 {
            assert!(guard.check(&ctx).is_ok());
        }
    }

    #[test]
    fn missing_ip_fails_open() {
        let guard = IpRateGuard::from_config(&RateLimitSection {
            enable: true,
            max_requests: 1,
            window_ms: 60_000,
        });
        let headers = HeaderMap::new();
        let ctx = GuardContext {
            ip: None,
            headers: &headers,
            content_length: None,
        };

        for _ in 0..10 {
            assert!(guard.check(&ctx).is_ok());
        }
    }

    #[test]
    fn enabled_guard_denies_over_threshold() {
        let guard = IpRateGuard::from_config(&RateLimitSection {
            enable: true,
            max_requests: 2,
            window_ms: 60_000,
        });
        let headers = HeaderMap::new();
        let ctx = GuardContext {
            ip: Some("10.0.0.1".parse().unwrap()),
            headers: &headers,
            content_length: None,
        };

        assert!(guard.check(&ctx).is_ok());
        assert!(guard.check(&ctx).is_ok());
        assert!(matches!(guard.check(&ctx), Err(ApiError::RateLimited)));
    }
}
