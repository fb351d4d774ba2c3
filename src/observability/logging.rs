//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Pretty, verbose output in debug mode; JSON lines otherwise
//! - Allow a `RUST_LOG`-style override via the environment

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Must run before anything logs; called once from `main` right after the
/// configuration is loaded.
pub fn init_logging(debug: bool) {
    let default_filter = if debug {
        "gatehouse=debug,tower_http=debug"
    } else {
        "gatehouse=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);

    if debug {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}
