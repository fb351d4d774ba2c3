//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout: JSON in production, pretty in debug)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all log lines via the tracing middleware
//! - Metrics are cheap (atomic increments); the exporter is opt-in

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
