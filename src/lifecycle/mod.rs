//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Logging → Store + migrations → Guards → Routes
//!
//! Shutdown (shutdown.rs):
//!     SIGINT received → Broadcast → Stop accepting → Drain → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, then guards, then listeners
//! - Shutdown is a broadcast so tests can trigger it without signals

pub mod shutdown;

pub use shutdown::Shutdown;
