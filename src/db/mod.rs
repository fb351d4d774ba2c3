//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers / admin CLI
//!     → store.rs (pooled SQLite access, typed queries)
//!     → migrations/ (embedded schema, applied at startup)
//! ```
//!
//! # Design Decisions
//! - One pool shared by all handlers; SQLite serializes writers itself
//! - Registration runs in a transaction with an early write-intent touch
//! - Timestamps are unix seconds throughout (no timezone ambiguity)

pub mod store;

pub use store::{RegisterOutcome, Session, Store, User};
