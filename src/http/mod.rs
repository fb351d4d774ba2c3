//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, route wiring)
//!     → request.rs (request ID assignment)
//!     → guard chain (security subsystem)
//!     → account handlers
//!     → response.rs (error taxonomy, uniform JSON envelope)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer};
