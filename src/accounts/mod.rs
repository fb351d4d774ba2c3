//! Account domain: registration, login, sessions, profile.
//!
//! # Data Flow
//! ```text
//! Route handler (handlers.rs)
//!     → guard chain (security subsystem)
//!     → password.rs (Argon2id hash/verify on the blocking pool)
//!     → session.rs (token issue/resolve/revoke, cookie shaping)
//!     → db store
//! ```

pub mod handlers;
pub mod password;
pub mod session;

pub use password::PasswordHasher;
pub use session::SessionManager;
