//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, tracing, timeout)
//!     → request.rs (assign request ID when missing)
//!     → middleware/audit.rs (capture → handler → dispatch)
//!     → echo handler
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::MakeRequestUuid;
pub use server::AuditServer;
