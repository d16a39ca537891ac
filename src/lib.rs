//! HTTP request auditing middleware.
//!
//! Captures a structured snapshot of each request without disturbing the
//! handler's view of it, then dispatches the snapshot to configured sinks.

pub mod capture;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use capture::{capture_request, AuditRecord, CaptureError, MessageSnapshot};
pub use config::AuditServiceConfig;
pub use dispatch::Dispatcher;
pub use http::middleware::audit_middleware;
pub use http::AuditServer;
pub use lifecycle::Shutdown;
