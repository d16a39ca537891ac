//! Request middleware.

pub mod audit;

pub use audit::audit_middleware;
