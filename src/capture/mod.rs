//! Request capture subsystem.
//!
//! # Data Flow
//! ```text
//! live request
//!     → host.rs (split Host into host/port)
//!     → headers.rs (headers/trailers → JSON text)
//!     → body.rs (replicate body, render text, restore handler body)
//!     → snapshot.rs (MessageSnapshot, immutable)
//!     → record.rs (AuditRecord: id, timing, request + response)
//! ```
//!
//! # Design Decisions
//! - Capture runs inline with the request; nothing is shared across requests
//! - Any failure abandons capture for that request; partial records are
//!   never produced
//! - The request the handler sees is unchanged apart from its body being
//!   an equivalent in-memory replay

pub mod body;
pub mod chunked;
pub mod headers;
pub mod host;
pub mod record;
pub mod snapshot;

use std::time::SystemTime;

use axum::body::Body;
use axum::http::Request;
use thiserror::Error;

pub use body::{render_body, replicate, BodyError, RenderedBody, ReplicateError};
pub use headers::{parse_headers, serialize_headers, HeaderError};
pub use host::{split_authority, split_host_port, HostError};
pub use record::AuditRecord;
pub use snapshot::{correlation_id, MessageRole, MessageSnapshot};

/// Reasons capture is abandoned for a request.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("malformed host: {0}")]
    Host(#[from] HostError),

    #[error("header serialization failed: {0}")]
    Header(#[from] HeaderError),

    #[error("body capture failed: {0}")]
    Body(#[from] BodyError),
}

impl CaptureError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::Host(_) => "host",
            CaptureError::Header(_) => "header",
            CaptureError::Body(_) => "body",
        }
    }
}

/// Start an audit record for `req`, capturing its request side.
pub async fn capture_request(req: &mut Request<Body>) -> Result<AuditRecord, CaptureError> {
    let started = SystemTime::now();
    let snapshot = MessageSnapshot::from_request(req).await?;
    Ok(AuditRecord::new(correlation_id(req), started, snapshot))
}
