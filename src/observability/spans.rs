//! Per-request spans.

use axum::http::Request;
use tracing::Span;

use crate::capture::correlation_id;

/// Span for one request, tagged with its correlation id.
///
/// Used as the `make_span_with` hook of the HTTP trace layer.
pub fn request_span<B>(req: &Request<B>) -> Span {
    tracing::info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        version = ?req.version(),
        request_id = %correlation_id(req),
    )
}
