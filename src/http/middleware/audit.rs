//! Audit middleware.
//! Captures each request before the handler runs and dispatches the
//! finished record once the response is ready.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};

use crate::capture::{capture_request, correlation_id};
use crate::dispatch::{dump_request, Dispatcher};
use crate::observability::metrics;

pub async fn audit_middleware(
    State(dispatcher): State<Arc<Dispatcher>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // 1. Nothing configured: pass straight through.
    if dispatcher.routes().is_empty() {
        return next.run(req).await;
    }

    // 2. Capture the request side. On failure the handler still gets the
    //    request, with the body restored.
    let started = Instant::now();
    let mut record = match capture_request(&mut req).await {
        Ok(record) => {
            metrics::record_capture("ok", started);
            record
        }
        Err(e) => {
            metrics::record_capture(e.kind(), started);
            dispatcher.in_log_scope(|| {
                error!(
                    request_id = %correlation_id(&req),
                    method = %req.method(),
                    uri = %req.uri(),
                    kind = e.kind(),
                    error = %e,
                    "Request capture failed, skipping audit"
                )
            });
            return next.run(req).await;
        }
    };

    // 3. Render the raw dump while the request is still ours.
    let dump = match dispatcher.raw_dump_options() {
        Some(include_body) => match dump_request(&mut req, include_body).await {
            Ok(dump) => Some(dump),
            Err(e) => {
                dispatcher.in_log_scope(|| {
                    warn!(request_id = %record.request_id, error = %e, "Raw dump failed")
                });
                None
            }
        },
        None => None,
    };

    // 4. Real handler.
    let response = next.run(req).await;

    // 5. Response side, then dispatch. Dispatch failures are logged by the
    //    dispatcher and never change the response.
    if let Err(e) = record.complete(&response) {
        dispatcher.in_log_scope(|| {
            warn!(request_id = %record.request_id, error = %e, "Response capture failed")
        });
    }
    if let Ok(routes) = dispatcher.dispatch(&record, dump.as_ref()) {
        dispatcher.in_log_scope(|| {
            debug!(request_id = %record.request_id, routes = ?routes, "Audit record dispatched")
        });
    }

    response
}
