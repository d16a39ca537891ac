//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the echo handler
//! - Wire up middleware (request ID, tracing, timeout, audit)
//! - Serve plain TCP or TLS with connect info attached
//! - Shut down gracefully on signal

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Extension, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AuditServiceConfig;
use crate::dispatch::Dispatcher;
use crate::http::middleware::audit_middleware;
use crate::http::request::MakeRequestUuid;
use crate::net::TlsInfo;
use crate::observability::spans::request_span;

/// Largest body the echo handler buffers.
const ECHO_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Echo server with the audit middleware in front of it.
pub struct AuditServer {
    router: Router,
}

impl AuditServer {
    /// Create a server whose sinks are chosen from the audit config.
    /// Audit events and diagnostics are logged through `log`.
    pub fn new(config: AuditServiceConfig, log: tracing::Dispatch) -> Self {
        let dispatcher = Arc::new(Dispatcher::from_config(config.audit.clone(), log));
        Self::with_dispatcher(config, dispatcher)
    }

    /// Create a server dispatching through `dispatcher`.
    pub fn with_dispatcher(config: AuditServiceConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            router: Self::build_router(&config, dispatcher),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AuditServiceConfig, dispatcher: Arc<Dispatcher>) -> Router {
        Router::new()
            .route("/{*path}", any(echo_handler))
            .route("/", any(echo_handler))
            .layer(middleware::from_fn_with_state(dispatcher, audit_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| request_span(req)))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr`. Shutdown is driven through `handle`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        handle: axum_server::Handle,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let app = self
            .router
            .layer(Extension(TlsInfo))
            .into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Returns the request body with its content type.
async fn echo_handler(request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, ECHO_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };

    let mut response = Response::new(Body::from(bytes));
    if let Some(content_type) = parts.headers.get(header::CONTENT_TYPE) {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type.clone());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ConsoleConfig;
    use crate::dispatch::MemorySink;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn server() -> (AuditServer, Arc<MemorySink>) {
        let mut config = AuditServiceConfig::default();
        config.audit.console = ConsoleConfig {
            enable: true,
            include_header: true,
            ..Default::default()
        };
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Arc::new(Dispatcher::new(config.audit.clone(), sink.clone(), sink.clone()));
        (AuditServer::with_dispatcher(config, dispatcher), sink)
    }

    #[tokio::test]
    async fn test_generated_request_id_reaches_entry_and_response() {
        let (server, sink) = server();
        let req = Request::builder()
            .uri("/hello?x=1")
            .header("host", "localhost:8080")
            .body(Body::empty())
            .unwrap();

        let res = server.router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let id = res.headers().get("x-request-id").unwrap().to_str().unwrap().to_string();

        let entries = sink.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request_id, id);
        assert_eq!(entries[0].host, "localhost");
        assert_eq!(entries[0].port, "8080");
        assert_eq!(entries[0].request_uri, "/hello?x=1");
        assert!(entries[0].header_json.is_some());
        assert!(entries[0].body.is_none());
    }

    #[tokio::test]
    async fn test_echo_keeps_content_type() {
        let (server, _) = server();
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("host", "localhost")
            .header("content-type", "text/plain")
            .body(Body::from("echo me"))
            .unwrap();

        let res = server.router().oneshot(req).await.unwrap();
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/plain");
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"echo me");
    }
}
