//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize metrics when enabled
//! - Bind the listener (plain or TLS)
//! - Serve until the shutdown coordinator fires
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::Dispatch;

use crate::config::AuditServiceConfig;
use crate::http::AuditServer;
use crate::lifecycle::Shutdown;
use crate::net::{self, ListenerError};
use crate::observability;

/// How long TLS connections get to drain after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to load TLS material: {0}")]
    Tls(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the audit server with `config` until `shutdown` is triggered.
///
/// Audit events and diagnostics from the request path go to `log`.
pub async fn run(config: AuditServiceConfig, shutdown: Shutdown, log: Dispatch) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        observability::init_metrics(addr)?;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        raw_dump = config.audit.raw_dump.enable,
        console = config.audit.console.enable,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    match config.listener.tls.clone() {
        None => {
            let listener = net::bind(&config.listener).await?;
            AuditServer::new(config, log)
                .run(listener, shutdown.wait())
                .await
                .map_err(StartupError::Serve)
        }
        Some(tls) => {
            let addr = net::listener::bind_address(&config.listener)?;
            let rustls = net::load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path))
                .await
                .map_err(StartupError::Tls)?;

            let handle = axum_server::Handle::new();
            let drain = handle.clone();
            let stop = shutdown.wait();
            tokio::spawn(async move {
                stop.await;
                drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
            });

            AuditServer::new(config, log)
                .run_tls(addr, rustls, handle)
                .await
                .map_err(StartupError::Serve)
        }
    }
}
