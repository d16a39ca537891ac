//! HTTP audit server.
//!
//! Runs an echo service behind the audit middleware: every request is
//! captured, optionally dumped in wire format, and logged as one
//! structured entry according to the `[audit]` config section.

use std::path::PathBuf;

use clap::Parser;

use http_audit::config::{load_config, AuditServiceConfig};
use http_audit::lifecycle::{self, signals, Shutdown};
use http_audit::observability;

#[derive(Parser, Debug)]
#[command(name = "http-audit", version, about = "HTTP request auditing server")]
struct Args {
    /// Path to the TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AuditServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    observability::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "http-audit starting");

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());
    let log = tracing::dispatcher::get_default(|current| current.clone());
    lifecycle::run(config, shutdown, log).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
