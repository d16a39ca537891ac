//! TCP listener setup.
//!
//! # Responsibilities
//! - Parse and bind the configured address
//! - Report bind failures with the offending address

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::schema::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// The configured address is not a socket address.
    Address(String),
    /// Failed to bind to address.
    Bind(SocketAddr, std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Address(addr) => write!(f, "Invalid bind address: {:?}", addr),
            ListenerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Address(_) => None,
            ListenerError::Bind(_, e) => Some(e),
        }
    }
}

/// Parse the configured bind address.
pub fn bind_address(config: &ListenerConfig) -> Result<SocketAddr, ListenerError> {
    config
        .bind_address
        .parse()
        .map_err(|_| ListenerError::Address(config.bind_address.clone()))
}

/// Bind a TCP listener on the configured address.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr = bind_address(config)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ListenerError::Bind(addr, e))?;

    tracing::info!(address = %addr, "Listener bound");
    Ok(listener)
}
