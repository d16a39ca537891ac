//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the audit
//! service. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuditServiceConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Audit dispatch routes.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Dispatch routes for captured requests.
///
/// A missing section disables its route.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// Unparsed wire-format dump of each request.
    pub raw_dump: RawDumpConfig,

    /// One structured log entry per request.
    pub console: ConsoleConfig,
}

/// Raw dump route.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RawDumpConfig {
    pub enable: bool,

    /// Append the request body to the dump.
    pub include_body: bool,

    /// Stream the dump is written to.
    pub target: DumpTarget,
}

/// Structured console route.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enable: bool,

    /// Attach the header JSON to each entry.
    pub include_header: bool,

    /// Attach the body text to each entry.
    pub include_body: bool,

    /// How entries are emitted.
    pub format: ConsoleFormat,
}

/// Where raw dumps go.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DumpTarget {
    #[default]
    Stdout,
    Stderr,
}

/// Console entry encoding.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// A `tracing` event per entry.
    #[default]
    Tracing,
    /// A JSON line per entry on stdout.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Diagnostic log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Diagnostic log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_disabled_by_default() {
        let config: AuditServiceConfig = toml::from_str("").unwrap();
        assert!(!config.audit.raw_dump.enable);
        assert!(!config.audit.console.enable);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_parse_audit_section() {
        let config: AuditServiceConfig = toml::from_str(
            r#"
            [audit.raw_dump]
            enable = true
            target = "stderr"

            [audit.console]
            enable = true
            include_body = true
            format = "json"
            "#,
        )
        .unwrap();

        assert!(config.audit.raw_dump.enable);
        assert!(!config.audit.raw_dump.include_body);
        assert_eq!(config.audit.raw_dump.target, DumpTarget::Stderr);
        assert!(config.audit.console.include_body);
        assert!(!config.audit.console.include_header);
        assert_eq!(config.audit.console.format, ConsoleFormat::Json);
    }
}
