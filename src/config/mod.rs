//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AuditServiceConfig (validated, immutable)
//!     → AuditConfig handed to the dispatcher
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Every audit route defaults to disabled
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::AuditServiceConfig;
pub use schema::{AuditConfig, ConsoleConfig, ConsoleFormat, DumpTarget, RawDumpConfig};
pub use schema::{ListenerConfig, LogFormat, ObservabilityConfig, TlsConfig};
