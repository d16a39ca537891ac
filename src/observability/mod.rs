//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Capture and dispatch produce:
//!     → logging.rs (diagnostic log events)
//!     → metrics.rs (counters, histograms)
//!     → spans.rs   (per-request spans carrying the correlation id)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Diagnostic logs are separate from audit entries; audit entries go
//!   through the dispatch sinks
//! - Metrics are cheap (atomic increments) and no-ops until a recorder
//!   is installed

pub mod logging;
pub mod metrics;
pub mod spans;

pub use logging::init_logging;
pub use metrics::init_metrics;
