//! Audit dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! AuditRecord (+ optional RequestDump)
//!     → policy.rs (select routes, shape console entry)
//!     → sink.rs   (tracing event, JSON line, raw dump stream)
//! ```
//!
//! # Design Decisions
//! - Sinks are explicit dependencies of the dispatcher
//! - Raw dump rendering (dump.rs) works on the live request and is
//!   independent of snapshot capture

pub mod dump;
pub mod policy;
pub mod sink;

pub use dump::{dump_request, RequestDump};
pub use policy::{console_entry, DispatchError, Dispatcher, Route};
pub use sink::{AuditEntry, AuditSink, DumpSink, MemorySink, SinkError, TracingSink, WriterSink};
