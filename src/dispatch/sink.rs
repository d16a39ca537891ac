//! Output sinks for dispatched audit data.
//!
//! # Responsibilities
//! - Define the sink seams the dispatcher writes through
//! - Emit one structured entry per request (tracing event or JSON line)
//! - Write raw dumps to an auxiliary stream
//!
//! # Design Decisions
//! - Sinks are injected into the dispatcher; nothing here is global
//! - Each entry is emitted by a single call under a single lock, so
//!   concurrent requests never interleave fields within one entry

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;

use super::dump::RequestDump;

/// `tracing` target used for console entries.
pub const CONSOLE_TARGET: &str = "http_audit::console";

/// Message attached to every console entry.
pub const CONSOLE_MESSAGE: &str = "Request Received";

/// Errors raised by sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("sink lock poisoned")]
    Poisoned,
}

/// One structured console entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub request_id: String,
    pub method: String,
    pub scheme: String,
    pub host: String,
    pub port: String,
    pub path: String,
    pub protocol: String,
    pub proto_major: u8,
    pub proto_minor: u8,
    pub content_length: i64,
    pub transfer_encoding: String,
    pub close: bool,
    pub remote_addr: String,
    pub request_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Destination of the structured console route.
pub trait AuditSink: Send + Sync {
    fn emit(&self, entry: &AuditEntry) -> Result<(), SinkError>;
}

/// Destination of the raw dump route.
pub trait DumpSink: Send + Sync {
    fn write_dump(&self, dump: &RequestDump) -> Result<(), SinkError>;
}

/// Emits each entry as one INFO `tracing` event.
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    dispatch: Option<tracing::Dispatch>,
}

impl TracingSink {
    /// Emit through whatever subscriber is current at the call site.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit through `dispatch` regardless of the current subscriber.
    pub fn with_dispatch(dispatch: tracing::Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }
}

impl AuditSink for TracingSink {
    fn emit(&self, entry: &AuditEntry) -> Result<(), SinkError> {
        let event = || {
            tracing::info!(
                target: CONSOLE_TARGET,
                request_id = entry.request_id.as_str(),
                method = entry.method.as_str(),
                scheme = entry.scheme.as_str(),
                host = entry.host.as_str(),
                port = entry.port.as_str(),
                path = entry.path.as_str(),
                protocol = entry.protocol.as_str(),
                proto_major = entry.proto_major,
                proto_minor = entry.proto_minor,
                content_length = entry.content_length,
                transfer_encoding = entry.transfer_encoding.as_str(),
                close = entry.close,
                remote_addr = entry.remote_addr.as_str(),
                request_uri = entry.request_uri.as_str(),
                header_json = entry.header_json.as_deref(),
                body = entry.body.as_deref(),
                "{}",
                CONSOLE_MESSAGE
            );
        };

        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, event),
            None => event(),
        }
        Ok(())
    }
}

/// Writes entries as JSON lines and dumps as framed text to a stream.
#[derive(Debug)]
pub struct WriterSink<W> {
    out: Mutex<W>,
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl WriterSink<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.out.into_inner().map_err(|_| SinkError::Poisoned)
    }

    fn lock(&self) -> Result<MutexGuard<'_, W>, SinkError> {
        self.out.lock().map_err(|_| SinkError::Poisoned)
    }
}

impl<W: Write + Send> AuditSink for WriterSink<W> {
    fn emit(&self, entry: &AuditEntry) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&ConsoleLine {
            message: CONSOLE_MESSAGE,
            entry,
        })?;
        line.push(b'\n');

        let mut out = self.lock()?;
        out.write_all(&line)?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> DumpSink for WriterSink<W> {
    fn write_dump(&self, dump: &RequestDump) -> Result<(), SinkError> {
        let mut out = self.lock()?;
        out.write_all(b"request dump:\n")?;
        out.write_all(dump.as_bytes())?;
        if !dump.as_bytes().ends_with(b"\n") {
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct ConsoleLine<'a> {
    message: &'static str,
    #[serde(flatten)]
    entry: &'a AuditEntry,
}

/// Keeps everything it receives in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<AuditEntry>>,
    dumps: Mutex<Vec<RequestDump>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries emitted so far.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, SinkError> {
        Ok(self.entries.lock().map_err(|_| SinkError::Poisoned)?.clone())
    }

    /// Dumps written so far.
    pub fn dumps(&self) -> Result<Vec<RequestDump>, SinkError> {
        Ok(self.dumps.lock().map_err(|_| SinkError::Poisoned)?.clone())
    }
}

impl AuditSink for MemorySink {
    fn emit(&self, entry: &AuditEntry) -> Result<(), SinkError> {
        self.entries
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .push(entry.clone());
        Ok(())
    }
}

impl DumpSink for MemorySink {
    fn write_dump(&self, dump: &RequestDump) -> Result<(), SinkError> {
        self.dumps
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .push(dump.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::Arc;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    fn entry(id: &str) -> AuditEntry {
        AuditEntry {
            request_id: id.into(),
            method: "GET".into(),
            scheme: "http".into(),
            host: "localhost".into(),
            port: "8080".into(),
            path: "/".into(),
            protocol: "HTTP/1.1".into(),
            proto_major: 1,
            proto_minor: 1,
            content_length: 0,
            transfer_encoding: String::new(),
            close: false,
            remote_addr: "127.0.0.1:5000".into(),
            request_uri: "/".into(),
            header_json: None,
            body: Some("hi".into()),
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<HashMap<String, String>>>>);

    struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

    impl Visit for FieldVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{:?}", value));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            fields.insert("target".to_string(), event.metadata().target().to_string());
            event.record(&mut FieldVisitor(&mut fields));
            self.0.lock().unwrap().push(fields);
        }
    }

    #[test]
    fn test_tracing_sink_emits_one_event_with_fields() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());
        let sink = TracingSink::with_dispatch(tracing::Dispatch::new(subscriber));

        sink.emit(&entry("abc")).unwrap();

        let events = captured.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        let fields = &events[0];
        assert_eq!(fields["target"], CONSOLE_TARGET);
        assert_eq!(fields["request_id"], "abc");
        assert_eq!(fields["body"], "hi");
        assert_eq!(fields["proto_major"], "1");
        assert!(!fields.contains_key("header_json"));
    }

    #[test]
    fn test_writer_sink_writes_json_lines() {
        let sink = WriterSink::new(Vec::new());
        sink.emit(&entry("one")).unwrap();
        sink.emit(&entry("two")).unwrap();

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["message"], CONSOLE_MESSAGE);
        assert_eq!(lines[1]["request_id"], "two");
        assert!(lines[0].get("header_json").is_none());
    }

    #[test]
    fn test_memory_sink_reports_poisoned_lock() {
        let sink = Arc::new(MemorySink::new());
        sink.emit(&entry("before")).unwrap();

        let holder = sink.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.entries.lock().unwrap();
            panic!("writer died while holding the lock");
        })
        .join();

        assert!(matches!(sink.entries(), Err(SinkError::Poisoned)));
        assert!(matches!(sink.emit(&entry("after")), Err(SinkError::Poisoned)));
        assert!(sink.dumps().unwrap().is_empty());
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.emit(&entry("x")).unwrap();
        assert_eq!(sink.entries().unwrap().len(), 1);
        assert!(sink.dumps().unwrap().is_empty());
    }
}
