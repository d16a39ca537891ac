//! Route selection and entry shaping.
//!
//! # Responsibilities
//! - Decide which routes run for a record, in a fixed order
//! - Shape the console entry according to per-field options
//! - Invoke the injected sinks and report their failures
//!
//! # Design Decisions
//! - Raw dump takes precedence: when it is enabled the console route is
//!   skipped for that pass, even if it is enabled too
//! - Sink failures are logged and returned, never turned into HTTP errors

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::Dispatch;

use crate::capture::AuditRecord;
use crate::config::schema::{AuditConfig, ConsoleConfig, ConsoleFormat, DumpTarget};
use crate::observability::metrics;

use super::dump::RequestDump;
use super::sink::{AuditEntry, AuditSink, DumpSink, SinkError, TracingSink, WriterSink};

/// A dispatch route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    RawDump,
    Console,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::RawDump => "raw_dump",
            Route::Console => "console",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("raw dump route is enabled but no dump was rendered")]
    MissingDump,

    #[error("{route} route failed: {source}")]
    Sink {
        route: Route,
        #[source]
        source: SinkError,
    },
}

/// Build the console entry for `record`.
///
/// The scalar fields are always present; header and body only when the
/// matching option is on.
pub fn console_entry(record: &AuditRecord, options: &ConsoleConfig) -> AuditEntry {
    let req = &record.request;
    AuditEntry {
        request_id: record.request_id.clone(),
        method: req.method.clone(),
        scheme: req.scheme.clone(),
        host: req.host.clone(),
        port: req.port.clone(),
        path: req.path.clone(),
        protocol: req.protocol.clone(),
        proto_major: req.protocol_major,
        proto_minor: req.protocol_minor,
        content_length: req.content_length,
        transfer_encoding: req.transfer_encoding.clone(),
        close: req.close,
        remote_addr: req.remote_address.clone(),
        request_uri: req.request_uri.clone(),
        header_json: options.include_header.then(|| req.header.clone()),
        body: options.include_body.then(|| req.body.clone()),
    }
}

/// Runs the configured routes against finished records.
#[derive(Clone)]
pub struct Dispatcher {
    config: AuditConfig,
    console: Arc<dyn AuditSink>,
    dump: Arc<dyn DumpSink>,
    /// Diagnostic log handle; `None` logs to the current subscriber.
    log: Option<Dispatch>,
}

impl Dispatcher {
    /// Create a dispatcher writing to the given sinks.
    pub fn new(config: AuditConfig, console: Arc<dyn AuditSink>, dump: Arc<dyn DumpSink>) -> Self {
        Self {
            config,
            console,
            dump,
            log: None,
        }
    }

    /// Create a dispatcher with the sinks named in `config`. Console events
    /// and diagnostics both go to `log`.
    pub fn from_config(config: AuditConfig, log: Dispatch) -> Self {
        let console: Arc<dyn AuditSink> = match config.console.format {
            ConsoleFormat::Tracing => Arc::new(TracingSink::with_dispatch(log.clone())),
            ConsoleFormat::Json => Arc::new(WriterSink::stdout()),
        };
        let dump: Arc<dyn DumpSink> = match config.raw_dump.target {
            DumpTarget::Stdout => Arc::new(WriterSink::stdout()),
            DumpTarget::Stderr => Arc::new(WriterSink::stderr()),
        };
        Self::new(config, console, dump).with_log(log)
    }

    /// Send diagnostics (dispatch failures, capture failures reported by
    /// the middleware) to `log`.
    pub fn with_log(mut self, log: Dispatch) -> Self {
        self.log = Some(log);
        self
    }

    /// Run `f` with this dispatcher's log handle as the default subscriber.
    pub fn in_log_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.log {
            Some(log) => tracing::dispatcher::with_default(log, f),
            None => f(),
        }
    }

    /// Routes that run for each record, in order.
    pub fn routes(&self) -> Vec<Route> {
        if self.config.raw_dump.enable {
            vec![Route::RawDump]
        } else if self.config.console.enable {
            vec![Route::Console]
        } else {
            Vec::new()
        }
    }

    /// Whether a raw dump must be rendered, and with which body option.
    ///
    /// Returns `Some(include_body)` when the raw dump route will run.
    pub fn raw_dump_options(&self) -> Option<bool> {
        self.config
            .raw_dump
            .enable
            .then_some(self.config.raw_dump.include_body)
    }

    /// Run every active route for `record`.
    ///
    /// `dump` must be present when the raw dump route is active. Returns the
    /// routes that ran.
    pub fn dispatch(&self, record: &AuditRecord, dump: Option<&RequestDump>) -> Result<Vec<Route>, DispatchError> {
        let routes = self.routes();
        if self.config.raw_dump.enable && self.config.console.enable {
            self.in_log_scope(|| {
                tracing::debug!(
                    request_id = %record.request_id,
                    "Console route skipped, raw dump takes precedence"
                )
            });
        }

        for route in &routes {
            let started = Instant::now();
            let result = match route {
                Route::RawDump => match dump {
                    Some(dump) => self.dump.write_dump(dump),
                    None => {
                        metrics::record_dispatch(route.as_str(), "error", started);
                        self.in_log_scope(|| {
                            tracing::error!(request_id = %record.request_id, route = %route, "No raw dump to write")
                        });
                        return Err(DispatchError::MissingDump);
                    }
                },
                Route::Console => self.console.emit(&console_entry(record, &self.config.console)),
            };

            if let Err(source) = result {
                metrics::record_dispatch(route.as_str(), "error", started);
                self.in_log_scope(|| {
                    tracing::error!(
                        request_id = %record.request_id,
                        route = %route,
                        error = %source,
                        "Audit dispatch failed"
                    )
                });
                return Err(DispatchError::Sink { route: *route, source });
            }
            metrics::record_dispatch(route.as_str(), "ok", started);
        }

        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MessageRole, MessageSnapshot};
    use crate::config::schema::RawDumpConfig;
    use crate::dispatch::sink::MemorySink;
    use std::time::SystemTime;

    fn record() -> AuditRecord {
        let snapshot = MessageSnapshot {
            role: MessageRole::Request,
            protocol: "HTTP/1.1".into(),
            protocol_major: 1,
            protocol_minor: 1,
            method: "POST".into(),
            scheme: "https".into(),
            host: "example.com".into(),
            port: "8443".into(),
            path: "/v1/items".into(),
            query: String::new(),
            fragment: String::new(),
            header: r#"{"Content-Type":["application/json"]}"#.into(),
            body: r#"{"a":1}"#.into(),
            content_length: 7,
            transfer_encoding: String::new(),
            close: false,
            trailer: "{}".into(),
            remote_address: "10.0.0.1:4000".into(),
            request_uri: "/v1/items".into(),
        };
        AuditRecord::new("req-1".into(), SystemTime::now(), snapshot)
    }

    fn config(raw: bool, console: bool) -> AuditConfig {
        AuditConfig {
            raw_dump: RawDumpConfig {
                enable: raw,
                ..Default::default()
            },
            console: ConsoleConfig {
                enable: console,
                include_body: true,
                ..Default::default()
            },
        }
    }

    fn dispatcher(config: AuditConfig) -> (Dispatcher, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Dispatcher::new(config, sink.clone(), sink.clone()), sink)
    }

    fn dump() -> RequestDump {
        RequestDump::from(bytes::Bytes::from_static(b"POST /v1/items HTTP/1.1\r\n\r\n"))
    }

    #[test]
    fn test_console_entry_respects_options() {
        let entry = console_entry(
            &record(),
            &ConsoleConfig {
                enable: true,
                include_header: false,
                include_body: true,
                ..Default::default()
            },
        );
        assert_eq!(entry.scheme, "https");
        assert_eq!(entry.method, "POST");
        assert_eq!(entry.path, "/v1/items");
        assert_eq!(entry.body.as_deref(), Some(r#"{"a":1}"#));
        assert!(entry.header_json.is_none());

        let entry = console_entry(
            &record(),
            &ConsoleConfig {
                include_header: true,
                ..Default::default()
            },
        );
        assert!(entry.body.is_none());
        assert_eq!(entry.header_json.as_deref(), Some(r#"{"Content-Type":["application/json"]}"#));
    }

    #[test]
    fn test_raw_dump_only() {
        let (dispatcher, sink) = dispatcher(config(true, false));
        let routes = dispatcher.dispatch(&record(), Some(&dump())).unwrap();

        assert_eq!(routes, vec![Route::RawDump]);
        assert!(sink.entries().unwrap().is_empty());
        assert_eq!(sink.dumps().unwrap(), vec![dump()]);
    }

    #[test]
    fn test_raw_dump_takes_precedence_over_console() {
        let (dispatcher, sink) = dispatcher(config(true, true));
        assert_eq!(dispatcher.raw_dump_options(), Some(false));

        dispatcher.dispatch(&record(), Some(&dump())).unwrap();
        assert_eq!(sink.dumps().unwrap().len(), 1);
        assert!(sink.entries().unwrap().is_empty());
    }

    #[test]
    fn test_console_only() {
        let (dispatcher, sink) = dispatcher(config(false, true));
        assert_eq!(dispatcher.raw_dump_options(), None);

        let routes = dispatcher.dispatch(&record(), None).unwrap();
        assert_eq!(routes, vec![Route::Console]);
        let entries = sink.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request_id, "req-1");
        assert!(sink.dumps().unwrap().is_empty());
    }

    #[test]
    fn test_nothing_enabled() {
        let (dispatcher, sink) = dispatcher(AuditConfig::default());
        assert!(dispatcher.dispatch(&record(), None).unwrap().is_empty());
        assert!(sink.entries().unwrap().is_empty());
        assert!(sink.dumps().unwrap().is_empty());
    }

    #[test]
    fn test_missing_dump_is_an_error() {
        let (dispatcher, _) = dispatcher(config(true, false));
        assert!(matches!(
            dispatcher.dispatch(&record(), None),
            Err(DispatchError::MissingDump)
        ));
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn emit(&self, _: &AuditEntry) -> Result<(), SinkError> {
            Err(SinkError::Poisoned)
        }
    }

    #[test]
    fn test_sink_failure_is_returned() {
        let dispatcher = Dispatcher::new(config(false, true), Arc::new(FailingSink), Arc::new(MemorySink::new()));
        let err = dispatcher.dispatch(&record(), None).unwrap_err();
        assert!(matches!(err, DispatchError::Sink { route: Route::Console, .. }));
    }

    #[derive(Clone, Default)]
    struct ErrorEvents(Arc<std::sync::Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for ErrorEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.lock().unwrap().push(event.metadata().target().to_string());
            }
        }
    }

    #[test]
    fn test_failures_logged_to_injected_handle() {
        use tracing_subscriber::layer::SubscriberExt;

        let events = ErrorEvents::default();
        let log = Dispatch::new(tracing_subscriber::registry().with(events.clone()));
        let dispatcher = Dispatcher::new(config(false, true), Arc::new(FailingSink), Arc::new(MemorySink::new()))
            .with_log(log);

        assert!(dispatcher.dispatch(&record(), None).is_err());
        assert_eq!(events.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_from_config_console_events_use_injected_handle() {
        use tracing_subscriber::layer::SubscriberExt;

        #[derive(Clone, Default)]
        struct Targets(Arc<std::sync::Mutex<Vec<String>>>);

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Targets {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
                self.0.lock().unwrap().push(event.metadata().target().to_string());
            }
        }

        let targets = Targets::default();
        let log = Dispatch::new(tracing_subscriber::registry().with(targets.clone()));
        let dispatcher = Dispatcher::from_config(config(false, true), log);

        dispatcher.dispatch(&record(), None).unwrap();
        let seen = targets.0.lock().unwrap();
        assert_eq!(seen.as_slice(), [crate::dispatch::sink::CONSOLE_TARGET.to_string()]);
    }
}
