//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_audit::config::{AuditConfig, AuditServiceConfig};
use http_audit::dispatch::{Dispatcher, MemorySink};
use http_audit::{AuditServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A running audit server whose sinks are kept in memory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub sink: Arc<MemorySink>,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start an audit server on an ephemeral port.
pub async fn start_server(audit: AuditConfig) -> TestServer {
    let mut config = AuditServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.audit = audit.clone();

    let sink = Arc::new(MemorySink::new());
    let dispatcher = Arc::new(Dispatcher::new(audit, sink.clone(), sink.clone()));
    let server = AuditServer::with_dispatcher(config, dispatcher);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let stop = shutdown.wait();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    TestServer { addr, sink, shutdown }
}

/// Send raw bytes and read the whole response. The request should ask
/// for `Connection: close`.
#[allow(dead_code)]
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    socket.write_all(request).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Wait until `count` entries have been dispatched.
///
/// Dispatch runs after the response is produced, so a client can see the
/// response slightly before the entry lands.
#[allow(dead_code)]
pub async fn wait_for_entries(sink: &MemorySink, count: usize) {
    for _ in 0..100 {
        if sink.entries().unwrap().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {} entries, got {}", count, sink.entries().unwrap().len());
}
