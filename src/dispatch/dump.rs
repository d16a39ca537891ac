//! Wire-format request dump.
//!
//! Renders a request the way it looked on the wire: request line, `Host`,
//! `Transfer-Encoding`, the remaining headers, a blank line and, when asked
//! for, the body (chunk-framed if the request was chunked). Works directly
//! on the live request and does not depend on the snapshot builder.

use std::fmt;

use axum::body::Body;
use axum::http::header::{HOST, TRAILER, TRANSFER_ENCODING};
use axum::http::Request;
use bytes::{BufMut, Bytes, BytesMut};

use crate::capture::body::{render_body, BodyError};
use crate::capture::headers::{canonical_name, transfer_encodings};
use crate::capture::snapshot::protocol_of;

/// A rendered request dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDump(Bytes);

impl RequestDump {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for RequestDump {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for RequestDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Dump `req` in wire format. The body, if included, is restored on `req`.
pub async fn dump_request(req: &mut Request<Body>, include_body: bool) -> Result<RequestDump, BodyError> {
    let mut out = BytesMut::with_capacity(512);

    let target = req.uri().to_string();
    let (_, major, minor) = protocol_of(req.version());
    out.put_slice(format!("{} {} HTTP/{}.{}\r\n", req.method(), target, major, minor).as_bytes());

    let absolute_target = target.starts_with("http://") || target.starts_with("https://");
    if !absolute_target {
        let host = req
            .headers()
            .get(HOST)
            .map(|v| v.as_bytes().to_vec())
            .or_else(|| req.uri().authority().map(|a| a.as_str().as_bytes().to_vec()));
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            out.put_slice(b"Host: ");
            out.put_slice(&host);
            out.put_slice(b"\r\n");
        }
    }

    let codings = transfer_encodings(req.headers());
    if !codings.is_empty() {
        out.put_slice(format!("Transfer-Encoding: {}\r\n", codings.join(",")).as_bytes());
    }

    for (name, value) in req.headers() {
        if *name == HOST || *name == TRANSFER_ENCODING || *name == TRAILER {
            continue;
        }
        out.put_slice(canonical_name(name.as_str()).as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"\r\n");

    if include_body {
        let rendered = render_body(req).await?;
        out.put_slice(rendered.text.as_bytes());
    }

    Ok(RequestDump(out.freeze()))
}
