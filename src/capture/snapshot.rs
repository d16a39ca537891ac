//! Message snapshots.
//!
//! A [`MessageSnapshot`] is the read-only capture of one HTTP message. The
//! request side is built from the live request before the handler runs;
//! the response side is built from the handler's response head.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, Request, Response, Version};
use http_body::Body as HttpBody;
use serde::Serialize;
use tower_http::request_id::RequestId;

use super::body::render_body;
use super::headers::{header_tokens, serialize_headers, transfer_encodings, HeaderError};
use super::host::split_authority;
use super::CaptureError;
use crate::net::tls::TlsInfo;

/// Header consulted for the correlation id when no `RequestId` extension
/// has been attached.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Which side of the exchange a snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Request,
    Response,
}

/// Captured shape of one HTTP message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSnapshot {
    pub role: MessageRole,
    pub protocol: String,
    pub protocol_major: u8,
    pub protocol_minor: u8,
    #[serde(rename = "request_method")]
    pub method: String,
    pub scheme: String,
    pub host: String,
    pub port: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
    pub header: String,
    pub body: String,
    /// Declared body length; -1 when unknown.
    pub content_length: i64,
    pub transfer_encoding: String,
    pub close: bool,
    pub trailer: String,
    pub remote_address: String,
    pub request_uri: String,
}

impl MessageSnapshot {
    /// Capture a live request.
    ///
    /// Only the request body is touched: it is read once and replaced by an
    /// equivalent body before this returns, whether or not capture succeeds.
    pub async fn from_request(req: &mut Request<Body>) -> Result<Self, CaptureError> {
        let (host, port) = split_authority(&host_of(req))?;

        let scheme = if is_tls(req) { "https" } else { "http" };

        let header = serialize_headers(req.headers())?;

        // Must be computed before the body is swapped for its replica.
        let content_length = request_content_length(req);

        let rendered = render_body(req).await?;
        let trailer = serialize_headers(&rendered.trailers.unwrap_or_default())?;

        let (protocol, protocol_major, protocol_minor) = protocol_of(req.version());
        let uri = req.uri();

        Ok(Self {
            role: MessageRole::Request,
            protocol: protocol.to_string(),
            protocol_major,
            protocol_minor,
            method: req.method().to_string(),
            scheme: scheme.to_string(),
            host,
            port,
            path: uri.path().to_string(),
            query: uri.query().unwrap_or_default().to_string(),
            // The http crate strips fragments while parsing the target.
            fragment: String::new(),
            header,
            body: rendered.text,
            content_length,
            transfer_encoding: transfer_encodings(req.headers()).join(","),
            close: wants_close(req.version(), req.headers()),
            trailer,
            remote_address: remote_address(req),
            request_uri: uri.to_string(),
        })
    }

    /// Capture the head of a response. The response body is left alone.
    pub fn from_response<B: HttpBody>(res: &Response<B>) -> Result<Self, HeaderError> {
        let (protocol, protocol_major, protocol_minor) = protocol_of(res.version());
        let content_length = declared_length(res.headers()).unwrap_or_else(|| {
            res.body()
                .size_hint()
                .exact()
                .and_then(|n| i64::try_from(n).ok())
                .unwrap_or(-1)
        });

        Ok(Self {
            role: MessageRole::Response,
            protocol: protocol.to_string(),
            protocol_major,
            protocol_minor,
            method: String::new(),
            scheme: String::new(),
            host: String::new(),
            port: String::new(),
            path: String::new(),
            query: String::new(),
            fragment: String::new(),
            header: serialize_headers(res.headers())?,
            body: String::new(),
            content_length,
            transfer_encoding: transfer_encodings(res.headers()).join(","),
            close: wants_close(res.version(), res.headers()),
            trailer: serialize_headers(&HeaderMap::new())?,
            remote_address: String::new(),
            request_uri: String::new(),
        })
    }
}

/// Correlation id carried by the request, or empty when there is none.
pub fn correlation_id<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(RequestId::header_value)
        .or_else(|| req.headers().get(X_REQUEST_ID))
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn host_of<B>(req: &Request<B>) -> String {
    match req.headers().get(HOST) {
        Some(value) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
        None => req
            .uri()
            .authority()
            .map(|a| a.as_str().to_string())
            .unwrap_or_default(),
    }
}

fn is_tls<B>(req: &Request<B>) -> bool {
    req.extensions().get::<TlsInfo>().is_some()
}

fn remote_address<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default()
}

pub(crate) fn protocol_of(version: Version) -> (&'static str, u8, u8) {
    match version {
        Version::HTTP_09 => ("HTTP/0.9", 0, 9),
        Version::HTTP_10 => ("HTTP/1.0", 1, 0),
        Version::HTTP_2 => ("HTTP/2.0", 2, 0),
        Version::HTTP_3 => ("HTTP/3.0", 3, 0),
        _ => ("HTTP/1.1", 1, 1),
    }
}

fn declared_length(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n >= 0)
}

fn request_content_length(req: &Request<Body>) -> i64 {
    if let Some(n) = declared_length(req.headers()) {
        return n;
    }
    if transfer_encodings(req.headers()).first().is_some_and(|te| te == "chunked") {
        return -1;
    }
    let body = req.body();
    if body.is_end_stream() {
        return 0;
    }
    body.size_hint()
        .exact()
        .and_then(|n| i64::try_from(n).ok())
        .unwrap_or(-1)
}

fn wants_close(version: Version, headers: &HeaderMap) -> bool {
    let tokens = header_tokens(headers, CONNECTION);
    if tokens.iter().any(|t| t == "close") {
        return true;
    }
    version <= Version::HTTP_10 && !tokens.iter().any(|t| t == "keep-alive")
}
