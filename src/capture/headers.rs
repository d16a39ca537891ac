//! Header multi-map serialization.
//!
//! # Responsibilities
//! - Render a `HeaderMap` (headers or trailers) as a JSON object of
//!   canonical header name → array of values
//! - Parse that text back into a `HeaderMap`
//!
//! # Design Decisions
//! - Names are written in canonical `Title-Case` so the audit text reads
//!   the way the header looked on the wire
//! - Every value of a repeated header is kept, in arrival order
//! - Values that are not valid UTF-8 are an error, never dropped

use axum::http::header::{AsHeaderName, HeaderMap, HeaderName, HeaderValue, TRANSFER_ENCODING};
use serde::ser::{SerializeMap, Serializer};
use thiserror::Error;

/// Errors produced while rendering or parsing header text.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// A header value cannot be represented as text.
    #[error("header {name} has a value that is not valid UTF-8")]
    NonUtf8 { name: String },

    /// The JSON encoder or decoder failed.
    #[error("header JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parsed text named an invalid header.
    #[error("invalid header name: {0}")]
    InvalidName(String),

    /// Parsed text carried an invalid header value.
    #[error("invalid value for header {0}")]
    InvalidValue(String),
}

/// Render a header multi-map into structured JSON text.
pub fn serialize_headers(headers: &HeaderMap) -> Result<String, HeaderError> {
    let mut entries: Vec<(String, Vec<&str>)> = Vec::with_capacity(headers.keys_len());
    for name in headers.keys() {
        let mut values = Vec::new();
        for value in headers.get_all(name) {
            let text = std::str::from_utf8(value.as_bytes()).map_err(|_| HeaderError::NonUtf8 {
                name: name.as_str().to_string(),
            })?;
            values.push(text);
        }
        entries.push((canonical_name(name.as_str()), values));
    }

    let mut out = Vec::with_capacity(64 * entries.len() + 2);
    let mut serializer = serde_json::Serializer::new(&mut out);
    let mut map = (&mut serializer).serialize_map(Some(entries.len()))?;
    for (name, values) in &entries {
        map.serialize_entry(name, values)?;
    }
    map.end()?;

    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Parse header text produced by [`serialize_headers`] back into a map.
pub fn parse_headers(text: &str) -> Result<HeaderMap, HeaderError> {
    let parsed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
    let mut headers = HeaderMap::with_capacity(parsed.len());

    for (name, values) in parsed {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HeaderError::InvalidName(name.clone()))?;
        let values: Vec<String> = serde_json::from_value(values)?;
        for value in values {
            let header_value = HeaderValue::from_str(&value)
                .map_err(|_| HeaderError::InvalidValue(name.clone()))?;
            headers.append(header_name.clone(), header_value);
        }
    }

    Ok(headers)
}

/// Lowercased, comma-separated tokens of every `name` header, in order.
pub fn header_tokens(headers: &HeaderMap, name: impl AsHeaderName) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Transfer codings applied to a message, outermost last.
pub fn transfer_encodings(headers: &HeaderMap) -> Vec<String> {
    header_tokens(headers, TRANSFER_ENCODING)
}

/// Canonical MIME-style header name, e.g. `content-type` → `Content-Type`.
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}
