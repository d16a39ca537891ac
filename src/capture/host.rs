//! Host/port splitting.
//!
//! # Design Decisions
//! - Follows the `host:port` / `[v6]:port` grammar strictly
//! - A missing port is normalized to an empty port rather than failing
//! - Every other grammar error is fatal to capture for the request

use thiserror::Error;

/// A `Host` value that does not follow the host:port grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("missing port in address {0:?}")]
    MissingPort(String),

    #[error("missing ']' in address {0:?}")]
    MissingBracket(String),

    #[error("too many colons in address {0:?}")]
    TooManyColons(String),

    #[error("unexpected '{1}' in address {0:?}")]
    UnexpectedBracket(String, char),
}

/// Split `hostport` into host and port.
///
/// IPv6 literals must be bracketed; the brackets are removed from the
/// returned host.
pub fn split_host_port(hostport: &str) -> Result<(String, String), HostError> {
    let err_source = || hostport.to_string();

    let Some(colon) = hostport.rfind(':') else {
        return Err(HostError::MissingPort(err_source()));
    };

    let (host, open_from, close_from) = if hostport.starts_with('[') {
        let Some(end) = hostport.find(']') else {
            return Err(HostError::MissingBracket(err_source()));
        };
        if end + 1 == hostport.len() {
            return Err(HostError::MissingPort(err_source()));
        }
        if end + 1 != colon {
            // "]" must be immediately followed by the final ":".
            if hostport.as_bytes()[end + 1] == b':' {
                return Err(HostError::TooManyColons(err_source()));
            }
            return Err(HostError::MissingPort(err_source()));
        }
        (&hostport[1..end], 1, end + 1)
    } else {
        let host = &hostport[..colon];
        if host.contains(':') {
            return Err(HostError::TooManyColons(err_source()));
        }
        (host, 0, 0)
    };

    if hostport[open_from..].contains('[') {
        return Err(HostError::UnexpectedBracket(err_source(), '['));
    }
    if hostport[close_from..].contains(']') {
        return Err(HostError::UnexpectedBracket(err_source(), ']'));
    }

    Ok((host.to_string(), hostport[colon + 1..].to_string()))
}

/// Split a `Host` header value, treating a portless host as having an
/// empty port.
pub fn split_authority(hostport: &str) -> Result<(String, String), HostError> {
    match split_host_port(hostport) {
        Err(HostError::MissingPort(_)) => {
            let host = hostport
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(hostport);
            if host.contains(|c| c == '[' || c == ']') {
                return Err(HostError::UnexpectedBracket(hostport.to_string(), '['));
            }
            Ok((host.to_string(), String::new()))
        }
        other => other,
    }
}
