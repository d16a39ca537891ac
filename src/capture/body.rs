//! Body replication and rendering.
//!
//! # Responsibilities
//! - Read a single-use request body exactly once
//! - Hand back two independent, equivalent bodies (capture + handler)
//! - Render the capture copy as text, re-applying chunk framing when the
//!   request arrived with `Transfer-Encoding: chunked`
//!
//! # Data Flow
//! ```text
//! req.body ──▶ replicate ──┬──▶ capture copy ──▶ render ──▶ audit text
//!                          └──▶ handler copy ──▶ req.body (restored)
//! ```
//!
//! # Design Decisions
//! - Bodies are buffered in memory as `Bytes`; both copies share the
//!   buffers, so the second copy costs no extra allocation
//! - Frame boundaries and trailers are replayed as they were read
//! - The handler-facing body is restored even when rendering fails

use std::collections::VecDeque;
use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::BodyExt;
use thiserror::Error;

use super::chunked::{ChunkedWriter, CRLF};
use super::headers::transfer_encodings;

/// Failure to buffer a body.
///
/// Carries the body the handler should receive instead: every frame read
/// before the failure, followed by the same failure.
#[derive(Debug, Error)]
#[error("failed to read body: {source}")]
pub struct ReplicateError {
    pub source: axum::Error,
    pub body: Body,
}

/// Errors produced while rendering a body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("failed to read body: {0}")]
    Read(#[source] axum::Error),

    #[error("failed to copy body: {0}")]
    Copy(#[from] io::Error),
}

/// The read failure replayed to the handler after a partial read.
#[derive(Debug, Clone, Error)]
#[error("request body read failed: {0}")]
pub struct ReplayedReadError(String);

/// Textual rendering of a body.
#[derive(Debug, Clone, Default)]
pub struct RenderedBody {
    /// Body text, chunk-framed if the message was chunked.
    pub text: String,
    /// Trailers received at the end of the body, if any.
    pub trailers: Option<HeaderMap>,
}

/// Frames read from the original body.
#[derive(Debug, Default)]
struct Buffered {
    chunks: Vec<Bytes>,
    trailers: Option<HeaderMap>,
}

impl Buffered {
    fn push(&mut self, frame: Frame<Bytes>) {
        match frame.into_data() {
            Ok(data) => self.chunks.push(data),
            Err(frame) => {
                if let Ok(trailers) = frame.into_trailers() {
                    self.trailers.get_or_insert_with(HeaderMap::new).extend(trailers);
                }
            }
        }
    }

    fn frames(&self) -> VecDeque<Frame<Bytes>> {
        let mut frames: VecDeque<_> = self.chunks.iter().cloned().map(Frame::data).collect();
        if let Some(trailers) = &self.trailers {
            frames.push_back(Frame::trailers(trailers.clone()));
        }
        frames
    }
}

/// An in-memory body that replays previously read frames.
#[derive(Debug)]
pub struct ReplayBody {
    frames: VecDeque<Frame<Bytes>>,
    remaining: u64,
    failure: Option<ReplayedReadError>,
}

impl ReplayBody {
    fn new(frames: VecDeque<Frame<Bytes>>) -> Self {
        let remaining = frames
            .iter()
            .filter_map(Frame::data_ref)
            .map(|data| data.len() as u64)
            .sum();
        Self {
            frames,
            remaining,
            failure: None,
        }
    }

    fn failing(frames: VecDeque<Frame<Bytes>>, failure: ReplayedReadError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(frames)
        }
    }
}

impl HttpBody for ReplayBody {
    type Data = Bytes;
    type Error = ReplayedReadError;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if let Some(frame) = this.frames.pop_front() {
            if let Some(data) = frame.data_ref() {
                this.remaining -= data.len() as u64;
            }
            return Poll::Ready(Some(Ok(frame)));
        }
        Poll::Ready(this.failure.take().map(Err))
    }

    fn is_end_stream(&self) -> bool {
        self.frames.is_empty() && self.failure.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        if self.failure.is_some() {
            let mut hint = SizeHint::new();
            hint.set_lower(self.remaining);
            hint
        } else {
            SizeHint::with_exact(self.remaining)
        }
    }
}

/// Read `body` into memory and return two equivalent bodies.
///
/// A body that is already at end-of-stream (the "no body" case) is not
/// read; both returned bodies are empty.
pub async fn replicate(mut body: Body) -> Result<(Body, Body), ReplicateError> {
    if body.is_end_stream() {
        return Ok((Body::empty(), Body::empty()));
    }

    let mut buffered = Buffered::default();
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => buffered.push(frame),
            Err(source) => {
                let failure = ReplayedReadError(source.to_string());
                let body = Body::new(ReplayBody::failing(buffered.frames(), failure));
                return Err(ReplicateError { source, body });
            }
        }
    }

    Ok((
        Body::new(ReplayBody::new(buffered.frames())),
        Body::new(ReplayBody::new(buffered.frames())),
    ))
}

/// Render the request body as text, leaving an intact body on `req`.
pub async fn render_body(req: &mut Request<Body>) -> Result<RenderedBody, BodyError> {
    let chunked = transfer_encodings(req.headers())
        .first()
        .is_some_and(|te| te == "chunked");

    let original = std::mem::take(req.body_mut());
    let (capture, handler) = match replicate(original).await {
        Ok(pair) => pair,
        Err(ReplicateError { source, body }) => {
            *req.body_mut() = body;
            return Err(BodyError::Read(source));
        }
    };
    *req.body_mut() = handler;

    render_copy(capture, chunked).await
}

async fn render_copy(mut body: Body, chunked: bool) -> Result<RenderedBody, BodyError> {
    let mut plain = Vec::new();
    let mut framed = ChunkedWriter::new(Vec::new());
    let mut trailers: Option<HeaderMap> = None;

    {
        let dest: &mut (dyn Write + Send) = if chunked { &mut framed } else { &mut plain };
        while let Some(frame) = body.frame().await {
            match frame.map_err(BodyError::Read)?.into_data() {
                Ok(data) => dest.write_all(&data)?,
                Err(frame) => {
                    if let Ok(t) = frame.into_trailers() {
                        trailers.get_or_insert_with(HeaderMap::new).extend(t);
                    }
                }
            }
        }
    }

    let bytes = if chunked {
        let mut out = framed.finish()?;
        out.extend_from_slice(CRLF);
        out
    } else {
        plain
    };

    Ok(RenderedBody {
        text: String::from_utf8_lossy(&bytes).into_owned(),
        trailers,
    })
}
