//! Incremental-frame parser for server-sent event replies.
//!
//! Network chunks do not respect line boundaries, so the parser keeps a byte
//! buffer and only decodes complete lines. Each `data: ` line is parsed as
//! JSON and handed to a provider-specific [`DeltaExtractor`] that knows where
//! that provider nests its text delta.

use crate::error::CoreError;
use crate::llm::client::{FrameStream, StreamFrame};
use futures::{Stream, StreamExt};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Prefix of every event payload line.
pub const DATA_PREFIX: &str = "data:";

/// Explicit end-of-stream sentinel used by OpenAI-style providers.
pub const DONE_SENTINEL: &str = "[DONE]";

/// What a provider frame contributes to the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Incremental reply text
    Text(String),
    /// A frame with no text (role headers, pings, usage, stop markers)
    Ignore,
    /// An in-band error reported by the provider
    Failed(CoreError),
}

/// Extracts the text delta from one parsed frame.
pub type DeltaExtractor = fn(&serde_json::Value) -> Delta;

/// Line-buffering parser over raw response bytes.
pub struct FrameParser {
    buffer: Vec<u8>,
    extract: DeltaExtractor,
}

impl fmt::Debug for FrameParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameParser")
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl FrameParser {
    /// Creates a parser using the given extractor.
    #[must_use]
    pub fn new(extract: DeltaExtractor) -> Self {
        Self {
            buffer: Vec::new(),
            extract,
        }
    }

    /// Feeds a chunk of bytes and returns the deltas of every completed line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Delta> {
        self.buffer.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(delta) = self.parse_line(&line[..newline]) {
                deltas.push(delta);
            }
        }
        deltas
    }

    /// Parses whatever is left in the buffer once the byte stream has ended.
    pub fn finish(&mut self) -> Option<Delta> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.parse_line(&line)
    }

    fn parse_line(&self, raw: &[u8]) -> Option<Delta> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return None;
        }

        let data = line.strip_prefix(DATA_PREFIX)?.trim_start();
        if data == DONE_SENTINEL {
            return None;
        }

        match serde_json::from_str::<serde_json::Value>(data) {
            Ok(frame) => match (self.extract)(&frame) {
                Delta::Text(text) if text.is_empty() => None,
                Delta::Ignore => None,
                delta => Some(delta),
            },
            Err(e) => {
                tracing::debug!(error = %e, line = %data, "Skipping unparseable stream frame");
                None
            }
        }
    }
}

/// Turns a response byte stream into a frame stream.
///
/// The returned stream yields one token frame per text delta and then
/// exactly one terminal frame:
/// - `done()` when the byte stream completes after at least one token,
/// - a `ProviderError` ("no response") when it completes without any,
/// - the provider's error for an in-band error frame,
/// - `Unknown` when reading the body fails,
/// - `Timeout` ("the operation was cancelled") when `cancellation` fires.
///
/// The byte stream is dropped as soon as the terminal frame is produced.
pub fn frame_stream<S, B, E>(
    bytes: S,
    extract: DeltaExtractor,
    provider: String,
    cancellation: CancellationToken,
) -> FrameStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut parser = FrameParser::new(extract);
        let mut produced = false;

        loop {
            let next = tokio::select! {
                biased;
                () = cancellation.cancelled() => None,
                next = bytes.next() => Some(next),
            };

            let Some(next) = next else {
                tracing::debug!(provider = %provider, "Stream cancelled by caller");
                drop(bytes);
                yield StreamFrame::failed(CoreError::cancelled());
                return;
            };

            match next {
                Some(Ok(chunk)) => {
                    for delta in parser.push(chunk.as_ref()) {
                        match delta {
                            Delta::Text(text) => {
                                produced = true;
                                yield StreamFrame::token(text);
                            }
                            Delta::Failed(error) => {
                                tracing::warn!(
                                    provider = %provider,
                                    error = %error,
                                    "Provider reported an error mid-stream"
                                );
                                yield StreamFrame::failed(error);
                                return;
                            }
                            Delta::Ignore => {}
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(provider = %provider, error = %e, "Stream read failed");
                    let error = CoreError::unknown(format!("stream read error: {e}"));
                    yield StreamFrame::failed(error);
                    return;
                }
                None => break,
            }
        }

        match parser.finish() {
            Some(Delta::Text(text)) => {
                produced = true;
                yield StreamFrame::token(text);
            }
            Some(Delta::Failed(error)) => {
                yield StreamFrame::failed(error);
                return;
            }
            Some(Delta::Ignore) | None => {}
        }

        if produced {
            yield StreamFrame::done();
        } else {
            yield StreamFrame::failed(CoreError::no_response(&provider));
        }
    })
}

/// Builds a frame stream from a future that opens the streaming response.
///
/// Opening is raced against `cancellation` as well, so a stream cancelled
/// before the provider answers still ends with a terminal frame.
pub fn open_frame_stream<F, S, B, E>(
    open: F,
    extract: DeltaExtractor,
    provider: String,
    cancellation: CancellationToken,
) -> FrameStream
where
    F: std::future::Future<Output = Result<S, CoreError>> + Send + 'static,
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let opened = tokio::select! {
            biased;
            () = cancellation.cancelled() => Err(CoreError::cancelled()),
            opened = open => opened,
        };

        match opened {
            Ok(bytes) => {
                let mut frames = frame_stream(bytes, extract, provider, cancellation);
                while let Some(frame) = frames.next().await {
                    yield frame;
                }
            }
            Err(error) => yield StreamFrame::failed(error),
        }
    })
}
