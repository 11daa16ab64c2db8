//! Streaming response accumulation.
//!
//! Folds a [`FrameStream`] into the final reply text and outcome.

use crate::error::{CoreError, CoreResult};
use crate::llm::client::{FrameStream, StreamFrame};
use futures::StreamExt;

/// Diagnostic used when a stream ends without its terminal frame.
pub const MISSING_TERMINAL_FRAME: &str = "stream ended without a completion frame";

/// Accumulates the frames of one streaming reply.
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    /// Accumulated text content
    content: String,
    /// Number of token frames seen
    tokens: usize,
    /// Error carried by the terminal frame
    error: Option<CoreError>,
    /// Whether the terminal frame has been seen
    finished: bool,
}

impl StreamAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one frame and returns true once the stream is finished.
    ///
    /// Frames arriving after the terminal frame are ignored.
    pub fn push(&mut self, frame: &StreamFrame) -> bool {
        if self.finished {
            return true;
        }
        if let Some(token) = &frame.token {
            self.content.push_str(token);
            self.tokens += 1;
        }
        if frame.done {
            self.error = frame.error.clone();
            self.finished = true;
        }
        self.finished
    }

    /// Returns the text accumulated so far.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the number of token frames seen.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens
    }

    /// Returns the terminal error, if the stream failed.
    #[must_use]
    pub fn error(&self) -> Option<&CoreError> {
        self.error.as_ref()
    }

    /// Returns true once the terminal frame has been seen.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Converts the accumulated state into the reply.
    ///
    /// # Errors
    ///
    /// Returns the terminal frame's error, or `Unknown` when the stream
    /// ended without a terminal frame.
    pub fn into_result(self) -> CoreResult<String> {
        if !self.finished {
            return Err(CoreError::unknown(MISSING_TERMINAL_FRAME));
        }
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.content),
        }
    }

    /// Drains a frame stream and returns the reply.
    ///
    /// # Errors
    ///
    /// See [`StreamAccumulator::into_result`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use chorus::llm::{FrameStream, StreamAccumulator, StreamFrame};
    ///
    /// # tokio_test::block_on(async {
    /// let frames = vec![
    ///     StreamFrame::token("Hel"),
    ///     StreamFrame::token("lo"),
    ///     StreamFrame::done(),
    /// ];
    /// let stream: FrameStream = Box::pin(futures::stream::iter(frames));
    /// assert_eq!(StreamAccumulator::collect(stream).await.unwrap(), "Hello");
    /// # });
    /// ```
    pub async fn collect(mut stream: FrameStream) -> CoreResult<String> {
        let mut accumulator = Self::new();
        while let Some(frame) = stream.next().await {
            if accumulator.push(&frame) {
                break;
            }
        }
        accumulator.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn frames(frames: Vec<StreamFrame>) -> FrameStream {
        Box::pin(futures::stream::iter(frames))
    }

    #[test]
    fn accumulates_tokens_until_done() {
        let mut accumulator = StreamAccumulator::new();
        assert!(!accumulator.push(&StreamFrame::token("Hel")));
        assert!(!accumulator.push(&StreamFrame::token("lo")));
        assert!(accumulator.push(&StreamFrame::done()));

        assert_eq!(accumulator.content(), "Hello");
        assert_eq!(accumulator.token_count(), 2);
        assert!(accumulator.error().is_none());
        assert_eq!(accumulator.into_result().unwrap(), "Hello");
    }

    #[test]
    fn ignores_frames_after_terminal() {
        let mut accumulator = StreamAccumulator::new();
        accumulator.push(&StreamFrame::done());
        accumulator.push(&StreamFrame::token("late"));
        assert_eq!(accumulator.content(), "");
    }

    #[test]
    fn terminal_error_wins_over_partial_text() {
        let mut accumulator = StreamAccumulator::new();
        accumulator.push(&StreamFrame::token("partial"));
        accumulator.push(&StreamFrame::failed(CoreError::cancelled()));

        assert_eq!(accumulator.content(), "partial");
        assert!(accumulator.into_result().unwrap_err().is_timeout());
    }

    #[test]
    fn unfinished_stream_is_unknown() {
        let mut accumulator = StreamAccumulator::new();
        accumulator.push(&StreamFrame::token("x"));
        let error = accumulator.into_result().unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert_eq!(error.message, MISSING_TERMINAL_FRAME);
    }

    #[tokio::test]
    async fn collect_drains_stream() {
        let stream = frames(vec![
            StreamFrame::token("a"),
            StreamFrame::token("b"),
            StreamFrame::done(),
        ]);
        assert_eq!(StreamAccumulator::collect(stream).await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn collect_reports_truncated_stream() {
        let stream = frames(vec![StreamFrame::token("a")]);
        let error = StreamAccumulator::collect(stream).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unknown);
    }
}
