//! Event sources: the delivery side of the ingestion boundary.
//!
//! Delivery is at-least-once. A message handed out by
//! [`EventSource::next_message`] stays pending until [`EventSource::commit`]
//! acknowledges it; a consumer that stops before committing sees it again
//! on the next run.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::error::IngestResult;

/// A stream of raw event messages with manual acknowledgement.
#[async_trait::async_trait]
pub trait EventSource: Send {
    /// Next raw message, or `None` once the source is exhausted.
    ///
    /// # Errors
    /// Returns [`IngestError::Io`](crate::IngestError::Io) if the underlying
    /// stream fails.
    async fn next_message(&mut self) -> IngestResult<Option<String>>;

    /// Acknowledge every message delivered so far.
    ///
    /// # Errors
    /// Returns an error if the acknowledgement cannot be recorded.
    async fn commit(&mut self) -> IngestResult<()>;
}

/// Newline-delimited JSON messages read from any buffered async reader.
///
/// Blank lines are skipped. The source keeps a delivered/committed cursor
/// so callers can report how far ingestion got.
#[derive(Debug)]
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    delivered: u64,
    committed: u64,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            delivered: 0,
            committed: 0,
        }
    }

    /// Messages handed out so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Messages acknowledged so far.
    #[must_use]
    pub fn committed(&self) -> u64 {
        self.committed
    }
}

#[async_trait::async_trait]
impl<R> EventSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_message(&mut self) -> IngestResult<Option<String>> {
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            self.delivered += 1;
            return Ok(Some(line));
        }
        Ok(None)
    }

    async fn commit(&mut self) -> IngestResult<()> {
        self.committed = self.delivered;
        Ok(())
    }
}
