//! The consumer loop: read, decode, apply with retry, acknowledge.

use backon::Retryable;
use serde::Serialize;

use timbre_core::{Journal, TrackEvent};

use crate::engine::{ApplyOutcome, RecommendationEngine};
use crate::error::{IngestError, IngestResult};
use crate::resilience::RetryPolicy;
use crate::source::EventSource;
use crate::wire;

/// A message that was not applied and needs a human to look at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// 1-based position of the message in this run.
    pub position: u64,
    pub reason: String,
    pub message: String,
}

/// What happened to each message of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub applied: u64,
    pub deduplicated: u64,
    /// Malformed messages, unknown operations, and embeddings of the wrong
    /// dimension, with their payloads. None of these are marked applied.
    pub rejections: Vec<Rejection>,
    /// Events whose retries ran out. Ingestion stops at the first one so it
    /// is redelivered on the next run.
    pub failed: u64,
}

impl IngestReport {
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejections.len() as u64
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.applied + self.deduplicated + self.rejected() + self.failed
    }

    /// Whether every message was applied or deduplicated.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty() && self.failed == 0
    }

    fn reject(&mut self, position: u64, reason: &IngestError, message: String) {
        self.rejections.push(Rejection {
            position,
            reason: reason.to_string(),
            message,
        });
    }
}

/// Drives events from an [`EventSource`] into a [`RecommendationEngine`].
///
/// A message is acknowledged only once its event has been applied or found
/// to be a duplicate, so a crash between the two leads to a redelivery that
/// the event log absorbs.
#[derive(Debug)]
pub struct Ingestor<'a, S> {
    engine: &'a RecommendationEngine<S>,
    policy: RetryPolicy,
}

impl<'a, S> Ingestor<'a, S>
where
    S: Journal + Send,
{
    pub fn new(engine: &'a RecommendationEngine<S>, policy: RetryPolicy) -> Self {
        Self { engine, policy }
    }

    /// Apply one event, retrying transient failures with back-off.
    ///
    /// # Errors
    /// Returns the last error once retries are exhausted, or the first
    /// non-transient error.
    pub async fn apply(&self, event: &TrackEvent) -> IngestResult<ApplyOutcome> {
        (|| async { self.engine.apply_event(event).await })
            .retry(self.policy.backoff())
            .when(IngestError::is_transient)
            .notify(|err, delay| log::warn!("Retrying {event} in {delay:?}: {err}"))
            .await
    }

    /// Consume `source` until it is exhausted or an event cannot be applied.
    ///
    /// # Errors
    /// Returns an error if the source fails or the store reports a
    /// persistence fault. Rejected messages and exhausted retries are
    /// reported in the [`IngestReport`] instead.
    pub async fn run<E>(&self, source: &mut E) -> IngestResult<IngestReport>
    where
        E: EventSource + ?Sized,
    {
        let mut report = IngestReport::default();
        let mut position = 0_u64;

        while let Some(message) = source.next_message().await? {
            position += 1;
            let event = match wire::decode(&message) {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Rejected message {position} ({e}): {message}");
                    report.reject(position, &e, message);
                    continue;
                }
            };

            match self.apply(&event).await {
                Ok(ApplyOutcome::Deduplicated) => report.deduplicated += 1,
                Ok(ApplyOutcome::Applied { .. }) => report.applied += 1,
                Err(e) if e.is_schema_violation() => {
                    log::warn!("Rejected {event}: {e}");
                    report.reject(position, &e, message);
                    continue;
                }
                Err(e) if e.is_rebuild_failure() => {
                    log::error!("Applied {event} but could not refresh the index: {e}");
                    return Err(e);
                }
                Err(e) if e.is_transient() => {
                    log::error!(
                        "Giving up on {event} after {} retries: {e}",
                        self.policy.max_retries()
                    );
                    report.failed += 1;
                    break;
                }
                Err(e) => {
                    log::error!("Failed to apply {event}: {e}");
                    return Err(e);
                }
            }

            source.commit().await?;
        }

        log::info!(
            "Ingestion finished: {} applied, {} duplicate, {} rejected, {} failed",
            report.applied,
            report.deduplicated,
            report.rejected(),
            report.failed
        );
        Ok(report)
    }
}
