//! Wire format of track lifecycle messages.
//!
//! The upstream outbox producer publishes one JSON object per event:
//!
//! ```json
//! {"event_id": "…", "track_id": 17, "operation": "add", "source": "tracks/17.mp3",
//!  "name": "…", "genre_id": 3}
//! ```
//!
//! Only `event_id`, `track_id`, `operation`, and `source` are used; other
//! fields are ignored.

use serde::{Deserialize, Serialize};
use timbre_core::{Operation, TrackEvent, TrackId};

use crate::error::{IngestError, IngestResult};

/// A message as it appears on the wire, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    pub event_id: String,
    pub track_id: u64,
    pub operation: String,
    #[serde(default)]
    pub source: String,
}

impl TryFrom<WireEvent> for TrackEvent {
    type Error = IngestError;

    fn try_from(wire: WireEvent) -> IngestResult<Self> {
        if wire.event_id.trim().is_empty() {
            return Err(IngestError::Decode("event_id is empty".to_string()));
        }
        let operation: Operation = wire
            .operation
            .parse()
            .map_err(|_| IngestError::UnknownOperation(wire.operation.clone()))?;
        if operation.needs_content() && wire.source.trim().is_empty() {
            return Err(IngestError::Decode(format!(
                "{operation} event {} has no source",
                wire.event_id
            )));
        }

        Ok(Self::new(
            wire.event_id,
            TrackId::new(wire.track_id),
            operation,
            wire.source,
        ))
    }
}

impl From<&TrackEvent> for WireEvent {
    fn from(event: &TrackEvent) -> Self {
        Self {
            event_id: event.event_id.to_string(),
            track_id: event.track_id.get(),
            operation: event.operation.to_string(),
            source: event.source.clone(),
        }
    }
}

/// Decode and validate one message.
///
/// # Errors
/// Returns [`IngestError::Decode`] for malformed JSON or missing fields and
/// [`IngestError::UnknownOperation`] for an operation outside add, update,
/// and delete.
pub fn decode(message: &str) -> IngestResult<TrackEvent> {
    let wire: WireEvent =
        serde_json::from_str(message).map_err(|e| IngestError::Decode(e.to_string()))?;
    TrackEvent::try_from(wire)
}

/// Encode an event in the wire format.
pub fn encode(event: &TrackEvent) -> IngestResult<String> {
    serde_json::to_string(&WireEvent::from(event)).map_err(|e| IngestError::Decode(e.to_string()))
}
