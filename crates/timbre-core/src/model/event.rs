use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{EventId, TrackId};
use crate::error::Error;

/// The lifecycle operation carried by a track event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// A new track was published; its content must be embedded and stored.
    Add,
    /// The track's content changed; its embedding is replaced wholesale.
    Update,
    /// The track was removed from the catalog.
    Delete,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Whether the operation needs the track content to be fetched and embedded.
    #[must_use]
    pub const fn needs_content(self) -> bool {
        matches!(self, Self::Add | Self::Update)
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidData(format!("unknown operation: {other}"))),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated track lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub event_id: EventId,
    pub track_id: TrackId,
    pub operation: Operation,
    /// Object key of the track content. Unused for deletes.
    pub source: String,
}

impl TrackEvent {
    #[must_use]
    pub fn new(
        event_id: impl Into<EventId>,
        track_id: impl Into<TrackId>,
        operation: Operation,
        source: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            track_id: track_id.into(),
            operation,
            source: source.into(),
        }
    }
}

impl fmt::Display for TrackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} track {}",
            self.event_id, self.operation, self.track_id
        )
    }
}

/// An entry of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    pub applied_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse() {
        assert_eq!("add".parse::<Operation>().unwrap(), Operation::Add);
        assert_eq!("update".parse::<Operation>().unwrap(), Operation::Update);
        assert_eq!("delete".parse::<Operation>().unwrap(), Operation::Delete);
        assert!("upsert".parse::<Operation>().is_err());
        assert!("ADD".parse::<Operation>().is_err());
    }

    #[test]
    fn test_operation_needs_content() {
        assert!(Operation::Add.needs_content());
        assert!(Operation::Update.needs_content());
        assert!(!Operation::Delete.needs_content());
    }

    #[test]
    fn test_track_event_display() {
        let event = TrackEvent::new("evt-9", TrackId::new(3), Operation::Delete, "");
        assert_eq!(event.to_string(), "evt-9 delete track 3");
    }
}
