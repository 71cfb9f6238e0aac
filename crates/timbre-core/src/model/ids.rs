use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a track, as assigned by the upstream catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(u64);

impl TrackId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// SQLite stores integers as `i64`; catalog ids never reach the sign bit.
    pub(crate) fn to_sql(self) -> crate::Result<i64> {
        i64::try_from(self.0)
            .map_err(|_| crate::Error::InvalidData(format!("track id {} out of range", self.0)))
    }

    pub(crate) fn from_sql(value: i64) -> crate::Result<Self> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| crate::Error::InvalidData(format!("negative track id {value}")))
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of one logical lifecycle event.
///
/// Redeliveries of the same event carry the same id; the event log uses it
/// to apply every event at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
