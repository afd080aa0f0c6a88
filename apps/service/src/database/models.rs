use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default probe interval stored for new rows, in seconds.
pub const DEFAULT_INTERVAL: &str = "30";

/// One registered endpoint, a row of the `collection` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionRecord {
    pub id: i64,
    pub url: String,
    /// Local part of the owner's email
    pub username: String,
    /// Protocol tag as stored; normalized when turned into a probe
    pub service_type: String,
    /// Seconds between probes, kept as text like the legacy schema
    pub interval: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for [`CollectionRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollection {
    pub url: String,
    pub username: String,
    pub service_type: String,
    pub interval: String,
}

/// Convert a stored Unix timestamp, clamping garbage to the epoch.
pub fn from_unix(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
