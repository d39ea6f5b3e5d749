use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directed connection between two stored points. Connections are never
/// mutated after insert; they are removed individually or by the cascading
/// delete of either endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: u64,
    pub origin_id: u64,
    pub destination_id: u64,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    /// Whether this connection references the given point on either side.
    pub fn touches(&self, point_id: u64) -> bool {
        self.origin_id == point_id || self.destination_id == point_id
    }
}

/// Caller payload for `add_connection`. Both endpoints must exist at insert
/// time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectionDraft {
    pub origin_id: u64,
    pub destination_id: u64,
}

impl ConnectionDraft {
    pub fn new(origin_id: u64, destination_id: u64) -> Self {
        Self {
            origin_id,
            destination_id,
        }
    }
}
