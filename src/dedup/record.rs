//! Persisted processing record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied context stored alongside a record.
pub type Metadata = Map<String, Value>;

/// Wire names of the fields the tracker generates itself.
pub const RESERVED_FIELDS: [&str; 3] = ["msgId", "processedAt", "timestamp"];

/// Proof that a message was handled, stored under `prefix:msgId`.
///
/// Wire format: `{msgId, processedAt, timestamp, ...metadata}` where
/// `processedAt` is ISO-8601 with millisecond precision and `timestamp` is the
/// same instant in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    #[serde(rename = "msgId")]
    pub msg_id: String,

    /// Human-readable audit timestamp.
    #[serde(rename = "processedAt", with = "iso_millis")]
    pub processed_at: DateTime<Utc>,

    /// Epoch milliseconds used for the retry-window comparison.
    #[serde(rename = "timestamp")]
    pub processed_at_millis: i64,

    #[serde(flatten)]
    pub metadata: Metadata,
}

impl ProcessingRecord {
    /// Build a record stamped at `now`.
    ///
    /// Both timestamps come from the same reading truncated to milliseconds.
    /// Metadata entries named like a generated field are dropped.
    pub fn new(msg_id: impl Into<String>, mut metadata: Metadata, now: DateTime<Utc>) -> Self {
        for field in RESERVED_FIELDS {
            metadata.remove(field);
        }

        let millis = now.timestamp_millis();
        let processed_at = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(now);

        Self {
            msg_id: msg_id.into(),
            processed_at,
            processed_at_millis: millis,
            metadata,
        }
    }

    /// Milliseconds elapsed between processing and `now`.
    pub fn age_millis(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis()
            .saturating_sub(self.processed_at_millis)
    }

    /// Whether the record is recent enough to suppress a redelivery.
    ///
    /// A record older than `now - window` is stale and the message becomes
    /// eligible for another attempt.
    pub fn is_within_window(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let cutoff = now
            .timestamp_millis()
            .saturating_sub(window.num_milliseconds());
        self.processed_at_millis >= cutoff
    }

    /// Look up a metadata value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.metadata.get(field)
    }
}

mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
