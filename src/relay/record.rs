//! Log record construction and batch encoding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::apm::LinkingMetadata;

pub const KEY_TIMESTAMP: &str = "timestamp";
pub const KEY_MESSAGE: &str = "message";

/// One structured log line.
pub type LogRecord = Map<String, Value>;

/// Envelope for a batch of records: `{"logs": [...]}`.
#[derive(Debug, Serialize)]
pub struct LogBatch<'a> {
    pub logs: &'a [LogRecord],
}

/// Build a record from linking metadata, a millisecond timestamp and a
/// message. Timestamp and message win over metadata keys of the same name.
pub fn build_record(metadata: &LinkingMetadata, timestamp_ms: u64, message: &str) -> LogRecord {
    let mut record: LogRecord = metadata
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
        .collect();
    record.insert(KEY_TIMESTAMP.to_string(), Value::from(timestamp_ms));
    record.insert(KEY_MESSAGE.to_string(), Value::String(message.to_string()));
    record
}

/// Current time in whole milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Serialize `records` as the ingestion body `[{"logs": records}]`.
pub fn encode_batch(records: &[LogRecord]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&[LogBatch { logs: records }])
}
