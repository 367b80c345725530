use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single key/value/timestamp tuple held by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub key: String,
    pub value: Value,
    /// Unix timestamp (seconds) of the write that produced this value
    pub updated_at: i64,
}

impl StateRecord {
    pub fn new(key: impl Into<String>, value: Value, updated_at: i64) -> Self {
        Self {
            key: key.into(),
            value,
            updated_at,
        }
    }

    /// Record stamped with the current wall-clock time
    pub fn now(key: impl Into<String>, value: Value) -> Self {
        Self::new(key, value, unix_now())
    }
}

pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
