//! Fallback record entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::market::DataType;

/// Last known-good payload and failure bookkeeping for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRecord {
    pub symbol: String,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub failure_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl FallbackRecord {
    pub fn new(symbol: impl Into<String>, data_type: DataType, now: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            data_type,
            data: None,
            failure_count: 0,
            last_error: None,
            last_failure_at: None,
            last_success_at: None,
            updated_at: now,
        }
    }

    pub fn record_failure(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_error = Some(error.into());
        self.last_failure_at = Some(now);
        self.updated_at = now;
    }

    pub fn record_success(&mut self, data: Value, now: DateTime<Utc>) {
        self.data = Some(data);
        self.last_success_at = Some(now);
        self.updated_at = now;
    }
}
