//! Cache record and related value types

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::is_base_snapshot_key;
use crate::domain::DomainError;

/// How quickly a cached value is expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Volatility {
    High,
    #[default]
    Medium,
    Low,
}

impl Volatility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Volatility::High => "HIGH",
            Volatility::Medium => "MEDIUM",
            Volatility::Low => "LOW",
        }
    }

    /// One step calmer: HIGH becomes MEDIUM, anything else becomes LOW
    pub fn downgrade(self) -> Self {
        match self {
            Volatility::High => Volatility::Medium,
            Volatility::Medium | Volatility::Low => Volatility::Low,
        }
    }
}

impl fmt::Display for Volatility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Volatility {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HIGH" => Ok(Volatility::High),
            "MEDIUM" => Ok(Volatility::Medium),
            "LOW" => Ok(Volatility::Low),
            _ => Err(DomainError::validation(format!(
                "Unknown volatility: {}. Valid values: HIGH, MEDIUM, LOW",
                s
            ))),
        }
    }
}

/// A row of the backing cache table
///
/// `ttl` is the absolute expiry in epoch seconds. The record is valid
/// while `ttl > now`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub key: String,
    pub data: Value,
    pub ttl: i64,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
    #[serde(default)]
    pub volatility: Volatility,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_differential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_data_key: Option<String>,
    /// Size of the full payload a diff entry stands for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
}

impl CacheRecord {
    /// Full, non-differential record
    pub fn full(
        key: impl Into<String>,
        data: Value,
        expires_at: i64,
        volatility: Volatility,
        now: DateTime<Utc>,
    ) -> Self {
        let size = payload_size(&data);

        Self {
            key: key.into(),
            data,
            ttl: expires_at,
            created_at: now,
            last_modified: now,
            size,
            volatility,
            is_differential: false,
            base_data_key: None,
            original_size: None,
        }
    }

    /// Differential record holding only the changed fields
    pub fn differential(
        key: impl Into<String>,
        diff: Value,
        base_data_key: impl Into<String>,
        original_size: u64,
        expires_at: i64,
        volatility: Volatility,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self::full(key, diff, expires_at, volatility, now);
        record.is_differential = true;
        record.base_data_key = Some(base_data_key.into());
        record.original_size = Some(original_size);
        record
    }

    pub fn is_valid_at(&self, now_epoch_secs: i64) -> bool {
        self.ttl > now_epoch_secs
    }

    pub fn remaining_ttl(&self, now_epoch_secs: i64) -> Duration {
        Duration::from_secs((self.ttl - now_epoch_secs).max(0) as u64)
    }
}

/// Serialized JSON size of a payload in bytes
pub fn payload_size(data: &Value) -> u64 {
    serde_json::to_vec(data).map(|bytes| bytes.len() as u64).unwrap_or(0)
}

/// A successful cache read
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub key: String,
    /// Full payload, reconstructed from base and diff when needed
    pub data: Value,
    pub expires_at: i64,
    pub ttl_remaining: Duration,
    pub volatility: Volatility,
    pub is_differential: bool,
}

/// Options for a cache write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    pub volatility: Volatility,
    pub use_differential: bool,
    pub base_data_key: Option<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volatility(mut self, volatility: Volatility) -> Self {
        self.volatility = volatility;
        self
    }

    /// Store as a diff against the snapshot kept for `base_data_key`
    pub fn differential(mut self, base_data_key: impl Into<String>) -> Self {
        self.use_differential = true;
        self.base_data_key = Some(base_data_key.into());
        self
    }
}

/// Differential storage accounting, over diff entries only
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferentialStats {
    pub entries: usize,
    pub original_size_bytes: u64,
    pub actual_size_bytes: u64,
    pub savings_bytes: u64,
    pub savings_percent: f64,
}

/// Snapshot of the cache table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub base_snapshots: usize,
    pub total_size_bytes: u64,
    pub differential: DifferentialStats,
}

impl CacheStats {
    /// Aggregates a full table scan
    pub fn from_records(records: &[CacheRecord], now_epoch_secs: i64) -> Self {
        let mut stats = CacheStats::default();

        for record in records {
            stats.total_entries += 1;
            stats.total_size_bytes += record.size;

            if is_base_snapshot_key(&record.key) {
                stats.base_snapshots += 1;
            }

            if record.is_valid_at(now_epoch_secs) {
                stats.valid_entries += 1;
            } else {
                stats.expired_entries += 1;
            }

            if record.is_differential {
                let diff = &mut stats.differential;
                diff.entries += 1;
                diff.actual_size_bytes += record.size;
                diff.original_size_bytes += record.original_size.unwrap_or(record.size);
            }
        }

        let diff = &mut stats.differential;
        diff.savings_bytes = diff.original_size_bytes.saturating_sub(diff.actual_size_bytes);
        diff.savings_percent = if diff.original_size_bytes > 0 {
            diff.savings_bytes as f64 / diff.original_size_bytes as f64 * 100.0
        } else {
            0.0
        };

        stats
    }
}
