//! Bulk execution results and progress events.

use chrono::{DateTime, Utc};
use parser::{RankingRecord, Reliability};
use pool::{ErrorKind, PoolStats, TrackError};
use serde::{Deserialize, Serialize};

/// A keyword that could not be resolved, with its failure category and
/// the credential that served the last attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedLookup {
    pub keyword: String,
    pub error: String,
    pub kind: ErrorKind,
    pub failed_at: DateTime<Utc>,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
}

impl FailedLookup {
    pub fn from_error(keyword: String, error: &TrackError) -> Self {
        Self {
            keyword,
            error: error.message.clone(),
            kind: error.kind,
            failed_at: Utc::now(),
            retry_count: 0,
            credential_id: error.credential_id.clone(),
        }
    }
}

/// Distribution of record reliability across a bulk run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QualityHistogram {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl QualityHistogram {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a RankingRecord>,
    {
        let mut histogram = Self::default();
        for record in records {
            match record.reliability {
                Reliability::High => histogram.high += 1,
                Reliability::Medium => histogram.medium += 1,
                Reliability::Low => histogram.low += 1,
            }
        }
        histogram
    }
}

/// Outcome of a bulk run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResult {
    pub total_processed: usize,
    pub records: Vec<RankingRecord>,
    pub failures: Vec<FailedLookup>,
    pub duration_ms: u64,
    pub pool: PoolStats,
    pub quality: QualityHistogram,
}

/// Progress event emitted after each batch and each retry pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkProgress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pool: PoolStats,
    /// Set during retry passes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempt: Option<u32>,
}
