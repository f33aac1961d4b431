//! Persistence traits consumed by the pool and the scheduler.
//!
//! Durability is deliberately off the lookup critical path: the pool
//! returns results as soon as in-memory counters are updated and
//! schedules these writes asynchronously. Every write is an upsert keyed
//! by id, so replays are harmless.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parser::RankingRecord;
use thiserror::Error;

use crate::credential::{Credential, UsagePatch};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("credential not found: {0}")]
    NotFound(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Durable projection of credential entities.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<Credential>, StoreError>;

    /// Insert or fully replace a credential by id.
    async fn upsert(&self, credential: &Credential) -> Result<(), StoreError>;

    /// Merge a usage patch into an existing record; creates nothing.
    async fn upsert_usage(&self, id: &str, patch: UsagePatch) -> Result<(), StoreError>;

    /// Returns whether a record was actually removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Zero daily counters and error counts; returns affected count.
    async fn reset_daily_all(&self) -> Result<u64, StoreError>;

    /// Zero monthly counters and stamp the new reset time.
    async fn reset_monthly_all(&self, reset_at: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Append-only store of ranking records.
#[async_trait]
pub trait RankingStore: Send + Sync {
    async fn append(&self, record: &RankingRecord) -> Result<(), StoreError>;

    /// Most recent records for a domain, newest first.
    async fn recent_for_domain(
        &self,
        domain: &str,
        limit: usize,
    ) -> Result<Vec<RankingRecord>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Drop records older than the cutoff; returns how many were removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
