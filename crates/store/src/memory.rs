//! In-memory storage backend.
//!
//! Default backend for development and tests; a deployment wanting
//! durability across restarts plugs its own implementation of the traits
//! behind the same seam.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parser::RankingRecord;

use crate::credential::{Credential, UsagePatch};
use crate::repository::{CredentialStore, RankingStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    credentials: DashMap<String, Credential>,
    rankings: RwLock<Vec<RankingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<Credential>, StoreError> {
        Ok(self
            .credentials
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn upsert(&self, credential: &Credential) -> Result<(), StoreError> {
        self.credentials
            .insert(credential.id.clone(), credential.clone());
        Ok(())
    }

    async fn upsert_usage(&self, id: &str, patch: UsagePatch) -> Result<(), StoreError> {
        match self.credentials.get_mut(id) {
            Some(mut entry) => {
                patch.apply(entry.value_mut());
                Ok(())
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.credentials.remove(id).is_some())
    }

    async fn reset_daily_all(&self) -> Result<u64, StoreError> {
        let mut affected = 0;
        for mut entry in self.credentials.iter_mut() {
            let credential = entry.value_mut();
            credential.used_today = 0;
            credential.error_count = 0;
            credential.touch();
            affected += 1;
        }
        Ok(affected)
    }

    async fn reset_monthly_all(&self, reset_at: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut affected = 0;
        for mut entry in self.credentials.iter_mut() {
            let credential = entry.value_mut();
            credential.used_this_month = 0;
            credential.monthly_reset_at = reset_at;
            credential.touch();
            affected += 1;
        }
        Ok(affected)
    }
}

#[async_trait]
impl RankingStore for MemoryStore {
    async fn append(&self, record: &RankingRecord) -> Result<(), StoreError> {
        let mut rankings = self
            .rankings
            .write()
            .map_err(|_| StoreError::Backend("ranking store lock poisoned".into()))?;
        rankings.push(record.clone());
        Ok(())
    }

    async fn recent_for_domain(
        &self,
        domain: &str,
        limit: usize,
    ) -> Result<Vec<RankingRecord>, StoreError> {
        let rankings = self
            .rankings
            .read()
            .map_err(|_| StoreError::Backend("ranking store lock poisoned".into()))?;
        let mut matching: Vec<RankingRecord> = rankings
            .iter()
            .filter(|r| r.domain.eq_ignore_ascii_case(domain))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.checked_at.cmp(&a.checked_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let rankings = self
            .rankings
            .read()
            .map_err(|_| StoreError::Backend("ranking store lock poisoned".into()))?;
        Ok(rankings.len() as u64)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut rankings = self
            .rankings
            .write()
            .map_err(|_| StoreError::Backend("ranking store lock poisoned".into()))?;
        let before = rankings.len();
        rankings.retain(|r| r.checked_at >= cutoff);
        Ok((before - rankings.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{CredentialOrigin, CredentialStatus};
    use chrono::Duration;
    use parser::{Provider, RequestContext, SearchOptions};
    use serde_json::json;

    fn credential(id: &str) -> Credential {
        Credential::new(
            id,
            Provider::NativeSerp,
            format!("{id}-0123456789abcdef0123456789abcdef"),
            100,
            0,
            1,
            CredentialOrigin::UserAdded,
        )
    }

    fn record(domain: &str, age_days: i64) -> RankingRecord {
        let raw = json!({
            "organic_results": [ { "link": format!("https://{domain}"), "position": 1 } ],
            "search_information": { "total_results": 1 },
        });
        let options = SearchOptions::new(domain, "US");
        let mut record = parser::parse_response(
            Provider::NativeSerp,
            "kw",
            &raw,
            &options,
            &RequestContext::default(),
        )
        .unwrap();
        record.checked_at = Utc::now() - Duration::days(age_days);
        record
    }

    #[tokio::test]
    async fn usage_patch_merges_into_existing_record() {
        let store = MemoryStore::new();
        store.upsert(&credential("k1")).await.unwrap();

        let patch = UsagePatch {
            used_today: Some(7),
            status: Some(CredentialStatus::Exhausted),
            ..UsagePatch::default()
        };
        store.upsert_usage("k1", patch).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].used_today, 7);
        assert_eq!(all[0].status, CredentialStatus::Exhausted);
    }

    #[tokio::test]
    async fn usage_patch_for_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .upsert_usage("missing", UsagePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn daily_reset_zeroes_counters() {
        let store = MemoryStore::new();
        let mut c = credential("k1");
        c.used_today = 50;
        c.error_count = 3;
        store.upsert(&c).await.unwrap();

        assert_eq!(store.reset_daily_all().await.unwrap(), 1);
        let all = store.load_all().await.unwrap();
        assert_eq!(all[0].used_today, 0);
        assert_eq!(all[0].error_count, 0);
    }

    #[tokio::test]
    async fn cleanup_drops_only_stale_records() {
        let store = MemoryStore::new();
        store.append(&record("example.com", 1)).await.unwrap();
        store.append(&record("example.com", 120)).await.unwrap();

        let cutoff = Utc::now() - Duration::days(90);
        assert_eq!(store.delete_older_than(cutoff).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_for_domain_sorts_newest_first() {
        let store = MemoryStore::new();
        store.append(&record("example.com", 5)).await.unwrap();
        store.append(&record("example.com", 1)).await.unwrap();
        store.append(&record("other.org", 0)).await.unwrap();

        let recent = store.recent_for_domain("example.com", 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].checked_at > recent[1].checked_at);
    }
}
