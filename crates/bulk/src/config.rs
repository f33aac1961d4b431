//! Bulk execution tunables, loaded from `SERPTRACK_BULK_*` variables.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Baseline pause between batches; the adaptive controller moves the
    /// effective delay between this and [`BulkConfig::MAX_DELAY_MS`].
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_true")]
    pub retry_enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_true")]
    pub adaptive_delay: bool,
    /// Wall-clock budget for one bulk run; keywords not started before it
    /// expires are reported as timeouts.
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
}

impl BulkConfig {
    /// Ceiling for the adaptive inter-batch delay.
    pub const MAX_DELAY_MS: u64 = 10_000;
    /// Ceiling for the per-pass retry sleep.
    pub const MAX_RETRY_SLEEP_MS: u64 = 5_000;

    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("SERPTRACK_BULK_BATCH_SIZE") {
            config.batch_size = v;
        }
        if let Some(v) = env_parse("SERPTRACK_BULK_INTER_BATCH_DELAY_MS") {
            config.inter_batch_delay_ms = v;
        }
        if let Some(v) = env_parse("SERPTRACK_BULK_MAX_CONCURRENT") {
            config.max_concurrent = v;
        }
        if let Some(v) = env_parse("SERPTRACK_BULK_RETRY_ENABLED") {
            config.retry_enabled = v;
        }
        if let Some(v) = env_parse("SERPTRACK_BULK_MAX_RETRIES") {
            config.max_retries = v;
        }
        if let Some(v) = env_parse("SERPTRACK_BULK_ADAPTIVE_DELAY") {
            config.adaptive_delay = v;
        }
        if let Some(v) = env_parse("SERPTRACK_BULK_BUDGET_MS") {
            config.budget_ms = v;
        }
        config
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            max_concurrent: default_max_concurrent(),
            retry_enabled: true,
            max_retries: default_max_retries(),
            adaptive_delay: true,
            budget_ms: default_budget_ms(),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
}

fn default_batch_size() -> usize {
    5
}

fn default_inter_batch_delay_ms() -> u64 {
    2_000
}

fn default_max_concurrent() -> usize {
    2
}

fn default_max_retries() -> u32 {
    2
}

fn default_budget_ms() -> u64 {
    290_000
}

fn default_true() -> bool {
    true
}
