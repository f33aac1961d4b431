//! Batched keyword fan-out over the credential pool.
//!
//! Keywords run in contiguous batches with semaphore-bounded concurrency
//! and per-task error isolation: one failed or panicked lookup never
//! cancels its siblings. Between batches an adaptive controller widens
//! the pause when the pool runs hot or a batch degrades, and narrows it
//! back toward the baseline after clean batches. Failures are collected
//! and retried in sequential passes at the end.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parser::SearchOptions;
use pool::{ErrorKind, SearchPool, TrackError};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::BulkConfig;
use crate::types::{BulkProgress, BulkResult, FailedLookup, QualityHistogram};

pub struct BulkExecutor {
    pool: Arc<SearchPool>,
    config: BulkConfig,
}

impl BulkExecutor {
    pub fn new(pool: Arc<SearchPool>, config: BulkConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    /// Run every keyword through the pool and collect the outcomes.
    ///
    /// Progress events are emitted over the optional channel after each
    /// batch and each retry pass. A send failure only means the listener
    /// went away; execution continues.
    pub async fn run(
        &self,
        keywords: Vec<String>,
        options: SearchOptions,
        progress: Option<UnboundedSender<BulkProgress>>,
    ) -> BulkResult {
        let started = Instant::now();
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        let total = keywords.len();

        if keywords.is_empty() {
            return BulkResult {
                total_processed: 0,
                records: Vec::new(),
                failures: Vec::new(),
                duration_ms: 0,
                pool: self.pool.stats(),
                quality: QualityHistogram::default(),
            };
        }

        let deadline = started + Duration::from_millis(self.config.budget_ms);
        let baseline = self.config.inter_batch_delay_ms;
        let mut delay_ms = baseline;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));

        let mut records = Vec::with_capacity(total);
        let mut failures: Vec<FailedLookup> = Vec::new();
        let mut batches: VecDeque<Vec<String>> = keywords
            .chunks(self.config.batch_size.max(1))
            .map(<[String]>::to_vec)
            .collect();

        while let Some(batch) = batches.pop_front() {
            if Instant::now() >= deadline {
                // Budget exhausted: everything not yet started fails.
                for keyword in batch.into_iter().chain(batches.drain(..).flatten()) {
                    failures.push(FailedLookup::from_error(
                        keyword,
                        &TrackError::new(
                            ErrorKind::Timeout,
                            "bulk budget exhausted before the lookup started",
                        ),
                    ));
                }
                break;
            }

            let batch_total = batch.len();
            let mut batch_succeeded = 0usize;

            let mut handles = Vec::with_capacity(batch_total);
            for keyword in batch {
                let pool = Arc::clone(&self.pool);
                let options = options.clone();
                let semaphore = Arc::clone(&semaphore);
                let task_keyword = keyword.clone();
                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    if Instant::now() >= deadline {
                        return Err(TrackError::new(
                            ErrorKind::Timeout,
                            "bulk budget exhausted before the lookup started",
                        ));
                    }
                    pool.track(&task_keyword, &options).await
                });
                handles.push((keyword, handle));
            }

            for (keyword, handle) in handles {
                match handle.await {
                    Ok(Ok(record)) => {
                        batch_succeeded += 1;
                        records.push(record);
                    }
                    Ok(Err(error)) => {
                        failures.push(FailedLookup::from_error(keyword, &error));
                    }
                    Err(join_error) => {
                        warn!(%join_error, "bulk lookup task aborted");
                        failures.push(FailedLookup::from_error(
                            keyword,
                            &TrackError::new(ErrorKind::Unknown, join_error.to_string()),
                        ));
                    }
                }
            }

            let more_batches = !batches.is_empty();
            if more_batches {
                if self.config.adaptive_delay {
                    delay_ms = next_delay(
                        delay_ms,
                        baseline,
                        self.pool.stats().usage_percent,
                        batch_succeeded,
                        batch_total,
                    );
                }
                debug!(delay_ms, "pausing between batches");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            emit(
                &progress,
                &records,
                &failures,
                total,
                None,
                &self.pool,
            );
        }

        if self.config.retry_enabled && !failures.is_empty() {
            self.retry_failures(&mut records, &mut failures, &options, total, deadline, &progress)
                .await;
        }

        BulkResult {
            total_processed: records.len() + failures.len(),
            quality: QualityHistogram::from_records(&records),
            duration_ms: started.elapsed().as_millis() as u64,
            pool: self.pool.stats(),
            records,
            failures,
        }
    }

    /// Sequential retry passes over the failed keywords, with escalating
    /// sleeps and a longer pause between passes.
    async fn retry_failures(
        &self,
        records: &mut Vec<parser::RankingRecord>,
        failures: &mut Vec<FailedLookup>,
        options: &SearchOptions,
        total: usize,
        deadline: Instant,
        progress: &Option<UnboundedSender<BulkProgress>>,
    ) {
        let baseline = self.config.inter_batch_delay_ms;
        for attempt in 1..=self.config.max_retries {
            if failures.is_empty() {
                break;
            }
            let sleep_ms = (baseline * u64::from(attempt)).min(BulkConfig::MAX_RETRY_SLEEP_MS);
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;

            let mut still_failed = Vec::new();
            for mut failure in failures.drain(..) {
                if Instant::now() >= deadline {
                    still_failed.push(failure);
                    continue;
                }
                match self.pool.track(&failure.keyword, options).await {
                    Ok(record) => records.push(record),
                    Err(error) => {
                        failure.retry_count += 1;
                        failure.error = error.message.clone();
                        failure.kind = error.kind;
                        failure.credential_id = error.credential_id.clone();
                        still_failed.push(failure);
                    }
                }
            }
            *failures = still_failed;

            emit(progress, records, failures, total, Some(attempt), &self.pool);

            if attempt < self.config.max_retries && !failures.is_empty() {
                tokio::time::sleep(Duration::from_millis(2 * sleep_ms)).await;
            }
        }
    }
}

/// Adaptive inter-batch delay: widen by half (capped) when the pool runs
/// hot or the batch degraded, narrow by a fifth (floored at the baseline)
/// after a fully clean batch.
fn next_delay(
    current_ms: u64,
    baseline_ms: u64,
    pool_usage_percent: f64,
    succeeded: usize,
    batch_total: usize,
) -> u64 {
    let success_rate = if batch_total == 0 {
        100.0
    } else {
        succeeded as f64 / batch_total as f64 * 100.0
    };
    if pool_usage_percent > 80.0 || success_rate < 80.0 {
        ((current_ms as f64 * 1.5) as u64).min(BulkConfig::MAX_DELAY_MS)
    } else if succeeded == batch_total && current_ms > baseline_ms {
        ((current_ms as f64 * 0.8) as u64).max(baseline_ms)
    } else {
        current_ms
    }
}

fn emit(
    progress: &Option<UnboundedSender<BulkProgress>>,
    records: &[parser::RankingRecord],
    failures: &[FailedLookup],
    total: usize,
    retry_attempt: Option<u32>,
    pool: &SearchPool,
) {
    if let Some(sender) = progress {
        let _ = sender.send(BulkProgress {
            processed: records.len() + failures.len(),
            total,
            succeeded: records.len(),
            failed: failures.len(),
            pool: pool.stats(),
            retry_attempt,
        });
    }
}
