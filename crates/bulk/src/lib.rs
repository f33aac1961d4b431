//! Bulk keyword execution on top of the credential pool.
//!
//! [`BulkExecutor::run`] partitions keywords into batches, bounds
//! concurrency with a semaphore, paces batches with an adaptive delay,
//! and retries failed keywords in sequential passes — all within a
//! wall-clock budget. A single failed keyword never fails the run;
//! failures are collected into the [`BulkResult`]. Progress is a channel
//! of [`BulkProgress`] events rather than a callback, so consumers get
//! back-pressure and cancellation for free.

mod config;
mod executor;
mod types;

pub use config::BulkConfig;
pub use executor::BulkExecutor;
pub use types::{BulkProgress, BulkResult, FailedLookup, QualityHistogram};
