//! Periodic counter resets and record cleanup.
//!
//! Four wall-clock jobs run for the lifetime of the process: a daily
//! counter reset at local midnight, a monthly reset at the first midnight
//! of each month, an hourly staleness check that covers resets missed
//! during downtime, and a weekly cleanup (Sunday 02:00) that drops
//! ranking records past the retention window. Job failures are logged
//! and swallowed; one bad run never stops the schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Days, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use pool::SearchPool;
use store::RankingStore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Fallback pause when a next-run time cannot be resolved (e.g. a DST
/// gap swallows the target wall-clock minute).
const RESCHEDULE_FALLBACK: Duration = Duration::from_secs(3_600);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Ranking records older than this many days are deleted weekly.
    pub cleanup_retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cleanup_retention_days: 90,
        }
    }
}

pub struct ResetScheduler {
    handles: Vec<JoinHandle<()>>,
}

impl ResetScheduler {
    /// Spawn all periodic jobs. The returned handle owns the tasks; call
    /// [`ResetScheduler::shutdown`] to stop them.
    pub fn start(
        pool: Arc<SearchPool>,
        rankings: Arc<dyn RankingStore>,
        config: SchedulerConfig,
    ) -> Self {
        let mut handles = Vec::new();

        {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(until(next_midnight(Local::now()))).await;
                    info!("running daily counter reset");
                    pool.reset_daily_all().await;
                }
            }));
        }

        {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(until(next_month_start(Local::now()))).await;
                    info!("running monthly counter reset");
                    pool.reset_monthly_all().await;
                }
            }));
        }

        {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(until(next_hour(Local::now()))).await;
                    pool.check_monthly_if_stale().await;
                }
            }));
        }

        {
            let retention = config.cleanup_retention_days;
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(until(next_weekly_cleanup(Local::now()))).await;
                    let cutoff = Utc::now() - chrono::Duration::days(retention);
                    match rankings.delete_older_than(cutoff).await {
                        Ok(removed) => info!(removed, "weekly ranking cleanup finished"),
                        Err(error) => warn!(%error, "weekly ranking cleanup failed"),
                    }
                }
            }));
        }

        info!("reset scheduler started");
        Self { handles }
    }

    pub fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
        info!("reset scheduler stopped");
    }
}

fn until(next: Option<DateTime<Local>>) -> Duration {
    let now = Local::now();
    match next {
        Some(next) => (next - now).to_std().unwrap_or(RESCHEDULE_FALLBACK),
        None => RESCHEDULE_FALLBACK,
    }
}

fn resolve_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&naive).earliest()
}

/// The midnight that starts the next calendar day.
fn next_midnight(now: DateTime<Local>) -> Option<DateTime<Local>> {
    let tomorrow = now.date_naive().checked_add_days(Days::new(1))?;
    resolve_local(tomorrow.and_time(NaiveTime::MIN))
}

/// The first midnight of the next calendar month.
fn next_month_start(now: DateTime<Local>) -> Option<DateTime<Local>> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let first = chrono::NaiveDate::from_ymd_opt(year, month, 1)?;
    resolve_local(first.and_time(NaiveTime::MIN))
}

/// The next top of the hour.
fn next_hour(now: DateTime<Local>) -> Option<DateTime<Local>> {
    let seconds_into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
    let remaining = 3_600 - seconds_into_hour.min(3_599);
    Some(now + chrono::Duration::seconds(remaining as i64))
}

/// The next Sunday at 02:00 local time.
fn next_weekly_cleanup(now: DateTime<Local>) -> Option<DateTime<Local>> {
    let target_time = NaiveTime::from_hms_opt(2, 0, 0)?;
    let days_ahead = (7 - now.weekday().num_days_from_sunday()) % 7;
    let mut date = now.date_naive().checked_add_days(Days::new(u64::from(days_ahead)))?;
    if days_ahead == 0 && now.time() >= target_time {
        date = date.checked_add_days(Days::new(7))?;
    }
    resolve_local(date.and_time(target_time))
}
