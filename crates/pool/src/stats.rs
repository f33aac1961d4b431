//! On-demand pool statistics.

use chrono::{DateTime, Timelike, Utc};
use parser::Provider;
use serde::{Deserialize, Serialize};
use store::{Credential, CredentialHealth, CredentialStatus};

/// Per-credential health line included in pool snapshots. Secrets are
/// deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialStatsEntry {
    pub id: String,
    pub provider: Provider,
    pub status: CredentialStatus,
    pub priority: u32,
    pub used_today: u32,
    pub daily_limit: u32,
    pub used_this_month: u32,
    pub monthly_limit: u32,
    pub success_rate: f64,
    pub health: CredentialHealth,
}

/// Aggregate snapshot of the pool, computed on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub exhausted: usize,
    pub paused: usize,
    pub errored: usize,
    pub daily_used: u64,
    pub daily_capacity: u64,
    pub monthly_used: u64,
    pub monthly_capacity: u64,
    /// Daily usage over capacity, 0..=100.
    pub usage_percent: f64,
    /// Projected hours until the daily capacity runs out, extrapolated
    /// from today's consumption rate. Absent before any usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours_to_exhaustion: Option<f64>,
    pub credentials: Vec<CredentialStatsEntry>,
}

pub fn compute(credentials: &[Credential], now: DateTime<Utc>) -> PoolStats {
    let mut stats = PoolStats {
        total: credentials.len(),
        active: 0,
        exhausted: 0,
        paused: 0,
        errored: 0,
        daily_used: 0,
        daily_capacity: 0,
        monthly_used: 0,
        monthly_capacity: 0,
        usage_percent: 0.0,
        estimated_hours_to_exhaustion: None,
        credentials: Vec::with_capacity(credentials.len()),
    };

    for credential in credentials {
        match credential.status {
            CredentialStatus::Active => stats.active += 1,
            CredentialStatus::Exhausted => stats.exhausted += 1,
            CredentialStatus::Paused => stats.paused += 1,
            CredentialStatus::Error => stats.errored += 1,
        }
        stats.daily_used += u64::from(credential.used_today);
        stats.daily_capacity += u64::from(credential.daily_limit);
        stats.monthly_used += u64::from(credential.used_this_month);
        stats.monthly_capacity += u64::from(credential.monthly_limit);
        stats.credentials.push(CredentialStatsEntry {
            id: credential.id.clone(),
            provider: credential.provider,
            status: credential.status,
            priority: credential.priority,
            used_today: credential.used_today,
            daily_limit: credential.daily_limit,
            used_this_month: credential.used_this_month,
            monthly_limit: credential.monthly_limit,
            success_rate: credential.success_rate,
            health: credential.health(),
        });
    }

    if stats.daily_capacity > 0 {
        stats.usage_percent = stats.daily_used as f64 / stats.daily_capacity as f64 * 100.0;
    }

    // Extrapolate today's burn rate over the remaining capacity.
    let hours_since_midnight = f64::from(now.time().num_seconds_from_midnight()) / 3600.0;
    if stats.daily_used > 0 && hours_since_midnight > 0.01 {
        let rate = stats.daily_used as f64 / hours_since_midnight;
        let remaining = stats.daily_capacity.saturating_sub(stats.daily_used) as f64;
        stats.estimated_hours_to_exhaustion = Some(remaining / rate);
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use store::CredentialOrigin;

    fn credential(id: &str, used: u32, limit: u32) -> Credential {
        let mut c = Credential::new(
            id,
            Provider::NativeSerp,
            format!("{id}-0123456789abcdef0123456789abcdef"),
            limit,
            0,
            1,
            CredentialOrigin::Configured,
        );
        c.used_today = used;
        c
    }

    #[test]
    fn aggregates_usage_and_status_counts() {
        let mut exhausted = credential("k2", 100, 100);
        exhausted.status = CredentialStatus::Exhausted;
        let credentials = vec![credential("k1", 20, 100), exhausted];

        let now = Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap();
        let stats = compute(&credentials, now);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.exhausted, 1);
        assert_eq!(stats.daily_used, 120);
        assert_eq!(stats.daily_capacity, 200);
        assert!((stats.usage_percent - 60.0).abs() < 1e-9);
    }

    #[test]
    fn exhaustion_estimate_extrapolates_burn_rate() {
        // 30 calls in 6 hours = 5/hour; 70 remaining = 14 hours.
        let credentials = vec![credential("k1", 30, 100)];
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap();
        let stats = compute(&credentials, now);
        let estimate = stats.estimated_hours_to_exhaustion.unwrap();
        assert!((estimate - 14.0).abs() < 0.01);
    }

    #[test]
    fn no_usage_means_no_estimate() {
        let credentials = vec![credential("k1", 0, 100)];
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let stats = compute(&credentials, now);
        assert!(stats.estimated_hours_to_exhaustion.is_none());
    }

    #[test]
    fn health_bands_surface_per_credential() {
        let credentials = vec![
            credential("ok", 10, 100),
            credential("warn", 80, 100),
            credential("crit", 95, 100),
        ];
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let stats = compute(&credentials, now);
        assert_eq!(stats.credentials[0].health, CredentialHealth::Healthy);
        assert_eq!(stats.credentials[1].health, CredentialHealth::Warning);
        assert_eq!(stats.credentials[2].health, CredentialHealth::Critical);
    }
}
