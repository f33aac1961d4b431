//! Credential entity: one API secret plus its quota and health state.

use chrono::{DateTime, Utc};
use parser::Provider;
use serde::{Deserialize, Serialize};

/// Smoothing factor for the per-credential success-rate EWMA.
const EWMA_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Exhausted,
    Paused,
    Error,
}

/// Where a credential came from. Configured entries are rebuilt from the
/// environment on every boot; user-added ones live only in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOrigin {
    Configured,
    UserAdded,
}

/// Health band derived from daily usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialHealth {
    Healthy,
    Warning,
    Critical,
    Exhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub provider: Provider,
    pub secret: String,
    /// Required for the custom-search provider, unused otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_engine_id: Option<String>,
    pub daily_limit: u32,
    /// 0 means unmetered.
    pub monthly_limit: u32,
    pub used_today: u32,
    pub used_this_month: u32,
    pub status: CredentialStatus,
    /// 1 is the highest priority; duplicates are allowed.
    pub priority: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub error_count: u32,
    /// EWMA of the successful-call ratio, 0..=100.
    pub success_rate: f64,
    pub monthly_reset_at: DateTime<Utc>,
    pub origin: CredentialOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        id: impl Into<String>,
        provider: Provider,
        secret: impl Into<String>,
        daily_limit: u32,
        monthly_limit: u32,
        priority: u32,
        origin: CredentialOrigin,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            provider,
            secret: secret.into(),
            search_engine_id: None,
            daily_limit,
            monthly_limit,
            used_today: 0,
            used_this_month: 0,
            status: CredentialStatus::Active,
            priority,
            last_used_at: None,
            error_count: 0,
            success_rate: 100.0,
            monthly_reset_at: now,
            origin,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_daily_quota(&self) -> bool {
        self.used_today < self.daily_limit
    }

    pub fn has_monthly_quota(&self) -> bool {
        self.monthly_limit == 0 || self.used_this_month < self.monthly_limit
    }

    /// Eligible for selection: active, under both quotas, right provider.
    pub fn is_available(&self, provider: Provider) -> bool {
        self.status == CredentialStatus::Active
            && self.provider == provider
            && self.has_daily_quota()
            && self.has_monthly_quota()
    }

    /// Account a successful call: bump counters, refresh the EWMA, and
    /// flip to exhausted the moment a limit is reached so the next
    /// selection already sees the transition.
    pub fn record_success(&mut self) {
        self.used_today += 1;
        self.used_this_month += 1;
        self.success_rate = EWMA_ALPHA.mul_add(100.0, (1.0 - EWMA_ALPHA) * self.success_rate);
        self.last_used_at = Some(Utc::now());
        if !self.has_daily_quota() || !self.has_monthly_quota() {
            self.status = CredentialStatus::Exhausted;
        }
        self.touch();
    }

    /// Account a failed call.
    pub fn record_failure(&mut self) {
        self.error_count += 1;
        self.success_rate = (1.0 - EWMA_ALPHA) * self.success_rate;
        self.touch();
    }

    pub fn daily_usage_fraction(&self) -> f64 {
        if self.daily_limit == 0 {
            0.0
        } else {
            f64::from(self.used_today) / f64::from(self.daily_limit)
        }
    }

    pub fn health(&self) -> CredentialHealth {
        if self.status == CredentialStatus::Exhausted || !self.has_daily_quota() {
            return CredentialHealth::Exhausted;
        }
        let usage = self.daily_usage_fraction();
        if usage >= 0.90 {
            CredentialHealth::Critical
        } else if usage >= 0.75 {
            CredentialHealth::Warning
        } else {
            CredentialHealth::Healthy
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Partial usage update persisted after each lookup. All fields are
/// optional so the write is a pure merge and safely idempotent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsagePatch {
    pub used_today: Option<u32>,
    pub used_this_month: Option<u32>,
    pub status: Option<CredentialStatus>,
    pub error_count: Option<u32>,
    pub success_rate: Option<f64>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub monthly_reset_at: Option<DateTime<Utc>>,
}

impl UsagePatch {
    /// Snapshot the mutable usage state of a credential.
    pub fn from_credential(credential: &Credential) -> Self {
        Self {
            used_today: Some(credential.used_today),
            used_this_month: Some(credential.used_this_month),
            status: Some(credential.status),
            error_count: Some(credential.error_count),
            success_rate: Some(credential.success_rate),
            last_used_at: credential.last_used_at,
            monthly_reset_at: Some(credential.monthly_reset_at),
        }
    }

    pub fn apply(&self, credential: &mut Credential) {
        if let Some(v) = self.used_today {
            credential.used_today = v;
        }
        if let Some(v) = self.used_this_month {
            credential.used_this_month = v;
        }
        if let Some(v) = self.status {
            credential.status = v;
        }
        if let Some(v) = self.error_count {
            credential.error_count = v;
        }
        if let Some(v) = self.success_rate {
            credential.success_rate = v;
        }
        if let Some(v) = self.last_used_at {
            credential.last_used_at = Some(v);
        }
        if let Some(v) = self.monthly_reset_at {
            credential.monthly_reset_at = v;
        }
        credential.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(daily: u32, monthly: u32) -> Credential {
        Credential::new(
            "k1",
            Provider::NativeSerp,
            "secret-0123456789abcdef0123456789abcdef",
            daily,
            monthly,
            1,
            CredentialOrigin::Configured,
        )
    }

    #[test]
    fn success_flips_to_exhausted_at_daily_limit() {
        let mut c = credential(2, 0);
        c.record_success();
        assert_eq!(c.status, CredentialStatus::Active);
        c.record_success();
        assert_eq!(c.status, CredentialStatus::Exhausted);
        assert_eq!(c.used_today, 2);
        assert!(!c.is_available(Provider::NativeSerp));
    }

    #[test]
    fn zero_monthly_limit_is_unmetered() {
        let mut c = credential(100, 0);
        for _ in 0..50 {
            c.record_success();
        }
        assert!(c.has_monthly_quota());
        assert_eq!(c.status, CredentialStatus::Active);
    }

    #[test]
    fn ewma_moves_toward_outcome() {
        let mut c = credential(100, 0);
        c.record_failure();
        assert!((c.success_rate - 95.0).abs() < 1e-9);
        c.record_success();
        assert!(c.success_rate > 95.0 && c.success_rate < 100.0);
    }

    #[test]
    fn provider_mismatch_is_unavailable() {
        let c = credential(10, 0);
        assert!(c.is_available(Provider::NativeSerp));
        assert!(!c.is_available(Provider::CustomSearch));
    }

    #[test]
    fn health_bands_follow_daily_usage() {
        let mut c = credential(100, 0);
        assert_eq!(c.health(), CredentialHealth::Healthy);
        c.used_today = 75;
        assert_eq!(c.health(), CredentialHealth::Warning);
        c.used_today = 90;
        assert_eq!(c.health(), CredentialHealth::Critical);
        c.used_today = 100;
        assert_eq!(c.health(), CredentialHealth::Exhausted);
    }

    #[test]
    fn usage_patch_round_trips() {
        let mut a = credential(10, 100);
        a.record_success();
        a.record_failure();
        let patch = UsagePatch::from_credential(&a);

        let mut b = credential(10, 100);
        patch.apply(&mut b);
        assert_eq!(b.used_today, a.used_today);
        assert_eq!(b.status, a.status);
        assert_eq!(b.error_count, a.error_count);
        assert!((b.success_rate - a.success_rate).abs() < 1e-9);
    }
}
