//! Pool configuration, loaded from the environment.
//!
//! Credentials are seeded from numbered variables — `SERPTRACK_API_KEY_1`
//! through `_N` for the native provider, `SERPTRACK_CUSTOM_KEY_i` paired
//! with `SERPTRACK_CUSTOM_ENGINE_i` for custom search — each with optional
//! `_DAILY_LIMIT`, `_MONTHLY_LIMIT`, and `_PRIORITY` companions. The
//! numbered family is open-ended, so seeds are scanned from raw env vars
//! rather than going through a typed config source.

use std::env;
use std::str::FromStr;

use parser::Provider;
use serde::{Deserialize, Serialize};

/// Minimum plausible length of a native-provider secret.
pub const MIN_NATIVE_SECRET_LEN: usize = 32;

/// Highest numbered credential slot scanned from the environment.
const MAX_NUMBERED_SLOTS: u32 = 64;

/// How the next credential is picked among the available ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Lowest priority value first.
    #[default]
    Priority,
    /// Fewest calls today first.
    LeastUsed,
    /// Cycle through available credentials.
    RoundRobin,
}

impl FromStr for RotationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(RotationStrategy::Priority),
            "least_used" => Ok(RotationStrategy::LeastUsed),
            "round_robin" => Ok(RotationStrategy::RoundRobin),
            other => Err(format!("unknown rotation strategy: {other}")),
        }
    }
}

/// A configured credential before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSeed {
    pub provider: Provider,
    pub secret: String,
    pub search_engine_id: Option<String>,
    pub daily_limit: Option<u32>,
    pub monthly_limit: Option<u32>,
    pub priority: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub rotation: RotationStrategy,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound on rotation attempts; the effective count is capped by
    /// the pool size.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// How long a rate-limited credential stays paused.
    #[serde(default = "default_rate_limit_pause_ms")]
    pub rate_limit_pause_ms: u64,
    #[serde(default = "default_native_endpoint")]
    pub native_endpoint: String,
    #[serde(default = "default_custom_endpoint")]
    pub custom_endpoint: String,
    #[serde(default = "default_daily_limit")]
    pub default_daily_limit: u32,
    #[serde(default)]
    pub default_monthly_limit: u32,
    /// Attach raw provider bodies to records for debugging.
    #[serde(default)]
    pub keep_raw_response: bool,
    #[serde(default)]
    pub seeds: Vec<CredentialSeed>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            rotation: RotationStrategy::default(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            rate_limit_pause_ms: default_rate_limit_pause_ms(),
            native_endpoint: default_native_endpoint(),
            custom_endpoint: default_custom_endpoint(),
            default_daily_limit: default_daily_limit(),
            default_monthly_limit: 0,
            keep_raw_response: false,
            seeds: Vec::new(),
        }
    }
}

impl PoolConfig {
    /// Load tunables and numbered credential seeds from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(rotation) = env_parse::<RotationStrategy>("SERPTRACK_ROTATION") {
            config.rotation = rotation;
        }
        if let Some(v) = env_parse("SERPTRACK_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = v;
        }
        if let Some(v) = env_parse("SERPTRACK_MAX_RETRIES") {
            config.max_retries = v;
        }
        if let Some(v) = env_parse("SERPTRACK_RATE_LIMIT_PAUSE_MS") {
            config.rate_limit_pause_ms = v;
        }
        if let Some(v) = env_string("SERPTRACK_NATIVE_ENDPOINT") {
            config.native_endpoint = v;
        }
        if let Some(v) = env_string("SERPTRACK_CUSTOM_ENDPOINT") {
            config.custom_endpoint = v;
        }
        if let Some(v) = env_parse("SERPTRACK_DEFAULT_DAILY_LIMIT") {
            config.default_daily_limit = v;
        }
        if let Some(v) = env_parse("SERPTRACK_DEFAULT_MONTHLY_LIMIT") {
            config.default_monthly_limit = v;
        }
        if let Some(v) = env_parse("SERPTRACK_KEEP_RAW_RESPONSE") {
            config.keep_raw_response = v;
        }

        for slot in 1..=MAX_NUMBERED_SLOTS {
            if let Some(secret) = env_string(&format!("SERPTRACK_API_KEY_{slot}")) {
                config.seeds.push(CredentialSeed {
                    provider: Provider::NativeSerp,
                    secret,
                    search_engine_id: None,
                    daily_limit: env_parse(&format!("SERPTRACK_API_KEY_{slot}_DAILY_LIMIT")),
                    monthly_limit: env_parse(&format!("SERPTRACK_API_KEY_{slot}_MONTHLY_LIMIT")),
                    priority: env_parse(&format!("SERPTRACK_API_KEY_{slot}_PRIORITY")),
                });
            }
            if let Some(secret) = env_string(&format!("SERPTRACK_CUSTOM_KEY_{slot}")) {
                config.seeds.push(CredentialSeed {
                    provider: Provider::CustomSearch,
                    secret,
                    search_engine_id: env_string(&format!("SERPTRACK_CUSTOM_ENGINE_{slot}")),
                    daily_limit: env_parse(&format!("SERPTRACK_CUSTOM_KEY_{slot}_DAILY_LIMIT")),
                    monthly_limit: env_parse(&format!(
                        "SERPTRACK_CUSTOM_KEY_{slot}_MONTHLY_LIMIT"
                    )),
                    priority: env_parse(&format!("SERPTRACK_CUSTOM_KEY_{slot}_PRIORITY")),
                });
            }
        }

        config
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.trim().parse().ok())
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_rate_limit_pause_ms() -> u64 {
    60_000
}

fn default_native_endpoint() -> String {
    "https://serpapi.com/search.json".to_string()
}

fn default_custom_endpoint() -> String {
    "https://www.googleapis.com/customsearch/v1".to_string()
}

fn default_daily_limit() -> u32 {
    250
}

/// Placeholder strings that must never reach the provider: template
/// values left behind from sample env files.
pub fn is_placeholder_secret(secret: &str) -> bool {
    let lower = secret.trim().to_ascii_lowercase();
    lower.contains("change_me")
        || lower.contains("changeme")
        || lower.starts_with("replace_with")
        || (lower.starts_with("your_") && lower.ends_with("_here"))
}

/// Validate a secret for the given provider before it joins the pool.
pub fn validate_secret(provider: Provider, secret: &str) -> Result<(), String> {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return Err("secret is empty".to_string());
    }
    if is_placeholder_secret(trimmed) {
        return Err("secret looks like a template placeholder".to_string());
    }
    if provider == Provider::NativeSerp && trimmed.len() < MIN_NATIVE_SECRET_LEN {
        return Err(format!(
            "secret is too short: expected at least {MIN_NATIVE_SECRET_LEN} characters"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_secrets_are_detected() {
        assert!(is_placeholder_secret("your_api_key_here"));
        assert!(is_placeholder_secret("YOUR_SECRET_KEY_HERE"));
        assert!(is_placeholder_secret("CHANGE_ME"));
        assert!(is_placeholder_secret("changeme"));
        assert!(is_placeholder_secret("replace_with_real_key"));
        assert!(!is_placeholder_secret(
            "b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6"
        ));
    }

    #[test]
    fn native_secrets_must_be_long_enough() {
        assert!(validate_secret(Provider::NativeSerp, "short").is_err());
        assert!(validate_secret(
            Provider::NativeSerp,
            "b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1"
        )
        .is_ok());
        // Custom-search keys have their own, shorter format.
        assert!(validate_secret(Provider::CustomSearch, "AIzaShortKey").is_ok());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(validate_secret(Provider::NativeSerp, "").is_err());
        assert!(validate_secret(Provider::NativeSerp, "   ").is_err());
    }

    #[test]
    fn rotation_strategy_parses_from_config_strings() {
        assert_eq!(
            "priority".parse::<RotationStrategy>().unwrap(),
            RotationStrategy::Priority
        );
        assert_eq!(
            "least_used".parse::<RotationStrategy>().unwrap(),
            RotationStrategy::LeastUsed
        );
        assert_eq!(
            "round_robin".parse::<RotationStrategy>().unwrap(),
            RotationStrategy::RoundRobin
        );
        assert!("random".parse::<RotationStrategy>().is_err());
    }
}
