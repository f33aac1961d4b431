//! The credential pool coordinator.
//!
//! One `SearchPool` owns the authoritative in-memory credential list and
//! the in-flight lock set; both live behind a single mutex so selecting a
//! credential and marking it in-flight is one atomic step — two
//! concurrent lookups can never hold the same credential. Counter and
//! health updates happen under the same mutex; durability writes are
//! scheduled asynchronously and never block a lookup.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{Datelike, Utc};
use parser::{parse_response, Provider, RankingRecord, RequestContext, SearchOptions};
use store::{
    Credential, CredentialOrigin, CredentialStatus, CredentialStore, RankingStore, UsagePatch,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{validate_secret, PoolConfig, RotationStrategy};
use crate::error::{classify_response, ErrorKind, TrackError};
use crate::provider::{build_custom_params, build_native_params, endpoint_for, UsageHeaders};
use crate::stats::{compute as compute_stats, PoolStats};
use crate::transport::{ProviderRequest, SearchTransport, TransportError};

/// Keyword used when probing whether a secret is live.
const PROBE_KEYWORD: &str = "test query";

/// Limit overrides for a credential being added or updated.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialLimits {
    pub daily_limit: Option<u32>,
    pub monthly_limit: Option<u32>,
    pub priority: Option<u32>,
}

struct PoolState {
    credentials: Vec<Credential>,
    /// Ids currently executing a request.
    in_flight: HashSet<String>,
    rr_cursor: u64,
}

/// Typed outcome of one lookup attempt; the retry loop acts on the tag.
enum AttemptOutcome {
    Success(Box<RankingRecord>),
    Retryable(TrackError),
    Fatal(TrackError),
}

pub struct SearchPool {
    state: Arc<Mutex<PoolState>>,
    store: Arc<dyn CredentialStore>,
    rankings: Arc<dyn RankingStore>,
    transport: Arc<dyn SearchTransport>,
    config: PoolConfig,
}

impl SearchPool {
    /// Build the pool from configured seeds merged with stored records.
    ///
    /// Configured entries are numbered in seed order and validated
    /// (placeholders and too-short secrets are skipped with a warning);
    /// user-added records come from the store, skipping secret
    /// duplicates; counters for configured entries are reconciled against
    /// their stored projection, which is created when absent.
    pub async fn init(
        config: PoolConfig,
        store: Arc<dyn CredentialStore>,
        rankings: Arc<dyn RankingStore>,
        transport: Arc<dyn SearchTransport>,
    ) -> Result<Self, TrackError> {
        let mut credentials: Vec<Credential> = Vec::new();
        let mut number = 0u32;

        for seed in &config.seeds {
            if let Err(reason) = validate_secret(seed.provider, &seed.secret) {
                warn!(%reason, provider = %seed.provider, "skipping configured credential");
                continue;
            }
            let secret = seed.secret.trim().to_string();
            if credentials.iter().any(|c| c.secret == secret) {
                warn!("skipping configured credential with duplicate secret");
                continue;
            }
            if seed.provider == Provider::CustomSearch && seed.search_engine_id.is_none() {
                warn!("skipping custom-search credential without a search engine id");
                continue;
            }
            number += 1;
            let mut credential = Credential::new(
                format!("configured-{number}"),
                seed.provider,
                secret,
                seed.daily_limit.unwrap_or(config.default_daily_limit),
                seed.monthly_limit.unwrap_or(config.default_monthly_limit),
                seed.priority.unwrap_or(number),
                CredentialOrigin::Configured,
            );
            credential.search_engine_id = seed.search_engine_id.clone();
            credentials.push(credential);
        }

        let stored = store
            .load_all()
            .await
            .map_err(|e| TrackError::new(ErrorKind::Unknown, e.to_string()))?;
        for record in stored {
            match record.origin {
                CredentialOrigin::UserAdded => {
                    if credentials.iter().all(|c| c.secret != record.secret) {
                        credentials.push(record);
                    }
                }
                CredentialOrigin::Configured => {
                    if let Some(credential) =
                        credentials.iter_mut().find(|c| c.id == record.id)
                    {
                        UsagePatch::from_credential(&record).apply(credential);
                    }
                }
            }
        }

        for credential in credentials.iter().filter(|c| c.origin == CredentialOrigin::Configured) {
            if let Err(error) = store.upsert(credential).await {
                warn!(%error, id = %credential.id, "failed to persist configured credential");
            }
        }

        info!(total = credentials.len(), "credential pool initialized");

        let pool = Self {
            state: Arc::new(Mutex::new(PoolState {
                credentials,
                in_flight: HashSet::new(),
                rr_cursor: 0,
            })),
            store,
            rankings,
            transport,
            config,
        };
        pool.check_monthly_if_stale().await;
        Ok(pool)
    }

    /// Flush a final usage snapshot of every credential to the store.
    pub async fn shutdown(&self) {
        for credential in self.snapshot() {
            if let Err(error) = self
                .store
                .upsert_usage(&credential.id, UsagePatch::from_credential(&credential))
                .await
            {
                warn!(%error, id = %credential.id, "final usage flush failed");
            }
        }
        info!("credential pool shut down");
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clone of the current credential list.
    pub fn snapshot(&self) -> Vec<Credential> {
        self.lock().credentials.clone()
    }

    pub fn stats(&self) -> PoolStats {
        compute_stats(&self.lock().credentials, Utc::now())
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Pick the best available credential and mark it in-flight, as one
    /// atomic step under the pool mutex. Credentials in `exclude` have
    /// already failed this lookup and are not offered again.
    fn acquire(&self, provider: Provider, exclude: &HashSet<String>) -> Option<Credential> {
        let mut state = self.lock();
        let index = select_index(&mut state, provider, self.config.rotation, exclude)?;
        let id = state.credentials[index].id.clone();
        state.in_flight.insert(id);
        Some(state.credentials[index].clone())
    }

    /// Whether any credential could currently serve the provider.
    fn any_selectable(&self, provider: Provider) -> bool {
        let state = self.lock();
        state
            .credentials
            .iter()
            .any(|c| c.is_available(provider) && !state.in_flight.contains(&c.id))
    }

    /// Release the in-flight lock and account a successful call,
    /// reconciling counters against provider-reported usage headers.
    fn finish_success(&self, id: &str, usage: UsageHeaders) {
        let snapshot = {
            let mut state = self.lock();
            state.in_flight.remove(id);
            let Some(credential) = state.credentials.iter_mut().find(|c| c.id == id) else {
                return;
            };
            credential.record_success();
            if let Some(reported) = usage.effective_used() {
                if reported > u64::from(credential.used_this_month) {
                    credential.used_this_month = reported.min(u64::from(u32::MAX)) as u32;
                }
            }
            // A harvested limit only fills in an unmetered credential; a
            // configured limit stays authoritative.
            if let Some(limit) = usage.monthly_limit {
                if credential.monthly_limit == 0 && limit > 0 {
                    credential.monthly_limit = limit.min(u64::from(u32::MAX)) as u32;
                }
            }
            if !credential.has_monthly_quota() {
                credential.status = CredentialStatus::Exhausted;
            }
            credential.clone()
        };
        self.schedule_usage_upsert(snapshot);
    }

    /// Release the in-flight lock and apply the failure policy for the
    /// error kind: exhaust on quota, pause on throttle, error out on
    /// rejection, otherwise count the failure.
    fn finish_failure(&self, id: &str, kind: ErrorKind) {
        let snapshot = {
            let mut state = self.lock();
            state.in_flight.remove(id);
            let Some(credential) = state.credentials.iter_mut().find(|c| c.id == id) else {
                return;
            };
            match kind {
                ErrorKind::QuotaExceeded => {
                    credential.status = CredentialStatus::Exhausted;
                    credential.touch();
                }
                ErrorKind::RateLimited => {
                    let prior = credential.status;
                    credential.status = CredentialStatus::Paused;
                    credential.touch();
                    self.schedule_unpause(id.to_string(), prior);
                }
                ErrorKind::Unauthorized => {
                    credential.record_failure();
                    credential.status = CredentialStatus::Error;
                }
                _ => credential.record_failure(),
            }
            credential.clone()
        };
        self.schedule_usage_upsert(snapshot);
    }

    /// Restore a paused credential to its prior status once the
    /// rate-limit window has elapsed.
    fn schedule_unpause(&self, id: String, prior: CredentialStatus) {
        let state = Arc::clone(&self.state);
        let store = Arc::clone(&self.store);
        let pause = Duration::from_millis(self.config.rate_limit_pause_ms);
        tokio::spawn(async move {
            tokio::time::sleep(pause).await;
            let snapshot = {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                state
                    .credentials
                    .iter_mut()
                    .find(|c| c.id == id && c.status == CredentialStatus::Paused)
                    .map(|credential| {
                        credential.status = prior;
                        credential.touch();
                        credential.clone()
                    })
            };
            if let Some(credential) = snapshot {
                debug!(id = %credential.id, "rate-limit pause elapsed");
                if let Err(error) = store
                    .upsert_usage(&credential.id, UsagePatch::from_credential(&credential))
                    .await
                {
                    warn!(%error, id = %credential.id, "usage write failed after unpause");
                }
            }
        });
    }

    /// Durability is off the critical path: fire and forget, idempotent
    /// upsert by id.
    fn schedule_usage_upsert(&self, credential: Credential) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(error) = store
                .upsert_usage(&credential.id, UsagePatch::from_credential(&credential))
                .await
            {
                warn!(%error, id = %credential.id, "usage write failed");
            }
        });
    }

    fn build_request(
        &self,
        provider: Provider,
        keyword: &str,
        options: &SearchOptions,
        secret: &str,
        search_engine_id: Option<&str>,
    ) -> Result<ProviderRequest, TrackError> {
        let params = match provider {
            Provider::NativeSerp => build_native_params(keyword, options, secret),
            Provider::CustomSearch => {
                let engine_id = search_engine_id.ok_or_else(|| {
                    TrackError::new(
                        ErrorKind::InvalidRequest,
                        "custom search requires a search engine id",
                    )
                })?;
                build_custom_params(keyword, options, secret, engine_id)
            }
        };
        Ok(ProviderRequest {
            endpoint: endpoint_for(&self.config, provider),
            params,
            timeout: Duration::from_millis(self.config.request_timeout_ms),
        })
    }

    /// Look up one keyword.
    ///
    /// With a user-supplied secret in the options the pool is bypassed
    /// entirely; otherwise credentials rotate on retryable failures until
    /// one succeeds, a fatal failure surfaces, or the attempt budget —
    /// the provider's pool size capped by the configured maximum — runs
    /// out.
    pub async fn track(
        &self,
        keyword: &str,
        options: &SearchOptions,
    ) -> Result<RankingRecord, TrackError> {
        let provider = options.provider.unwrap_or(Provider::NativeSerp);
        if let Some(secret) = options.api_key.clone() {
            return self
                .track_with_user_key(keyword, options, provider, &secret)
                .await;
        }

        let pool_size = {
            let state = self.lock();
            state
                .credentials
                .iter()
                .filter(|c| c.provider == provider)
                .count()
        };
        let max_retries = pool_size.min(self.config.max_retries as usize).max(1);

        // Each budget unit is one live attempt on a credential not tried
        // before in this lookup; retryable failures rotate, never repeat.
        let mut attempted: HashSet<String> = HashSet::new();
        let mut last_error: Option<TrackError> = None;
        for attempt in 0..max_retries {
            let Some(credential) = self.acquire(provider, &attempted) else {
                return Err(TrackError::all_exhausted(provider));
            };
            debug!(keyword, id = %credential.id, attempt, "executing lookup");
            match self.attempt(&credential, keyword, options).await {
                AttemptOutcome::Success(record) => return Ok(*record),
                AttemptOutcome::Retryable(error) => {
                    warn!(keyword, kind = ?error.kind, id = ?error.credential_id, "lookup attempt failed, rotating");
                    attempted.insert(credential.id.clone());
                    last_error = Some(error);
                }
                AttemptOutcome::Fatal(error) => return Err(error),
            }
        }

        // The final failure may have knocked out the last usable
        // credential (quota hit, rate-limit pause); report exhaustion
        // then, otherwise the last cause.
        if !self.any_selectable(provider) {
            return Err(TrackError::all_exhausted(provider));
        }
        Err(last_error.unwrap_or_else(|| TrackError::all_exhausted(provider)))
    }

    /// One attempt against one credential. Always releases the in-flight
    /// lock before returning.
    async fn attempt(
        &self,
        credential: &Credential,
        keyword: &str,
        options: &SearchOptions,
    ) -> AttemptOutcome {
        let request = match self.build_request(
            credential.provider,
            keyword,
            options,
            &credential.secret,
            credential.search_engine_id.as_deref(),
        ) {
            Ok(request) => request,
            Err(error) => {
                self.finish_failure(&credential.id, error.kind);
                return AttemptOutcome::Fatal(error.with_credential(&credential.id));
            }
        };

        let started = Instant::now();
        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(TransportError::Timeout) => {
                self.finish_failure(&credential.id, ErrorKind::Timeout);
                return AttemptOutcome::Retryable(
                    TrackError::new(ErrorKind::Timeout, "request deadline exceeded")
                        .with_credential(&credential.id),
                );
            }
            Err(TransportError::Network(message)) => {
                self.finish_failure(&credential.id, ErrorKind::NetworkError);
                return AttemptOutcome::Retryable(
                    TrackError::new(ErrorKind::NetworkError, message)
                        .with_credential(&credential.id),
                );
            }
        };

        if !response.is_success() {
            let message = response.error_message();
            let kind = classify_response(response.status, &message);
            self.finish_failure(&credential.id, kind);
            let error = TrackError::new(kind, message).with_credential(&credential.id);
            return if kind.is_retryable() {
                AttemptOutcome::Retryable(error)
            } else {
                AttemptOutcome::Fatal(error)
            };
        }

        let context = RequestContext {
            credential_id: Some(credential.id.clone()),
            processing_time_ms: Some(started.elapsed().as_millis() as u64),
            keep_raw_response: self.config.keep_raw_response,
        };
        match parse_response(
            credential.provider,
            keyword,
            &response.body,
            options,
            &context,
        ) {
            Ok(record) => {
                self.finish_success(&credential.id, response.usage);
                if let Err(error) = self.rankings.append(&record).await {
                    warn!(%error, keyword, "failed to persist ranking record");
                }
                AttemptOutcome::Success(Box::new(record))
            }
            Err(parse_error) => {
                let error = TrackError::from(parse_error).with_credential(&credential.id);
                self.finish_failure(&credential.id, error.kind);
                if error.kind.is_retryable() {
                    AttemptOutcome::Retryable(error)
                } else {
                    AttemptOutcome::Fatal(error)
                }
            }
        }
    }

    /// Lookup with a caller-owned secret: unbounded for the call, no pool
    /// mutation, and every failure surfaces as an invalid request.
    async fn track_with_user_key(
        &self,
        keyword: &str,
        options: &SearchOptions,
        provider: Provider,
        secret: &str,
    ) -> Result<RankingRecord, TrackError> {
        let engine_id = options.extra_params.get("cx").map(String::as_str);
        let request = self
            .build_request(provider, keyword, options, secret, engine_id)
            .map_err(|e| TrackError::new(ErrorKind::InvalidRequest, e.message))?;

        let started = Instant::now();
        let response = self.transport.execute(request).await.map_err(|e| {
            TrackError::new(ErrorKind::InvalidRequest, format!("user key lookup failed: {e}"))
        })?;
        if !response.is_success() {
            return Err(TrackError::new(
                ErrorKind::InvalidRequest,
                format!("user key lookup failed: {}", response.error_message()),
            ));
        }

        let context = RequestContext {
            credential_id: None,
            processing_time_ms: Some(started.elapsed().as_millis() as u64),
            keep_raw_response: self.config.keep_raw_response,
        };
        let record = parse_response(provider, keyword, &response.body, options, &context)
            .map_err(|e| {
                TrackError::new(ErrorKind::InvalidRequest, format!("user key lookup failed: {e}"))
            })?;
        if let Err(error) = self.rankings.append(&record).await {
            warn!(%error, keyword, "failed to persist ranking record");
        }
        Ok(record)
    }

    /// Probe a secret against its provider with a canned query.
    async fn probe_secret(
        &self,
        provider: Provider,
        secret: &str,
        search_engine_id: Option<&str>,
    ) -> Result<(), TrackError> {
        let options = SearchOptions::new("example.com", "US");
        let request = self.build_request(provider, PROBE_KEYWORD, &options, secret, search_engine_id)?;
        let response = self.transport.execute(request).await.map_err(|e| match e {
            TransportError::Timeout => TrackError::new(ErrorKind::Timeout, e.to_string()),
            TransportError::Network(msg) => TrackError::new(ErrorKind::NetworkError, msg),
        })?;
        if !response.is_success() {
            let message = response.error_message();
            return Err(TrackError::new(
                classify_response(response.status, &message),
                message,
            ));
        }
        let context = RequestContext::default();
        parse_response(provider, PROBE_KEYWORD, &response.body, &options, &context)?;
        Ok(())
    }

    /// Validate, probe, and append a user-added credential; returns its id.
    ///
    /// A rate-limited probe is reported as such rather than rejecting a
    /// possibly valid key. A secret duplicating a configured entry is
    /// allowed with a warning; duplicating another user-added entry is an
    /// error.
    pub async fn add_credential(
        &self,
        provider: Provider,
        secret: &str,
        search_engine_id: Option<String>,
        limits: CredentialLimits,
    ) -> Result<String, TrackError> {
        let secret = secret.trim();
        validate_secret(provider, secret)
            .map_err(|reason| TrackError::new(ErrorKind::InvalidRequest, reason))?;

        {
            let state = self.lock();
            for existing in &state.credentials {
                if existing.secret == secret {
                    match existing.origin {
                        CredentialOrigin::UserAdded => {
                            return Err(TrackError::new(
                                ErrorKind::InvalidRequest,
                                "a credential with this secret already exists",
                            ));
                        }
                        CredentialOrigin::Configured => {
                            warn!(id = %existing.id, "added secret duplicates a configured credential");
                        }
                    }
                }
            }
        }

        self.probe_secret(provider, secret, search_engine_id.as_deref())
            .await?;

        let (credential, id) = {
            let mut state = self.lock();
            let priority = limits
                .priority
                .unwrap_or(state.credentials.len() as u32 + 1);
            let id = Uuid::new_v4().to_string();
            let mut credential = Credential::new(
                id.clone(),
                provider,
                secret,
                limits.daily_limit.unwrap_or(self.config.default_daily_limit),
                limits
                    .monthly_limit
                    .unwrap_or(self.config.default_monthly_limit),
                priority,
                CredentialOrigin::UserAdded,
            );
            credential.search_engine_id = search_engine_id;
            state.credentials.push(credential.clone());
            (credential, id)
        };

        if let Err(error) = self.store.upsert(&credential).await {
            warn!(%error, id = %credential.id, "failed to persist added credential");
        }
        info!(id = %id, provider = %provider, "credential added to pool");
        Ok(id)
    }

    /// Adjust limits or priority of an existing credential.
    pub async fn update_credential(
        &self,
        id: &str,
        limits: CredentialLimits,
    ) -> Result<(), TrackError> {
        let snapshot = {
            let mut state = self.lock();
            let credential = state
                .credentials
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| {
                    TrackError::new(ErrorKind::InvalidRequest, format!("unknown credential: {id}"))
                })?;
            if let Some(daily) = limits.daily_limit {
                credential.daily_limit = daily;
            }
            if let Some(monthly) = limits.monthly_limit {
                credential.monthly_limit = monthly;
            }
            if let Some(priority) = limits.priority {
                credential.priority = priority;
            }
            credential.touch();
            credential.clone()
        };
        if let Err(error) = self.store.upsert(&snapshot).await {
            warn!(%error, id, "failed to persist credential update");
        }
        Ok(())
    }

    /// Remove a credential from the pool and the store.
    pub async fn remove_credential(&self, id: &str) -> Result<(), TrackError> {
        {
            let mut state = self.lock();
            let before = state.credentials.len();
            state.credentials.retain(|c| c.id != id);
            if state.credentials.len() == before {
                return Err(TrackError::new(
                    ErrorKind::InvalidRequest,
                    format!("unknown credential: {id}"),
                ));
            }
            state.in_flight.remove(id);
        }
        if let Err(error) = self.store.delete(id).await {
            warn!(%error, id, "failed to delete stored credential");
        }
        info!(id, "credential removed from pool");
        Ok(())
    }

    /// Probe a caller-owned secret without persisting anything.
    pub async fn test_user_key(
        &self,
        provider: Provider,
        secret: &str,
        search_engine_id: Option<&str>,
    ) -> Result<(), TrackError> {
        validate_secret(provider, secret.trim())
            .map_err(|reason| TrackError::new(ErrorKind::InvalidRequest, reason))?;
        self.probe_secret(provider, secret.trim(), search_engine_id)
            .await
    }

    /// Daily rollover: zero daily counters, clear error counts, and
    /// reactivate everything that is not paused.
    pub async fn reset_daily_all(&self) {
        {
            let mut state = self.lock();
            for credential in &mut state.credentials {
                credential.used_today = 0;
                credential.error_count = 0;
                if credential.status != CredentialStatus::Paused {
                    credential.status = CredentialStatus::Active;
                }
                credential.touch();
            }
        }
        if let Err(error) = self.store.reset_daily_all().await {
            warn!(%error, "stored daily reset failed");
        }
        info!("daily counters reset");
    }

    /// Monthly rollover: zero monthly counters, stamp the reset time, and
    /// reopen exhausted credentials that still have daily quota.
    pub async fn reset_monthly_all(&self) {
        let reset_at = Utc::now();
        {
            let mut state = self.lock();
            for credential in &mut state.credentials {
                credential.used_this_month = 0;
                credential.monthly_reset_at = reset_at;
                if credential.status == CredentialStatus::Exhausted && credential.has_daily_quota()
                {
                    credential.status = CredentialStatus::Active;
                }
                credential.touch();
            }
        }
        if let Err(error) = self.store.reset_monthly_all(reset_at).await {
            warn!(%error, "stored monthly reset failed");
        }
        info!("monthly counters reset");
    }

    /// Run the monthly reset once when any stored reset stamp is from a
    /// prior calendar month, covering downtime across the boundary.
    pub async fn check_monthly_if_stale(&self) {
        let now = Utc::now();
        let stale = {
            let state = self.lock();
            state.credentials.iter().any(|c| {
                let stamp = c.monthly_reset_at;
                stamp.year() < now.year()
                    || (stamp.year() == now.year() && stamp.month() < now.month())
            })
        };
        if stale {
            info!("monthly reset stamp is stale, resetting");
            self.reset_monthly_all().await;
        }
    }
}

/// Pick the index of the next credential per the rotation strategy,
/// skipping unavailable, in-flight, and explicitly excluded entries.
/// Callers hold the pool mutex, which makes selection and the in-flight
/// marking one atomic step.
fn select_index(
    state: &mut PoolState,
    provider: Provider,
    rotation: RotationStrategy,
    exclude: &HashSet<String>,
) -> Option<usize> {
    let available: Vec<usize> = state
        .credentials
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            c.is_available(provider)
                && !state.in_flight.contains(&c.id)
                && !exclude.contains(&c.id)
        })
        .map(|(index, _)| index)
        .collect();
    if available.is_empty() {
        return None;
    }
    let chosen = match rotation {
        RotationStrategy::Priority => *available
            .iter()
            .min_by_key(|&&index| state.credentials[index].priority)?,
        RotationStrategy::LeastUsed => *available
            .iter()
            .min_by_key(|&&index| state.credentials[index].used_today)?,
        RotationStrategy::RoundRobin => {
            let index = available[(state.rr_cursor as usize) % available.len()];
            state.rr_cursor = state.rr_cursor.wrapping_add(1);
            index
        }
    };
    Some(chosen)
}
