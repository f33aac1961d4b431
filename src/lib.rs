//! Umbrella crate for the serptrack rank-tracking engine.
//!
//! Re-exports the layer crates — domain matching, provider parsing,
//! credential storage, the pool coordinator, bulk execution, and the
//! reset scheduler — so applications can drive the whole pipeline
//! through a single dependency. [`Serptrack`] bundles the common wiring:
//! an in-memory store, the HTTP transport, a [`SearchPool`], and a
//! [`BulkExecutor`] behind one `init`/`shutdown` pair.
//!
//! ## Quick start
//!
//! ```ignore
//! use serptrack::{BulkConfig, PoolConfig, SearchOptions, Serptrack};
//!
//! # async fn demo() -> Result<(), serptrack::TrackError> {
//! let tracker = Serptrack::init(PoolConfig::from_env(), BulkConfig::from_env()).await?;
//!
//! let record = tracker
//!     .track("rust rank tracker", &SearchOptions::new("example.com", "US"))
//!     .await?;
//! println!("position: {:?} (confidence {})", record.position, record.validation.confidence);
//!
//! let bulk = tracker
//!     .track_bulk(
//!         vec!["rust tracker".into(), "serp api pool".into()],
//!         SearchOptions::new("example.com", "US"),
//!         None,
//!     )
//!     .await;
//! println!("{} ok, {} failed", bulk.records.len(), bulk.failures.len());
//!
//! tracker.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! Deployments that need durable credential state implement the
//! [`CredentialStore`]/[`RankingStore`] traits and hand them to
//! [`Serptrack::init_with`]; the same seam accepts a scripted transport
//! in tests.

use std::sync::Arc;

pub use bulk::{BulkConfig, BulkExecutor, BulkProgress, BulkResult, FailedLookup, QualityHistogram};
pub use matcher::{extract_domain, match_domains, normalize_domain, DomainMatch, MatchType};
pub use parser::{
    parse_response, CompetitorEntry, Device, ParseError, PositionSource, PositionValidation,
    Provider, RankingRecord, Reliability, RequestContext, SearchMetadata, SearchOptions,
    SerpFeature, SerpFeatureKind,
};
pub use pool::{
    CredentialLimits, CredentialSeed, CredentialStatsEntry, ErrorKind, HttpTransport, PoolConfig,
    PoolStats, ProviderRequest, ProviderResponse, RotationStrategy, SearchPool, SearchTransport,
    TrackError, TransportError, UsageHeaders,
};
pub use scheduler::{ResetScheduler, SchedulerConfig};
pub use store::{
    Credential, CredentialHealth, CredentialOrigin, CredentialStatus, CredentialStore,
    MemoryStore, RankingStore, StoreError, UsagePatch,
};

use tokio::sync::mpsc::UnboundedSender;

/// One-stop wiring of the tracking engine.
pub struct Serptrack {
    pool: Arc<SearchPool>,
    bulk: BulkExecutor,
}

impl Serptrack {
    /// Initialize with the default backends: in-memory storage and the
    /// reqwest transport.
    pub async fn init(pool_config: PoolConfig, bulk_config: BulkConfig) -> Result<Self, TrackError> {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(
            HttpTransport::new()
                .map_err(|e| TrackError::new(ErrorKind::Unknown, e.to_string()))?,
        );
        Self::init_with(pool_config, bulk_config, store.clone(), store, transport).await
    }

    /// Initialize with caller-provided storage and transport.
    pub async fn init_with(
        pool_config: PoolConfig,
        bulk_config: BulkConfig,
        credentials: Arc<dyn CredentialStore>,
        rankings: Arc<dyn RankingStore>,
        transport: Arc<dyn SearchTransport>,
    ) -> Result<Self, TrackError> {
        let pool =
            Arc::new(SearchPool::init(pool_config, credentials, rankings, transport).await?);
        let bulk = BulkExecutor::new(pool.clone(), bulk_config);
        Ok(Self { pool, bulk })
    }

    /// Look up one keyword through the pool.
    pub async fn track(
        &self,
        keyword: &str,
        options: &SearchOptions,
    ) -> Result<RankingRecord, TrackError> {
        self.pool.track(keyword, options).await
    }

    /// Run a batch of keywords with bounded concurrency and retries.
    pub async fn track_bulk(
        &self,
        keywords: Vec<String>,
        options: SearchOptions,
        progress: Option<UnboundedSender<BulkProgress>>,
    ) -> BulkResult {
        self.bulk.run(keywords, options, progress).await
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn pool(&self) -> &Arc<SearchPool> {
        &self.pool
    }

    /// Flush usage state and stop.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
