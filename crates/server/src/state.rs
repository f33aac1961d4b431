use std::sync::Arc;

use bulk::{BulkConfig, BulkExecutor};
use pool::{HttpTransport, PoolConfig, SearchPool};
use store::MemoryStore;

use crate::config::ServerConfig;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Credential pool (process-wide coordinator)
    pub pool: Arc<SearchPool>,

    /// Bulk executor over the pool
    pub bulk: BulkExecutor,

    /// Storage backend shared by pool and scheduler
    pub store: Arc<MemoryStore>,
}

impl AppState {
    /// Create new application state: storage, transport, pool, executor.
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(HttpTransport::new()?);

        let pool = Arc::new(
            SearchPool::init(
                PoolConfig::from_env(),
                store.clone(),
                store.clone(),
                transport,
            )
            .await?,
        );
        let bulk = BulkExecutor::new(pool.clone(), BulkConfig::from_env());

        Ok(Self {
            config: Arc::new(config),
            pool,
            bulk,
            store,
        })
    }
}
