//! Shared fixtures for integration tests: a scripted transport and pool
//! builders.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use serptrack::{
    CredentialSeed, MemoryStore, PoolConfig, Provider, ProviderRequest, ProviderResponse,
    SearchPool, SearchTransport, TransportError, UsageHeaders,
};

/// Transport that replays a scripted sequence of replies and records
/// every request it sees. When the script runs dry it returns a minimal
/// successful native body.
#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Result<ProviderResponse, TransportError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    latency_ms: u64,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that sleeps before replying, to force request overlap
    /// in concurrency tests.
    pub fn with_latency(latency_ms: u64) -> Self {
        Self {
            latency_ms,
            ..Self::default()
        }
    }

    pub fn push_ok(&self, body: Value) {
        self.push_status(200, body);
    }

    pub fn push_status(&self, status: u16, body: Value) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(ProviderResponse {
                status,
                body,
                usage: UsageHeaders::default(),
            }));
    }

    pub fn push_error(&self, error: TransportError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Keywords seen so far, in request order (the `q` parameter).
    pub fn seen_keywords(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|request| {
                request
                    .params
                    .iter()
                    .find(|(key, _)| key == "q")
                    .map(|(_, value)| value.clone())
            })
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchTransport for FakeTransport {
    async fn execute(&self, request: ProviderRequest) -> Result<ProviderResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ProviderResponse {
                    status: 200,
                    body: native_body(&[("https://example.com", Some(1))]),
                    usage: UsageHeaders::default(),
                })
            })
    }
}

/// Native-provider body with the given organic entries.
pub fn native_body(entries: &[(&str, Option<u32>)]) -> Value {
    let organic: Vec<Value> = entries
        .iter()
        .map(|(link, position)| {
            let mut entry = json!({ "link": link, "title": "t", "snippet": "s" });
            if let Some(position) = position {
                entry["position"] = json!(position);
            }
            entry
        })
        .collect();
    json!({
        "organic_results": organic,
        "search_information": { "total_results": 1000 },
    })
}

pub fn seed(tag: &str, priority: u32, daily_limit: u32) -> CredentialSeed {
    CredentialSeed {
        provider: Provider::NativeSerp,
        secret: format!("{tag}-0123456789abcdef0123456789abcdef"),
        search_engine_id: None,
        daily_limit: Some(daily_limit),
        monthly_limit: Some(0),
        priority: Some(priority),
    }
}

pub fn pool_config(seeds: Vec<CredentialSeed>) -> PoolConfig {
    PoolConfig {
        seeds,
        ..PoolConfig::default()
    }
}

pub async fn build_pool(
    config: PoolConfig,
    store: Arc<MemoryStore>,
    transport: Arc<FakeTransport>,
) -> Arc<SearchPool> {
    Arc::new(
        SearchPool::init(config, store.clone(), store, transport)
            .await
            .expect("pool init"),
    )
}
