//! Bulk executor behavior: boundaries, ordering, retries, and progress
//! events.

mod common;

use std::sync::Arc;

use common::{build_pool, native_body, pool_config, seed, FakeTransport};
use serptrack::{
    BulkConfig, BulkExecutor, ErrorKind, MemoryStore, SearchOptions, TransportError,
};
use tokio::sync::mpsc;

fn options() -> SearchOptions {
    SearchOptions::new("example.com", "US")
}

/// Fast test config: tiny delays, retries off unless a test opts in.
fn quick_config() -> BulkConfig {
    BulkConfig {
        batch_size: 5,
        inter_batch_delay_ms: 5,
        max_concurrent: 2,
        retry_enabled: false,
        max_retries: 2,
        adaptive_delay: true,
        budget_ms: 290_000,
    }
}

#[tokio::test]
async fn empty_keyword_list_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    let pool = build_pool(pool_config(vec![seed("k1", 1, 100)]), store, transport.clone()).await;
    let executor = BulkExecutor::new(pool, quick_config());

    let result = executor
        .run(vec![String::new(), "   ".to_string()], options(), None)
        .await;
    assert_eq!(result.total_processed, 0);
    assert!(result.records.is_empty());
    assert!(result.failures.is_empty());
    assert_eq!(result.duration_ms, 0);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn serial_batches_preserve_keyword_order() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    let pool = build_pool(pool_config(vec![seed("k1", 1, 100)]), store, transport.clone()).await;

    let config = BulkConfig {
        batch_size: 1,
        max_concurrent: 1,
        ..quick_config()
    };
    let executor = BulkExecutor::new(pool, config);

    let result = executor
        .run(vec!["alpha".into(), "beta".into()], options(), None)
        .await;
    assert_eq!(result.records.len(), 2);
    assert_eq!(transport.seen_keywords(), vec!["alpha", "beta"]);
}

#[tokio::test]
async fn exhausted_pool_fails_every_keyword() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    // Single credential with one daily slot: the first keyword consumes
    // it, everything after reports exhaustion.
    let pool = build_pool(pool_config(vec![seed("k1", 1, 1)]), store, transport).await;

    let config = BulkConfig {
        batch_size: 1,
        max_concurrent: 1,
        ..quick_config()
    };
    let executor = BulkExecutor::new(pool, config);

    let result = executor
        .run(vec!["a".into(), "b".into(), "c".into()], options(), None)
        .await;
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.failures.len(), 2);
    for failure in &result.failures {
        assert!(
            matches!(failure.kind, ErrorKind::AllExhausted | ErrorKind::QuotaExceeded),
            "unexpected kind {:?}",
            failure.kind
        );
    }
    assert_eq!(result.total_processed, 3);
}

#[tokio::test]
async fn retry_pass_recovers_transient_failures() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    // A sole credential gets one live attempt per lookup: the transport
    // error fails the batch attempt, the bulk retry pass then succeeds.
    transport.push_error(TransportError::Network("reset".into()));
    transport.push_ok(native_body(&[("https://example.com", Some(2))]));

    let pool = build_pool(pool_config(vec![seed("k1", 1, 100)]), store, transport).await;
    let config = BulkConfig {
        batch_size: 1,
        max_concurrent: 1,
        retry_enabled: true,
        inter_batch_delay_ms: 5,
        ..quick_config()
    };
    let executor = BulkExecutor::new(pool, config);

    let result = executor.run(vec!["kw".into()], options(), None).await;
    assert_eq!(result.failures.len(), 0);
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].position, Some(2));
}

#[tokio::test]
async fn persistent_failures_accumulate_retry_counts() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    // Every attempt fails: one in the batch, then one per retry pass.
    for _ in 0..3 {
        transport.push_error(TransportError::Network("reset".into()));
    }

    let pool = build_pool(pool_config(vec![seed("k1", 1, 100)]), store, transport).await;
    let config = BulkConfig {
        batch_size: 1,
        max_concurrent: 1,
        retry_enabled: true,
        inter_batch_delay_ms: 5,
        ..quick_config()
    };
    let executor = BulkExecutor::new(pool, config);

    let result = executor.run(vec!["kw".into()], options(), None).await;
    assert!(result.records.is_empty());
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].retry_count, 2);
    assert_eq!(result.failures[0].kind, ErrorKind::NetworkError);
}

#[tokio::test]
async fn expired_budget_reports_remaining_keywords_as_timeouts() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    let pool = build_pool(pool_config(vec![seed("k1", 1, 100)]), store, transport.clone()).await;

    let config = BulkConfig {
        batch_size: 1,
        max_concurrent: 1,
        inter_batch_delay_ms: 50,
        budget_ms: 20,
        ..quick_config()
    };
    let executor = BulkExecutor::new(pool, config);

    let result = executor
        .run(vec!["a".into(), "b".into(), "c".into()], options(), None)
        .await;
    // The first batch starts inside the budget; the inter-batch pause
    // outlives it and later keywords never start.
    assert!(!result.failures.is_empty());
    for failure in &result.failures {
        assert_eq!(failure.kind, ErrorKind::Timeout);
    }
    assert!(result.records.len() + result.failures.len() == 3);
    assert!(transport.request_count() < 3);
}

#[tokio::test]
async fn progress_events_flow_over_the_channel() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    let pool = build_pool(pool_config(vec![seed("k1", 1, 100)]), store, transport).await;

    let config = BulkConfig {
        batch_size: 2,
        max_concurrent: 2,
        ..quick_config()
    };
    let executor = BulkExecutor::new(pool, config);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = executor
        .run(
            vec!["a".into(), "b".into(), "c".into()],
            options(),
            Some(tx),
        )
        .await;
    assert_eq!(result.records.len(), 3);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    // One event per batch (2 batches), none tagged as retries.
    assert_eq!(events.len(), 2);
    assert_eq!(events.last().unwrap().processed, 3);
    assert_eq!(events.last().unwrap().total, 3);
    assert!(events.iter().all(|e| e.retry_attempt.is_none()));
}

#[tokio::test]
async fn quality_histogram_reflects_record_reliability() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    // Provider position on a clean page: high reliability.
    transport.push_ok(native_body(&[
        ("https://example.com", Some(1)),
        ("https://a.com", Some(2)),
        ("https://b.com", Some(3)),
        ("https://c.com", Some(4)),
        ("https://d.com", Some(5)),
        ("https://e.com", Some(6)),
        ("https://f.com", Some(7)),
        ("https://g.com", Some(8)),
        ("https://h.com", Some(9)),
        ("https://i.com", Some(10)),
    ]));
    // No position fields at all: fallback source, lower confidence.
    transport.push_ok(native_body(&[("https://example.com", None)]));

    let pool = build_pool(pool_config(vec![seed("k1", 1, 100)]), store, transport).await;
    let config = BulkConfig {
        batch_size: 1,
        max_concurrent: 1,
        ..quick_config()
    };
    let executor = BulkExecutor::new(pool, config);

    let result = executor
        .run(vec!["clean".into(), "murky".into()], options(), None)
        .await;
    assert_eq!(result.records.len(), 2);
    assert_eq!(result.quality.high, 1);
    assert_eq!(result.quality.medium + result.quality.low, 1);
}
