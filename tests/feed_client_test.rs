use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use yieldsim::config::FeedConfig;
use yieldsim::datasource::{FeedError, LlamaPoolFeed, PoolFeed};
use yieldsim::domain::Decimal;

/// Serves `/pools`, answering with `failures` errors of `status` before succeeding.
#[derive(Clone)]
struct FakeFeed {
    hits: Arc<AtomicUsize>,
    failures: usize,
    status: StatusCode,
}

async fn pools(State(fake): State<FakeFeed>) -> axum::response::Response {
    let hit = fake.hits.fetch_add(1, Ordering::SeqCst);
    if hit < fake.failures {
        return (fake.status, "unavailable").into_response();
    }
    Json(serde_json::json!({
        "status": "success",
        "data": [
            {"pool": "p-1", "symbol": "ETH-USDC", "project": "uniswap-v3", "chain": "Ethereum",
             "apy": 612.5, "tvlUsd": 1250000.0},
            {"pool": "p-2", "symbol": "BROKEN", "project": "x", "chain": "Base",
             "apy": null, "tvlUsd": 10.0},
            {"pool": "p-3", "symbol": "OP-USDC", "project": "velodrome-v2", "chain": "Optimism",
             "apy": 88.0, "tvlUsd": 900000}
        ]
    }))
    .into_response()
}

async fn serve(fake: FakeFeed) -> String {
    let app = Router::new().route("/pools", get(pools)).with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn malformed(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    "{not json"
}

fn fast_policy(max_attempts: u32) -> FeedConfig {
    FeedConfig {
        timeout: Duration::from_secs(5),
        max_attempts,
        retry_delay: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_retries_transient_failure_then_parses() {
    let fake = FakeFeed {
        hits: Arc::new(AtomicUsize::new(0)),
        failures: 2,
        status: StatusCode::SERVICE_UNAVAILABLE,
    };
    let base = serve(fake.clone()).await;
    let feed = LlamaPoolFeed::new(format!("{}/", base), fast_policy(3)).unwrap();

    let pools = feed.fetch_pools().await.unwrap();
    assert_eq!(fake.hits.load(Ordering::SeqCst), 3);
    assert_eq!(pools.len(), 2);
    assert_eq!(pools[0].id.as_str(), "p-1");
    assert_eq!(pools[0].apy, Decimal::from_str_canonical("612.5").unwrap());
    assert_eq!(pools[1].tvl_usd, Decimal::from(900_000));
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let fake = FakeFeed {
        hits: Arc::new(AtomicUsize::new(0)),
        failures: usize::MAX,
        status: StatusCode::BAD_GATEWAY,
    };
    let base = serve(fake.clone()).await;
    let feed = LlamaPoolFeed::new(base, fast_policy(3)).unwrap();

    let err = feed.fetch_pools().await.unwrap_err();
    assert!(matches!(err, FeedError::HttpError { status: 502, .. }));
    assert_eq!(fake.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let fake = FakeFeed {
        hits: Arc::new(AtomicUsize::new(0)),
        failures: usize::MAX,
        status: StatusCode::NOT_FOUND,
    };
    let base = serve(fake.clone()).await;
    let feed = LlamaPoolFeed::new(base, fast_policy(3)).unwrap();

    let err = feed.fetch_pools().await.unwrap_err();
    assert!(matches!(err, FeedError::HttpError { status: 404, .. }));
    assert_eq!(fake.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_feed_is_network_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let feed = LlamaPoolFeed::new(format!("http://{}", addr), fast_policy(2)).unwrap();
    let err = feed.fetch_pools().await.unwrap_err();
    assert!(matches!(err, FeedError::NetworkError(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_retried_then_parse_error() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/pools", get(malformed))
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let feed = LlamaPoolFeed::new(format!("http://{}", addr), fast_policy(3)).unwrap();
    let err = feed.fetch_pools().await.unwrap_err();
    assert!(matches!(err, FeedError::ParseError(_)));
    assert!(err.is_transient());
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
