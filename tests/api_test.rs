use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use yieldsim::api::{self, AppState};
use yieldsim::datasource::MockPoolFeed;
use yieldsim::db::{init_db, PositionStore, Repository};
use yieldsim::domain::{Decimal, Pool, PoolId, TimeMs, MS_PER_DAY};
use yieldsim::orchestration::LifecycleManager;
use yieldsim::StrategyConfig;

struct TestApp {
    app: axum::Router,
    store: Arc<Repository>,
    feed: Arc<MockPoolFeed>,
    config: StrategyConfig,
    _temp: TempDir,
}

impl TestApp {
    fn manager(&self) -> LifecycleManager {
        LifecycleManager::new(self.feed.clone(), self.store.clone(), self.config.clone())
    }
}

fn pool(id: &str, chain: &str, apy: i64, tvl: i64) -> Pool {
    Pool {
        id: PoolId::new(id),
        symbol: format!("{}-USDC", id.to_uppercase()),
        project: "curve-dex".to_string(),
        chain: chain.to_string(),
        apy: Decimal::from(apy),
        tvl_usd: Decimal::from(tvl),
    }
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let db_pool = init_db(&db_path).await.expect("init_db failed");

    let store = Arc::new(Repository::new(db_pool));
    let config = StrategyConfig {
        max_active_positions: 2,
        ..StrategyConfig::default()
    };
    let feed = Arc::new(MockPoolFeed::new().with_pools(vec![
        pool("a", "Ethereum", 720, 2_000_000),
        pool("b", "Polygon", 900, 3_000_000),
    ]));
    let app = api::create_router(AppState::new(store.clone(), config.clone()));

    TestApp {
        app,
        store,
        feed,
        config,
        _temp: temp_dir,
    }
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_empty_history_renders_zeroes() {
    let t = setup_test_app().await;

    let (status, body) = get_json(&t.app, "/v1/portfolio/stats?asOfMs=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["positionCount"], 0);
    assert_eq!(body["totalNetProfit"], 0.0);
    assert!(body["bestPosition"].is_null());

    let (status, body) = get_json(&t.app, "/v1/portfolio/risk").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sharpeRatio"], 0.0);

    let (_, body) = get_json(&t.app, "/v1/positions").await;
    assert_eq!(body["count"], 0);

    let (_, body) = get_json(&t.app, "/v1/portfolio/chains").await;
    assert_eq!(body, serde_json::json!([]));

    let (_, body) = get_json(&t.app, "/v1/portfolio/correlation").await;
    assert_eq!(body["approximate"], true);
}

#[tokio::test]
async fn test_positions_and_profit_after_cycle() {
    let t = setup_test_app().await;
    t.manager().run_cycle_at(TimeMs::new(0)).await.unwrap();

    let (status, body) = get_json(&t.app, "/v1/positions?status=FARMING").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["positions"][0]["status"], "FARMING");

    let (_, body) = get_json(&t.app, "/v1/positions?status=unstaked").await;
    assert_eq!(body["count"], 0);

    let id = t.store.list_active().await.unwrap()[0].id;
    let uri = format!("/v1/positions/{}/profit?asOfMs={}", id, 4 * MS_PER_DAY);
    let (status, body) = get_json(&t.app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["positionId"], id.to_string());
    assert_eq!(body["daysInPool"], 4.0);
    assert!(body["grossProfit"].as_f64().unwrap() > 0.0);

    let (_, body) = get_json(&t.app, &format!("/v1/portfolio/stats?asOfMs={}", 4 * MS_PER_DAY)).await;
    assert_eq!(body["activeCount"], 2);
    assert_eq!(body["chains"].as_array().unwrap().len(), 2);

    let (_, body) = get_json(&t.app, "/v1/portfolio/seasonality?asOfMs=1000").await;
    assert_eq!(body[0]["month"], "1970-01");
}

#[tokio::test]
async fn test_bad_requests() {
    let t = setup_test_app().await;

    let (status, body) = get_json(&t.app, "/v1/positions?status=PENDING").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid status");

    let (status, _) = get_json(&t.app, "/v1/positions/not-a-uuid/profit").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/v1/positions/{}/profit", uuid::Uuid::new_v4());
    let (status, body) = get_json(&t.app, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("position"));

    let (status, _) = get_json(&t.app, "/v1/portfolio/stats?asOfMs=-5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concurrent_reads_agree() {
    let t = setup_test_app().await;
    t.manager().run_cycle_at(TimeMs::new(0)).await.unwrap();

    let uri = format!("/v1/portfolio/risk?asOfMs={}", 2 * MS_PER_DAY);
    let responses =
        futures::future::join_all((0..8).map(|_| get_json(&t.app, &uri))).await;

    let (_, first) = &responses[0];
    for (status, body) in &responses {
        assert_eq!(*status, StatusCode::OK);
        assert_eq!(body, first);
    }
}

#[tokio::test]
async fn test_health_and_ready() {
    let t = setup_test_app().await;
    let (status, body) = get_json(&t.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = get_json(&t.app, "/ready").await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["capacity"], 2);
}
