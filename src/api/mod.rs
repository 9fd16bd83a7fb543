pub mod health;
pub mod portfolio;
pub mod positions;

use crate::config::StrategyConfig;
use crate::db::PositionStore;
use crate::domain::TimeMs;
use crate::error::AppError;
use axum::{routing::get, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PositionStore>,
    pub config: StrategyConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn PositionStore>, config: StrategyConfig) -> Self {
        Self { store, config }
    }
}

/// Evaluation instant shared by the analytics endpoints. Defaults to now.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsOfQuery {
    pub as_of_ms: Option<i64>,
}

impl AsOfQuery {
    pub fn resolve(&self) -> Result<TimeMs, AppError> {
        match self.as_of_ms {
            Some(ms) if ms < 0 => Err(AppError::BadRequest("asOfMs must be >= 0".to_string())),
            Some(ms) => Ok(TimeMs::new(ms)),
            None => Ok(TimeMs::now()),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/positions", get(positions::list_positions))
        .route("/v1/positions/:id/profit", get(positions::get_position_profit))
        .route("/v1/portfolio/stats", get(portfolio::get_stats))
        .route("/v1/portfolio/risk", get(portfolio::get_risk))
        .route("/v1/portfolio/chains", get(portfolio::get_chains))
        .route("/v1/portfolio/seasonality", get(portfolio::get_seasonality))
        .route("/v1/portfolio/correlation", get(portfolio::get_correlation))
        .layer(cors)
        .with_state(state)
}
