use crate::analytics::{
    chain_distribution, compute_portfolio_stats, compute_risk_metrics, correlation_matrix,
    monthly_seasonality, ChainShare, CorrelationMatrix, MonthlyPerformance, PortfolioStats,
    RiskMetrics,
};
use crate::api::{AppState, AsOfQuery};
use crate::domain::{Position, TimeMs};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;

async fn load_history(
    state: &AppState,
    query: &AsOfQuery,
) -> Result<(Vec<Position>, TimeMs), AppError> {
    let as_of = query.resolve()?;
    let positions = state.store.list_all().await?;
    Ok((positions, as_of))
}

pub async fn get_stats(
    Query(query): Query<AsOfQuery>,
    State(state): State<AppState>,
) -> Result<Json<PortfolioStats>, AppError> {
    let (positions, as_of) = load_history(&state, &query).await?;
    Ok(Json(compute_portfolio_stats(&positions, &state.config, as_of)))
}

pub async fn get_risk(
    Query(query): Query<AsOfQuery>,
    State(state): State<AppState>,
) -> Result<Json<RiskMetrics>, AppError> {
    let (positions, as_of) = load_history(&state, &query).await?;
    Ok(Json(compute_risk_metrics(&positions, &state.config, as_of)))
}

pub async fn get_chains(
    Query(query): Query<AsOfQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ChainShare>>, AppError> {
    let (positions, as_of) = load_history(&state, &query).await?;
    Ok(Json(chain_distribution(&positions, &state.config, as_of)))
}

pub async fn get_seasonality(
    Query(query): Query<AsOfQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<MonthlyPerformance>>, AppError> {
    let (positions, as_of) = load_history(&state, &query).await?;
    Ok(Json(monthly_seasonality(&positions, &state.config, as_of)))
}

pub async fn get_correlation(
    Query(query): Query<AsOfQuery>,
    State(state): State<AppState>,
) -> Result<Json<CorrelationMatrix>, AppError> {
    let (positions, as_of) = load_history(&state, &query).await?;
    Ok(Json(correlation_matrix(&positions, &state.config, as_of)))
}
