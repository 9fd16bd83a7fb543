use crate::analytics::{compute_profit, ProfitBreakdown};
use crate::api::{AppState, AsOfQuery};
use crate::domain::{Position, PositionStatus};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub positions: Vec<Position>,
    pub count: usize,
}

pub async fn list_positions(
    Query(params): Query<PositionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, AppError> {
    let status = match params.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(
            PositionStatus::from_str(s)
                .map_err(|_| AppError::BadRequest("Invalid status".to_string()))?,
        ),
        None => None,
    };

    let positions = match status {
        Some(PositionStatus::Farming) => state.store.list_active().await?,
        Some(PositionStatus::Unstaked) => state
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|p| !p.is_active())
            .collect(),
        None => state.store.list_all().await?,
    };

    Ok(Json(PositionsResponse {
        count: positions.len(),
        positions,
    }))
}

pub async fn get_position_profit(
    Path(id): Path<String>,
    Query(as_of): Query<AsOfQuery>,
    State(state): State<AppState>,
) -> Result<Json<ProfitBreakdown>, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::BadRequest("Invalid position id".to_string()))?;
    let as_of = as_of.resolve()?;

    let position = state
        .store
        .get_position(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("position {}", id)))?;

    Ok(Json(compute_profit(&position, &state.config, as_of)))
}
