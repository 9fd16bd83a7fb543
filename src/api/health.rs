use crate::api::AppState;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the position store answers.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let active = state.store.list_active().await?;
    Ok(Json(serde_json::json!({
        "status": "ready",
        "activePositions": active.len(),
        "capacity": state.config.max_active_positions,
    })))
}
