use axum::{
    Json,
    extract::State,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::AppError, result::ApiResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryUsageResponse {
    pub driver: String,
    pub bytes: u64,
}

#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    /// Unix millis; everything stamped earlier is removed.
    pub older_than: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub removed: usize,
}

pub async fn memory_usage(
    State(state): State<AppState>,
) -> Result<Json<ApiResult<MemoryUsageResponse>>, AppError> {
    let bytes = state
        .cache
        .memory_usage()
        .await
        .map_err(|e| state.escalate(e))?;
    Ok(ApiResult::success(MemoryUsageResponse {
        driver: state.cache.backend().name().to_string(),
        bytes,
    }))
}

pub async fn wipe(State(state): State<AppState>) -> Result<Json<ApiResult<&'static str>>, AppError> {
    state.cache.wipe().await.map_err(|e| state.escalate(e))?;
    Ok(ApiResult::success("Cleaned"))
}

pub async fn purge(
    State(state): State<AppState>,
    Json(req): Json<PurgeRequest>,
) -> Result<Json<ApiResult<PurgeResponse>>, AppError> {
    let removed = state
        .cache
        .purge_older_than(req.older_than)
        .await
        .map_err(|e| state.escalate(e))?;
    Ok(ApiResult::success(PurgeResponse { removed }))
}
