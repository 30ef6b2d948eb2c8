//! System API endpoints.
//!
//! Status reporting and manual cache control.

use axum::{Json, extract::State};
use std::sync::Arc;
use tracing::info;

use super::{ApiError, ApiResponse, AppState, SystemStatus};
use crate::cache::RecordCache;

/// Returns version, uptime and the state of every cache entry.
///
/// # Endpoint
/// `GET /api/system/status`
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SystemStatus>>, ApiError> {
    let status = SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        cache: state.shared.cache.snapshot().await,
    };

    Ok(Json(ApiResponse::success(status)))
}

/// Evicts every cached collection; the next read of each reloads it.
///
/// # Endpoint
/// `DELETE /api/system/cache`
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.shared.cache.clear().await;
    info!("Record cache cleared");
    Ok(Json(ApiResponse::success(())))
}
