use axum::{extract::Query, extract::State, Json};

use crate::middleware::error_handling::Result;
use crate::models::sync_log::{ListSyncLogsQuery, SyncLogEntry, SyncMessageResponse, SyncStatusResponse};
use crate::services::sync_service::ReconcileSummary;
use crate::services::SyncService;

use super::AppState;

fn sync_service(state: &AppState) -> SyncService {
    SyncService::new(
        state.config.database_pool.clone(),
        state.config.erp_pool.clone(),
        state.resolver.clone(),
    )
}

pub async fn get_sync_status(State(state): State<AppState>) -> Result<Json<SyncStatusResponse>> {
    let status = sync_service(&state).status().await?;
    Ok(Json(status))
}

pub async fn sync_from_erp(State(state): State<AppState>) -> Result<Json<SyncMessageResponse>> {
    let message = sync_service(&state).sync_from_erp().await?;
    Ok(Json(SyncMessageResponse { message }))
}

pub async fn sync_to_erp(State(state): State<AppState>) -> Result<Json<SyncMessageResponse>> {
    let message = sync_service(&state).sync_to_erp().await?;
    Ok(Json(SyncMessageResponse { message }))
}

pub async fn get_sync_logs(
    State(state): State<AppState>,
    Query(query): Query<ListSyncLogsQuery>,
) -> Result<Json<Vec<SyncLogEntry>>> {
    let limit = query.limit.unwrap_or(50).min(500);
    let logs = sync_service(&state).logs(limit).await?;
    Ok(Json(logs))
}

pub async fn reconcile_pending(State(state): State<AppState>) -> Result<Json<ReconcileSummary>> {
    let summary = sync_service(&state).reconcile_pending().await?;
    Ok(Json(summary))
}
