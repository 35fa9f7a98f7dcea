use crate::AppState;
use crate::build_store::PluginScan;
use crate::error::ApiError;
use crate::error::ApiResult;
use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use forge_core::validate_build_id;
use forge_protocol::api::PluginDetailResponse;
use forge_protocol::api::PluginListResponse;
use std::sync::Arc;

pub(crate) async fn list_plugins(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<PluginListResponse>> {
    let store = state.store.clone();
    let plugins = tokio::task::spawn_blocking(move || store.list_plugins())
        .await
        .map_err(|err| ApiError::internal("Failed to list plugins", err))??;
    Ok(Json(PluginListResponse {
        success: true,
        plugins,
    }))
}

pub(crate) async fn plugin_details(
    State(state): State<Arc<AppState>>,
    Path(build_id): Path<String>,
) -> ApiResult<Json<PluginDetailResponse>> {
    validate_build_id(&build_id)?;
    let store = state.store.clone();
    let id = build_id.clone();
    let PluginScan { summary, files } = tokio::task::spawn_blocking(move || store.plugin_details(&id))
        .await
        .map_err(|err| ApiError::internal("Failed to read plugin", err))??
        .ok_or_else(|| ApiError::NotFound(format!("Plugin {build_id} not found")))?;
    Ok(Json(PluginDetailResponse {
        success: true,
        plugin: summary,
        files,
    }))
}
