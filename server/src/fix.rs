use crate::AppState;
use crate::error::ApiError;
use crate::error::ApiResult;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use forge_core::generation::DEFAULT_PLUGIN_NAME;
use forge_core::normalize::MANIFEST_PATH;
use forge_core::normalize::manifest_value;
use forge_protocol::FileTree;
use forge_protocol::api::FixPluginRequest;
use forge_protocol::api::FixPluginResponse;
use std::sync::Arc;

pub(crate) async fn fix_plugin(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FixPluginRequest>, JsonRejection>,
) -> ApiResult<Json<FixPluginResponse>> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let build_errors = request
        .build_errors
        .filter(|errors| !errors.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("buildErrors is required".to_string()))?;
    let files = request
        .files
        .filter(|files| !files.is_empty())
        .ok_or_else(|| ApiError::BadRequest("files must name at least one file".to_string()))?;
    let plugin_name = request
        .plugin_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| plugin_name_of(&files));

    let outcome = state.forge.fix(&build_errors, &files, &plugin_name).await?;
    let changed_files = outcome.changed_files;
    let (success, message) = if changed_files > 0 {
        (true, format!("Applied fixes to {changed_files} files"))
    } else {
        (false, "The model did not change any files".to_string())
    };
    Ok(Json(FixPluginResponse {
        success,
        message,
        data: outcome.tree,
        changed_files,
    }))
}

fn plugin_name_of(files: &FileTree) -> String {
    files
        .get(MANIFEST_PATH)
        .and_then(|manifest| manifest_value(manifest, "name"))
        .map_or_else(|| DEFAULT_PLUGIN_NAME.to_string(), str::to_string)
}
