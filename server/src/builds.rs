use crate::AppState;
use crate::build_store::jar_file_name;
use crate::error::ApiError;
use crate::error::ApiResult;
use axum::Json;
use axum::body::Body;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::header::CONTENT_LENGTH;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use forge_core::validate_build_id;
use forge_protocol::api::BuildStatusResponse;
use forge_protocol::build::BuildStatus;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

pub(crate) async fn build_status(
    State(state): State<Arc<AppState>>,
    Path(build_id): Path<String>,
) -> ApiResult<Json<BuildStatusResponse>> {
    validate_build_id(&build_id)?;
    let record = state
        .store
        .read_record(&build_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Build {build_id} not found")))?;

    let jar_file = record.jar_path.as_deref().and_then(jar_file_name);
    let download_url = (record.status == BuildStatus::Completed && jar_file.is_some())
        .then(|| format!("/api/build/download/{build_id}"));
    Ok(Json(BuildStatusResponse {
        status: record.status,
        jar_file,
        plugin_name: record.plugin_name.unwrap_or_default(),
        download_url,
        message: record.message,
    }))
}

pub(crate) async fn download(
    State(state): State<Arc<AppState>>,
    Path(build_id): Path<String>,
) -> ApiResult<Response> {
    validate_build_id(&build_id)?;
    let not_found = || ApiError::NotFound(format!("No artifact for build {build_id}"));
    let jar = state.store.artifact(&build_id).await?.ok_or_else(not_found)?;
    let file_name = jar_file_name(&jar).ok_or_else(not_found)?;
    let file = tokio::fs::File::open(&jar)
        .await
        .map_err(|err| ApiError::internal("Failed to open artifact", err))?;
    let length = file
        .metadata()
        .await
        .map_err(|err| ApiError::internal("Failed to open artifact", err))?
        .len();
    tracing::info!(build_id, file_name, length, "serving artifact");

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .map_err(|err| ApiError::internal("Invalid artifact name", err))?;
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (CONTENT_DISPOSITION, disposition),
            (CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        body,
    )
        .into_response())
}
