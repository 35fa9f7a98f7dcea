use crate::AppState;
use crate::build_store::failed_record;
use crate::build_store::outcome_record;
use crate::build_store::pending_record;
use crate::error::ApiError;
use crate::error::ApiResult;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use forge_core::CreateOutcome;
use forge_core::new_build_id;
use forge_core::validate_build_id;
use forge_protocol::api::CreatePluginRequest;
use forge_protocol::api::CreatePluginResponse;
use forge_protocol::api::PendingBuildResponse;
use forge_protocol::build::BuildStatus;
use std::sync::Arc;
use std::time::Instant;

pub(crate) async fn create_plugin(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreatePluginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let prompt = request
        .prompt
        .filter(|prompt| !prompt.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Prompt is required".to_string()))?;
    let build_id = request.build_id.unwrap_or_else(new_build_id);
    validate_build_id(&build_id)?;

    if request.run_async {
        state.store.write_record(&pending_record(&build_id)).await?;
        tokio::spawn(run_detached(Arc::clone(&state), prompt, request.compile, build_id.clone()));
        let body = PendingBuildResponse {
            status_check_url: format!("/api/build/status/{build_id}"),
            build_id,
            status: BuildStatus::Pending,
        };
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    }

    let started = Instant::now();
    let outcome = state.forge.create(&prompt, request.compile, &build_id).await?;
    state.store.write_record(&outcome_record(&outcome)).await?;
    let processing_time = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    Ok(Json(create_response(outcome, processing_time)).into_response())
}

/// Body of an async create: runs to completion and leaves the verdict in
/// the build's status record.
async fn run_detached(state: Arc<AppState>, prompt: String, compile: bool, build_id: String) {
    let record = match state.forge.create(&prompt, compile, &build_id).await {
        Ok(outcome) => outcome_record(&outcome),
        Err(err) => {
            tracing::error!(build_id, error = %err, "background build failed");
            failed_record(&build_id, err.to_string())
        }
    };
    if let Err(err) = state.store.write_record(&record).await {
        tracing::error!(build_id, error = %err, "failed to record build status");
    }
}

fn create_response(outcome: CreateOutcome, processing_time: u64) -> CreatePluginResponse {
    let files = outcome.tree.paths().map(str::to_string).collect();
    let (success, message, jar_path, build_output, degraded) = match outcome.build {
        None => (
            true,
            "Plugin generated successfully".to_string(),
            None,
            None,
            None,
        ),
        Some(build) => {
            let message = if !build.success {
                format!(
                    "Plugin generated but compilation failed after {} attempts",
                    build.attempts_used
                )
            } else if let Some(warning) = &build.warning {
                warning.clone()
            } else {
                "Plugin generated and compiled successfully".to_string()
            };
            (
                build.success,
                message,
                build.jar_path.map(|path| path.display().to_string()),
                Some(build.build_output),
                Some(build.degraded),
            )
        }
    };
    CreatePluginResponse {
        success,
        message,
        data: outcome.tree,
        files,
        plugin_name: outcome.plugin_name,
        build_id: outcome.build_id,
        jar_path,
        build_output,
        degraded,
        processing_time,
    }
}
