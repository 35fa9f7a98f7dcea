//! HTTP surface of the plugin forge.

mod auth;
pub mod build_store;
mod builds;
mod create;
pub mod error;
mod fix;
mod plugins;

use crate::build_store::BuildStore;
use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use forge_core::Forge;
use forge_core::ForgeConfig;
use forge_core::RemoteModel;
use forge_core::compiler::MavenCompiler;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Fix requests carry whole projects.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared by every request handler.
pub struct AppState {
    forge: Forge,
    store: BuildStore,
    api_key: Option<String>,
}

impl AppState {
    pub fn new(forge: Forge, api_key: Option<String>) -> Self {
        let store = BuildStore::new(forge.plugins_root());
        Self {
            forge,
            store,
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }

    pub(crate) fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/create", post(create::create_plugin))
        .route("/fix", post(fix::fix_plugin))
        .route("/build/status/{build_id}", get(builds::build_status))
        .route("/build/download/{build_id}", get(builds::download))
        .route("/plugins", get(plugins::list_plugins))
        .route("/plugins/{build_id}", get(plugins::plugin_details))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_bearer,
        ));
    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Installs the stderr subscriber. `RUST_LOG` controls the level
/// (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    let _ = tracing_subscriber::registry().with(stderr_fmt).try_init();
}

/// Serves the API on `config.bind` until Ctrl-C.
pub async fn run_main(config: ForgeConfig) -> anyhow::Result<()> {
    init_tracing();

    let model = RemoteModel::from_settings(&config.model)?;
    if config.model.api_key.is_none() {
        tracing::warn!("no model API key configured; generation will fall back to templates");
    }
    let compiler = MavenCompiler::new(&config.maven_bin, config.compile_timeout());
    let forge = Forge::new(&config, Arc::new(model), Arc::new(compiler));
    tokio::fs::create_dir_all(forge.plugins_root()).await?;

    if config.api_key.as_deref().is_none_or(str::is_empty) {
        tracing::warn!("no API key configured; /api routes accept unauthenticated requests");
    }
    let state = Arc::new(AppState::new(forge, config.api_key.clone()));

    let listener = TcpListener::bind(&config.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        plugins_dir = %config.plugins_dir.display(),
        "plugin forge listening"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("plugin forge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
