#![allow(dead_code)]

use forge_core::Forge;
use forge_core::ForgeConfig;
use forge_core::LanguageModel;
use forge_core::compiler::Compiler;
use forge_server::AppState;
use forge_server::router;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const API_KEY: &str = "test-key";

/// The forge router served on an ephemeral port over a scratch plugins root.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    root: TempDir,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(
        model: Arc<dyn LanguageModel>,
        compiler: Arc<dyn Compiler>,
        api_key: Option<&str>,
    ) -> anyhow::Result<Self> {
        let root = TempDir::new()?;
        let config = ForgeConfig {
            plugins_dir: root.path().to_path_buf(),
            consistency_check: false,
            api_key: api_key.map(str::to_string),
            ..ForgeConfig::default()
        };
        let forge = Forge::new(&config, model, compiler);
        let state = Arc::new(AppState::new(forge, config.api_key.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });
        Ok(Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            root,
            handle,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(API_KEY)
    }

    pub fn post(&self, path: &str, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(API_KEY).json(body)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
