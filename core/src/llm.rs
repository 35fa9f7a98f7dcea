use crate::config::ModelSettings;
use crate::error::ModelError;
use async_trait::async_trait;
use forge_model_client::GenerateClient;
use forge_model_client::HttpTransport;
use forge_model_client::Provider;
use forge_model_client::ReqwestTransport;
use forge_model_client::RetryPolicy;
use forge_model_client::TransportError;
use forge_protocol::models::ModelConfig;
use std::time::Duration;

/// A text-in, text-out language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, model: &ModelConfig) -> Result<String, ModelError>;
}

/// [`LanguageModel`] backed by a `generateContent` HTTP endpoint, with an
/// overall deadline per call that leaves room for every retry.
pub struct RemoteModel<T: HttpTransport> {
    client: GenerateClient<T>,
    timeout: Duration,
}

impl<T: HttpTransport> RemoteModel<T> {
    pub fn new(client: GenerateClient<T>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl RemoteModel<ReqwestTransport> {
    /// HTTP-backed model configured from `[model]` settings.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::with_user_agent(concat!(
            "plugin-forge/",
            env!("CARGO_PKG_VERSION")
        ))?;
        let provider = Provider {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            retry: RetryPolicy {
                max_attempts: settings.max_attempts,
                base_delay: Duration::from_millis(settings.retry_base_delay_ms),
                ..RetryPolicy::default()
            },
            request_timeout: settings.timeout(),
        };
        let deadline = provider.call_deadline();
        Ok(Self::new(GenerateClient::new(transport, provider), deadline))
    }
}

#[async_trait]
impl<T: HttpTransport> LanguageModel for RemoteModel<T> {
    async fn generate(&self, prompt: &str, model: &ModelConfig) -> Result<String, ModelError> {
        tracing::debug!(
            model = %model.model,
            tier = %model.tier,
            profile = %model.profile,
            prompt_len = prompt.len(),
            "calling model"
        );
        let call = self.client.generate(&model.model, prompt, &model.sampling);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) if text.trim().is_empty() => Err(ModelError::Empty),
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(ModelError::Timeout(self.timeout)),
        }
    }
}
