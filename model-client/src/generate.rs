use crate::error::ClientError;
use crate::provider::Provider;
use crate::retry::run_with_retry;
use crate::transport::HttpTransport;
use forge_protocol::models::SamplingParams;
use http::Method;
use serde::Deserialize;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl From<&SamplingParams> for GenerationConfig {
    fn from(params: &SamplingParams) -> Self {
        Self {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_output_tokens: params.max_output_tokens,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Client for a `models/{model}:generateContent` endpoint.
pub struct GenerateClient<T: HttpTransport> {
    transport: T,
    provider: Provider,
}

impl<T: HttpTransport> GenerateClient<T> {
    pub fn new(transport: T, provider: Provider) -> Self {
        Self {
            transport,
            provider,
        }
    }

    fn path(model: &str) -> String {
        format!("models/{model}:generateContent")
    }

    /// Sends `prompt` as a single user turn and returns the concatenated text
    /// of the first candidate.
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        sampling: &SamplingParams,
    ) -> Result<String, ClientError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig::from(sampling),
        };
        let path = Self::path(model);
        let make_request = || {
            self.provider
                .build_request(Method::POST, &path)
                .with_json(&body)
        };

        let resp = run_with_retry(&self.provider.retry, make_request, |req| {
            self.transport.execute(req)
        })
        .await?;

        let parsed: GenerateContentResponse = resp
            .json()
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone())
        {
            return Err(ClientError::Blocked(reason));
        }

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ClientError::EmptyResponse);
        }
        tracing::debug!(model, response_len = text.len(), "model response received");
        Ok(text)
    }
}
