use forge_model_client::ClientError;
use forge_model_client::GenerateClient;
use forge_model_client::Provider;
use forge_model_client::ReqwestTransport;
use forge_model_client::RetryOn;
use forge_model_client::RetryPolicy;
use forge_protocol::models::SamplingParams;
use forge_protocol::models::SamplingProfile;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn provider(base_url: &str, max_attempts: u64) -> Provider {
    Provider {
        base_url: base_url.to_string(),
        api_key: Some("test-key".to_string()),
        retry: RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            retry_on: RetryOn {
                retry_429: true,
                retry_5xx: true,
                retry_transport: true,
            },
        },
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn generate_hits_model_endpoint_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/fast-model:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "---FILE: a.txt---\nhi\n---END FILE---" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GenerateClient::new(
        ReqwestTransport::new(reqwest::Client::new()),
        provider(&format!("{}/v1beta", server.uri()), 1),
    );
    let text = client
        .generate(
            "fast-model",
            "write a file",
            &SamplingParams::for_profile(SamplingProfile::Precision),
        )
        .await
        .expect("generate should succeed");

    assert_eq!(text, "---FILE: a.txt---\nhi\n---END FILE---");
}

#[tokio::test]
async fn server_errors_are_retried_until_the_budget_runs_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = GenerateClient::new(
        ReqwestTransport::new(reqwest::Client::new()),
        provider(&server.uri(), 3),
    );
    let err = client
        .generate(
            "m",
            "p",
            &SamplingParams::for_profile(SamplingProfile::Creative),
        )
        .await
        .expect_err("all attempts fail");

    assert!(matches!(err, ClientError::Transport(_)), "unexpected: {err:?}");
}
