use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http {status}: {body:?}")]
    Http {
        status: StatusCode,
        url: Option<String>,
        body: Option<String>,
    },
    #[error("retry limit reached after {attempts} attempts")]
    RetryLimit { attempts: u64 },
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("request build error: {0}")]
    Build(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to decode model response: {0}")]
    Decode(String),
    #[error("model returned no text")]
    EmptyResponse,
    #[error("model blocked the prompt: {0}")]
    Blocked(String),
}
