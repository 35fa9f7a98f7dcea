use crate::error::TransportError;
use crate::request::Request;
use crate::request::Response;
use async_trait::async_trait;
use std::time::Instant;
use tracing::Level;
use tracing::enabled;
use tracing::trace;

/// Unary HTTP execution. Implemented by [`ReqwestTransport`] in production and
/// by in-memory stubs in tests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, req: Request) -> Result<Response, TransportError>;
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Builds a fresh `reqwest` client identifying itself as `user_agent`.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|err| TransportError::Build(err.to_string()))?;
        Ok(Self::new(client))
    }

    fn build(&self, req: Request) -> reqwest::RequestBuilder {
        let Request {
            method,
            url,
            headers,
            body,
            timeout,
        } = req;

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        builder
    }

    fn map_error(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        let method = req.method.clone();
        let url = req.url.clone();
        let logged_url = redact_query(&url);
        if enabled!(Level::TRACE) {
            trace!(
                "{method} to {logged_url}: {}",
                req.body.as_ref().unwrap_or_default()
            );
        }

        let started = Instant::now();
        let resp = match self.build(req).send().await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::debug!(%method, url = %logged_url, error = %err, "request failed");
                return Err(Self::map_error(err));
            }
        };
        let status = resp.status();
        tracing::debug!(
            %method,
            url = %logged_url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis(),
            "request completed"
        );

        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.map_err(Self::map_error)?;
        if !status.is_success() {
            let body = String::from_utf8(bytes.to_vec()).ok();
            return Err(TransportError::Http {
                status,
                url: Some(url),
                body,
            });
        }
        Ok(Response {
            status,
            headers,
            body: bytes,
        })
    }
}

// Query strings may carry credentials; keep them out of the logs.
fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => url.to_string(),
    }
}
