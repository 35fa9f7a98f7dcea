use crate::request::Request;
use crate::retry::RetryPolicy;
use http::HeaderValue;
use http::Method;
use http::header::HeaderMap;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP endpoint configuration for a generateContent-style model API.
#[derive(Debug, Clone)]
pub struct Provider {
    pub base_url: String,
    pub api_key: Option<String>,
    pub retry: RetryPolicy,
    /// Wall-clock bound for a single HTTP exchange.
    pub request_timeout: Duration,
}

impl Provider {
    pub fn url_for_path(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    /// Budget for one logical call: every attempt may run to its request
    /// timeout, plus the backoff between attempts.
    pub fn call_deadline(&self) -> Duration {
        let attempts = u32::try_from(self.retry.max_attempts.max(1)).unwrap_or(u32::MAX);
        self.request_timeout
            .saturating_mul(attempts)
            .saturating_add(self.retry.max_total_backoff())
    }

    pub fn build_request(&self, method: Method, path: &str) -> Request {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = self.api_key.as_deref()
            && let Ok(value) = HeaderValue::from_str(api_key)
        {
            headers.insert(API_KEY_HEADER, value);
        }
        Request {
            method,
            url: self.url_for_path(path),
            headers,
            body: None,
            timeout: Some(self.request_timeout),
        }
    }
}
