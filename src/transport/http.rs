//! `reqwest`-backed transport: one client per run, JSON in and JSON out.

use reqwest::blocking::Client;
use reqwest::Proxy;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use url::Url;

use crate::error::{Error, ErrorContext};
use crate::Result;

/// Used when neither the config nor `EVAL_HTTP_TIMEOUT_SECS` sets a timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Correlation header sent with every call.
pub const REQUEST_ID_HEADER: &str = "x-embodied-eval-request-id";

/// Settings shared by every backend. The timeout is applied uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub proxy_url: Option<String>,
}

impl TransportConfig {
    /// Explicit timeout, else `EVAL_HTTP_TIMEOUT_SECS`, else the default.
    pub fn from_env(timeout_secs: Option<u64>) -> Self {
        let secs = timeout_secs
            .or_else(|| {
                env::var("EVAL_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
            })
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self {
            timeout: Duration::from_secs(secs),
            proxy_url: env::var("EVAL_PROXY_URL").ok().filter(|s| !s.is_empty()),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy_url: None,
        }
    }
}

/// Blocking JSON-over-HTTP transport bound to one base URL.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, config: &TransportConfig) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL '{}': {}", base_url, e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("http_transport"),
            )
        })?;

        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(proxy_url) = &config.proxy_url {
            match Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => tracing::warn!(proxy = proxy_url.as_str(), error = %e, "ignoring invalid proxy URL"),
            }
        }

        let client = builder.build().map_err(TransportError::Http)?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Full URL for `path`, keeping any path segments already in the base URL.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// POST a JSON body and return the status with the parsed JSON response.
    ///
    /// Non-2xx statuses and connection failures become `Error::BackendCall`
    /// tagged with `backend`. There is no retry.
    pub fn post_json(
        &self,
        backend: &str,
        path: &str,
        query: &[(String, String)],
        headers: &HashMap<String, String>,
        body: &Value,
    ) -> Result<(u16, Value)> {
        let url = self.url_for(path);
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut req = self
            .client
            .post(&url)
            .json(body)
            .header(REQUEST_ID_HEADER, &request_id);
        if !query.is_empty() {
            req = req.query(query);
        }
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = req.send().map_err(|e| {
            let kind = if e.is_timeout() { "timed out" } else { "request failed" };
            Error::backend(backend, None, format!("{} ({}): {}", kind, url, e))
        })?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| Error::backend(backend, Some(status.as_u16()), format!("reading body: {}", e)))?;

        if !status.is_success() {
            return Err(Error::backend(backend, Some(status.as_u16()), text));
        }

        let value = serde_json::from_str(&text).map_err(|e| {
            Error::backend(
                backend,
                Some(status.as_u16()),
                format!("response is not JSON ({}): {}", e, text.chars().take(200).collect::<String>()),
            )
        })?;
        Ok((status.as_u16(), value))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_keeps_base_path() {
        let t = HttpTransport::new("https://api.openai.com/v1/", &TransportConfig::default()).unwrap();
        assert_eq!(t.url_for("/chat/completions"), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_invalid_base_url_is_configuration_error() {
        let err = HttpTransport::new("not a url", &TransportConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_explicit_timeout_wins() {
        let cfg = TransportConfig::from_env(Some(7));
        assert_eq!(cfg.timeout, Duration::from_secs(7));
    }
}
