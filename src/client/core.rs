//! The evaluation client: one backend, blocking calls, normalized replies.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};

use crate::auth::BearerTokenProvider;
use crate::drivers::{CallParams, ProviderDriver, UsageInfo};
use crate::error::{Error, ErrorContext};
use crate::routing::{effective_temperature, BackendBinding, Selection};
use crate::structured::Normalizer;
use crate::transport::HttpTransport;
use crate::types::message::ModelRequest;
use crate::Result;

/// How outgoing requests are authenticated.
pub(crate) enum RequestAuth {
    None,
    Bearer(String),
    AnthropicKey(String),
    AzureAd(BearerTokenProvider),
}

impl std::fmt::Debug for RequestAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestAuth::None => f.write_str("None"),
            RequestAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            RequestAuth::AnthropicKey(_) => f.write_str("AnthropicKey(<redacted>)"),
            RequestAuth::AzureAd(p) => f.debug_tuple("AzureAd").field(&p.scope()).finish(),
        }
    }
}

impl RequestAuth {
    fn apply(&self, headers: &mut HashMap<String, String>) -> Result<()> {
        match self {
            RequestAuth::None => {}
            RequestAuth::Bearer(key) => {
                headers.insert("authorization".to_string(), format!("Bearer {}", key));
            }
            RequestAuth::AnthropicKey(key) => {
                headers.insert("x-api-key".to_string(), key.clone());
            }
            RequestAuth::AzureAd(provider) => {
                headers.insert("authorization".to_string(), format!("Bearer {}", provider.token()?));
            }
        }
        Ok(())
    }
}

/// Facts about one completed call.
#[derive(Debug, Clone)]
pub struct CallStats {
    pub model: String,
    pub binding: &'static str,
    pub endpoint: String,
    /// Temperature actually sent
    pub temperature: f64,
    pub http_status: u16,
    pub duration_ms: u128,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageInfo>,
}

/// Client bound to one backend for the lifetime of a run.
///
/// Calls are strictly sequential and blocking. Each call is a single attempt with the
/// configured timeout; failures are returned, never retried.
#[derive(Debug)]
pub struct EvalClient {
    pub(crate) selection: Selection,
    pub(crate) transport: HttpTransport,
    pub(crate) driver: Box<dyn ProviderDriver>,
    pub(crate) auth: RequestAuth,
    pub(crate) normalizer: Normalizer,
    pub(crate) response_format: Option<Value>,
    pub(crate) temperature: f64,
    pub(crate) max_completion_tokens: u32,
}

impl EvalClient {
    /// Build a client straight from a config with default credentials.
    pub fn from_config(config: crate::config::EvalConfig) -> Result<Self> {
        crate::client::builder::EvalClientBuilder::new(config).build()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn binding(&self) -> &'static BackendBinding {
        self.selection.binding
    }

    pub fn model_name(&self) -> &str {
        &self.selection.model_name
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Temperature sent on the wire after fixed-temperature families are applied.
    pub fn effective_temperature(&self) -> f64 {
        effective_temperature(&self.selection.model_name, self.temperature)
    }

    /// The `response_format` value sent with each call, if any.
    pub fn response_format(&self) -> Option<&Value> {
        self.response_format.as_ref()
    }

    /// Send `request` and return the model's raw text reply.
    pub fn respond_raw(&self, request: &ModelRequest) -> Result<String> {
        self.respond_raw_with_stats(request).map(|(text, _)| text)
    }

    /// Send `request` and return the canonical plan JSON.
    pub fn respond(&self, request: &ModelRequest) -> Result<String> {
        let raw = self.respond_raw(request)?;
        self.normalizer.normalize(&raw)
    }

    /// Like [`respond`](Self::respond) but returns the parsed plan.
    pub fn respond_value(&self, request: &ModelRequest) -> Result<Value> {
        let raw = self.respond_raw(request)?;
        self.normalizer.normalize_value(&raw)
    }

    pub fn respond_raw_with_stats(&self, request: &ModelRequest) -> Result<(String, CallStats)> {
        if request.is_empty() {
            return Err(Error::configuration_with_context(
                "request has no messages",
                ErrorContext::new().with_source("eval_client"),
            ));
        }

        let binding = self.selection.binding;
        let temperature = self.effective_temperature();
        if temperature != self.temperature {
            info!(
                model = self.selection.model_name.as_str(),
                requested = self.temperature,
                sent = temperature,
                "model family accepts a fixed temperature; overriding"
            );
        }

        let params = CallParams {
            model: self.selection.wire_model(),
            temperature,
            max_tokens: binding.send_max_tokens.then_some(self.max_completion_tokens),
            response_format: self.response_format.clone(),
            language_only: self.selection.language_only,
        };
        let built = self.driver.build_request(request, &params)?;
        let mut headers = built.headers;
        self.auth.apply(&mut headers)?;

        let start = Instant::now();
        let (http_status, body) = match self.transport.post_json(
            self.driver.provider_id(),
            &built.path,
            &built.query,
            &headers,
            &built.body,
        ) {
            Ok(reply) => reply,
            Err(e) => {
                let status = match &e {
                    Error::BackendCall { status, .. } => *status,
                    _ => None,
                };
                warn!(
                    model = self.selection.model_name.as_str(),
                    binding = binding.name,
                    endpoint = built.path.as_str(),
                    http_status = ?status,
                    duration_ms = start.elapsed().as_millis(),
                    error = %e,
                    "model call failed"
                );
                return Err(e);
            }
        };

        let parsed = self.driver.parse_response(&body)?;
        let content = parsed
            .content
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                Error::backend(
                    self.driver.provider_id(),
                    None,
                    format!(
                        "response carried no text content (finish_reason: {})",
                        parsed.finish_reason.as_deref().unwrap_or("none")
                    ),
                )
            })?;

        let stats = CallStats {
            model: params.model.to_string(),
            binding: binding.name,
            endpoint: built.path,
            temperature,
            http_status,
            duration_ms: start.elapsed().as_millis(),
            finish_reason: parsed.finish_reason,
            usage: parsed.usage,
        };
        info!(
            model = stats.model.as_str(),
            binding = stats.binding,
            endpoint = stats.endpoint.as_str(),
            http_status = stats.http_status,
            duration_ms = stats.duration_ms,
            finish_reason = stats.finish_reason.as_deref().unwrap_or(""),
            "model call completed"
        );
        Ok((content, stats))
    }
}
