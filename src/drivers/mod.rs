//! Provider drivers: per-API-style request building and response extraction.
//!
//! Drivers are pure: they turn a [`ModelRequest`] plus call parameters into a
//! [`DriverRequest`] and pull the text payload out of a provider response body. All I/O
//! lives in [`crate::transport`], which keeps every wire shape testable without a server.

pub mod anthropic;

use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::Error;
use crate::routing::ApiStyle;
use crate::types::message::{ContentPart, Message, MessageContent, ModelRequest};

pub use anthropic::AnthropicDriver;

/// Unified HTTP request representation for provider communication.
#[derive(Debug, Clone)]
pub struct DriverRequest {
    /// Path appended to the binding's base URL.
    pub path: String,
    /// Query parameters (Azure `api-version`).
    pub query: Vec<(String, String)>,
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// Serialized JSON request body.
    pub body: Value,
}

/// Unified chat response from provider.
#[derive(Debug, Clone)]
pub struct DriverResponse {
    /// Extracted text content.
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageInfo>,
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Everything about one call that is not the message list.
#[derive(Debug, Clone, PartialEq)]
pub struct CallParams<'a> {
    pub model: &'a str,
    /// Already adjusted for fixed-temperature families.
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// `response_format` value, if the binding sends one.
    pub response_format: Option<Value>,
    /// Strip image parts before serialization.
    pub language_only: bool,
}

/// Provider-specific API adaptation.
pub trait ProviderDriver: Send + Sync + std::fmt::Debug {
    /// Identifier used in logs and `BackendCall` errors.
    fn provider_id(&self) -> &str;

    fn api_style(&self) -> ApiStyle;

    fn build_request(&self, request: &ModelRequest, params: &CallParams<'_>) -> Result<DriverRequest, Error>;

    fn parse_response(&self, body: &Value) -> Result<DriverResponse, Error>;
}

/// Turns that will actually be sent: images dropped in language-only mode.
pub(crate) fn effective_messages(request: &ModelRequest, language_only: bool) -> Vec<Message> {
    request
        .messages()
        .iter()
        .map(|m| if language_only { m.without_images() } else { m.clone() })
        .collect()
}

/// OpenAI chat-completions driver. Also covers Gemini's, DashScope's and Fireworks'
/// compatibility endpoints, self-hosted vLLM/lmdeploy servers, and Azure deployments.
#[derive(Debug)]
pub struct OpenAiDriver {
    provider_id: String,
    azure_api_version: Option<String>,
}

impl OpenAiDriver {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            azure_api_version: None,
        }
    }

    /// Azure flavour: deployment-scoped path plus `api-version` query.
    pub fn azure(provider_id: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            azure_api_version: Some(api_version.into()),
        }
    }

    fn message_to_wire(m: &Message) -> Result<Value, Error> {
        let content = match &m.content {
            MessageContent::Text(s) => Value::String(s.clone()),
            MessageContent::Parts(parts) => {
                let mut out = Vec::with_capacity(parts.len());
                for part in parts {
                    out.push(match part {
                        ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                        ContentPart::Image { image } => json!({
                            "type": "image_url",
                            "image_url": { "url": image.resolve()?.to_url() },
                        }),
                    });
                }
                Value::Array(out)
            }
        };
        Ok(json!({ "role": m.role.as_str(), "content": content }))
    }
}

impl ProviderDriver for OpenAiDriver {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn api_style(&self) -> ApiStyle {
        if self.azure_api_version.is_some() {
            ApiStyle::AzureOpenAi
        } else {
            ApiStyle::OpenAiChat
        }
    }

    fn build_request(&self, request: &ModelRequest, params: &CallParams<'_>) -> Result<DriverRequest, Error> {
        let messages = effective_messages(request, params.language_only)
            .iter()
            .map(Self::message_to_wire)
            .collect::<Result<Vec<_>, _>>()?;

        let mut body = json!({
            "model": params.model,
            "messages": messages,
            "temperature": params.temperature,
        });
        if let Some(mt) = params.max_tokens {
            body["max_tokens"] = json!(mt);
        }
        if let Some(fmt) = &params.response_format {
            body["response_format"] = fmt.clone();
        }

        let (path, query) = match &self.azure_api_version {
            Some(version) => (
                format!("/openai/deployments/{}/chat/completions", params.model),
                vec![("api-version".to_string(), version.clone())],
            ),
            None => ("/chat/completions".to_string(), Vec::new()),
        };

        Ok(DriverRequest {
            path,
            query,
            headers: HashMap::new(),
            body,
        })
    }

    fn parse_response(&self, body: &Value) -> Result<DriverResponse, Error> {
        // Gemini's structured-parse mode may return the plan as a parsed object
        let content = match body.pointer("/choices/0/message/content") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(v @ Value::Object(_)) => Some(v.to_string()),
            _ => None,
        };
        let finish_reason = body
            .pointer("/choices/0/finish_reason")
            .and_then(|v| v.as_str())
            .map(String::from);
        let usage = body.get("usage").map(|u| UsageInfo {
            prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
        });

        Ok(DriverResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

/// Driver for an API style.
pub fn create_driver(style: ApiStyle, provider_id: &str, azure_api_version: &str) -> Box<dyn ProviderDriver> {
    match style {
        ApiStyle::OpenAiChat => Box::new(OpenAiDriver::new(provider_id)),
        ApiStyle::AzureOpenAi => Box::new(OpenAiDriver::azure(provider_id, azure_api_version)),
        ApiStyle::AnthropicMessages => Box::new(AnthropicDriver::new(provider_id)),
    }
}
