//! Anthropic Messages API driver. Differences from OpenAI:
//! - System turns become the top-level `system` parameter.
//! - Content uses typed blocks; images are `{"type": "image", "source": {...}}`.
//! - The reply text is `content[0].text`.
//! - `max_tokens` is required.

use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::Error;
use crate::routing::ApiStyle;
use crate::types::message::{ContentPart, Message, MessageContent, MessageRole, ModelRequest, ResolvedImage};

use super::{effective_messages, CallParams, DriverRequest, DriverResponse, ProviderDriver, UsageInfo};

const DEFAULT_MAX_TOKENS: u32 = 2048;
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug)]
pub struct AnthropicDriver {
    provider_id: String,
}

impl AnthropicDriver {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
        }
    }

    fn block(part: &ContentPart) -> Result<Value, Error> {
        Ok(match part {
            ContentPart::Text { text } => json!({ "type": "text", "text": text }),
            ContentPart::Image { image } => match image.resolve()? {
                ResolvedImage::Inline { media_type, data } => json!({
                    "type": "image",
                    "source": { "type": "base64", "media_type": media_type, "data": data },
                }),
                ResolvedImage::Url(url) => json!({
                    "type": "image",
                    "source": { "type": "url", "url": url },
                }),
            },
        })
    }

    /// System text and the remaining turns in Anthropic shape.
    fn split_system_messages(messages: &[Message]) -> Result<(Option<String>, Vec<Value>), Error> {
        let mut system_parts: Vec<String> = Vec::new();
        let mut turns: Vec<Value> = Vec::new();

        for m in messages {
            if m.role == MessageRole::System {
                system_parts.push(m.text());
                continue;
            }
            let content = match &m.content {
                MessageContent::Text(s) => json!([{ "type": "text", "text": s }]),
                MessageContent::Parts(parts) => {
                    Value::Array(parts.iter().map(Self::block).collect::<Result<Vec<_>, _>>()?)
                }
            };
            turns.push(json!({ "role": m.role.as_str(), "content": content }));
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        Ok((system, turns))
    }
}

impl ProviderDriver for AnthropicDriver {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn api_style(&self) -> ApiStyle {
        ApiStyle::AnthropicMessages
    }

    fn build_request(&self, request: &ModelRequest, params: &CallParams<'_>) -> Result<DriverRequest, Error> {
        let messages = effective_messages(request, params.language_only);
        let (system, turns) = Self::split_system_messages(&messages)?;

        let mut body = json!({
            "model": params.model,
            "messages": turns,
            "max_tokens": params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": params.temperature,
        });
        if let Some(sys) = system {
            body["system"] = Value::String(sys);
        }

        let mut headers = HashMap::new();
        headers.insert("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string());

        Ok(DriverRequest {
            path: "/messages".to_string(),
            query: Vec::new(),
            headers,
            body,
        })
    }

    fn parse_response(&self, body: &Value) -> Result<DriverResponse, Error> {
        // First text block; tool_use and thinking blocks are skipped
        let content = body
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            })
            .and_then(|b| b.get("text"))
            .and_then(|t| t.as_str())
            .map(String::from);

        let finish_reason = body
            .get("stop_reason")
            .and_then(|v| v.as_str())
            .map(|r| match r {
                "end_turn" => "stop".to_string(),
                "max_tokens" => "length".to_string(),
                other => other.to_string(),
            });

        let usage = body.get("usage").map(|u| UsageInfo {
            prompt_tokens: u["input_tokens"].as_u64().unwrap_or(0),
            completion_tokens: u["output_tokens"].as_u64().unwrap_or(0),
        });

        Ok(DriverResponse {
            content,
            finish_reason,
            usage,
        })
    }
}
