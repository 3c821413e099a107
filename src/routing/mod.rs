//! Backend selection: maps a model name and mode flags onto one fixed call path.
//!
//! Hosted-API selection walks [`HOSTED_BINDINGS`] in declaration order and takes the
//! first entry whose marker is a (case-sensitive) substring of the model name. The order
//! is part of the contract: `qwen` (DashScope) precedes the self-hosted `Qwen…-VL`
//! entries, and `meta-llama/Llama-3.2-90B-Vision-Instruct` precedes the broader
//! `90b-vision-instruct` (Fireworks) marker. Local and cloud-gated modes each have a
//! single binding that accepts any non-empty model name.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Error, ErrorContext};
use crate::structured::{JsonMode, PlanSchema, TaskDomain};

/// How the model is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Model served on this machine behind an OpenAI-compatible endpoint
    Local,
    /// Vendor or self-hosted HTTP API chosen by model-name marker
    HostedApi,
    /// Azure OpenAI deployment behind Azure AD token issuance
    CloudGated,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Local => "local",
            ExecutionMode::HostedApi => "remote",
            ExecutionMode::CloudGated => "azure_openai",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" | "qwen_instruct" => Ok(ExecutionMode::Local),
            "remote" | "hosted" | "" => Ok(ExecutionMode::HostedApi),
            "azure_openai" | "azure" | "cloud" => Ok(ExecutionMode::CloudGated),
            other => Err(Error::configuration_with_context(
                format!("unknown model_type '{}'", other),
                ErrorContext::new()
                    .with_field_path("model_type")
                    .with_details("expected one of: remote, local, azure_openai")
                    .with_source("routing"),
            )),
        }
    }
}

/// Wire protocol spoken by the call path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiStyle {
    /// `POST {base}/chat/completions`
    OpenAiChat,
    /// `POST {base}/messages`
    AnthropicMessages,
    /// `POST {endpoint}/openai/deployments/{model}/chat/completions?api-version=…`
    AzureOpenAi,
}

/// Where the base URL comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseUrl {
    /// Vendor URL, overridable by an env var
    Vendor {
        default: &'static str,
        env: Option<&'static str>,
    },
    /// Self-hosted server given by `remote_url`
    Remote,
    /// Local serving process (`LOCAL_MODEL_URL`)
    Local,
    /// Azure OpenAI endpoint (`AZURE_OPENAI_ENDPOINT`)
    Azure,
}

/// How requests are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    None,
    /// `Authorization: Bearer $VAR`
    Bearer { env: &'static str },
    /// `x-api-key: $VAR`
    AnthropicKey { env: &'static str },
    /// Azure AD bearer token from the credential chain
    AzureAd,
}

impl AuthScheme {
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            AuthScheme::Bearer { env } | AuthScheme::AnthropicKey { env } => Some(env),
            AuthScheme::None | AuthScheme::AzureAd => None,
        }
    }
}

/// Immutable call-path descriptor. The table of these is fixed configuration data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendBinding {
    /// Call-path name, used in logs and errors
    pub name: &'static str,
    /// Substring predicate; `None` for the mode-wide bindings
    pub marker: Option<&'static str>,
    pub mode: ExecutionMode,
    pub style: ApiStyle,
    pub base_url: BaseUrl,
    pub auth: AuthScheme,
    pub json_mode: JsonMode,
    /// Send `strict: true` with the schema
    pub strict_schema: bool,
    /// Provider-side model id replacing the caller's model name
    pub model_override: Option<&'static str>,
    pub send_max_tokens: bool,
}

const fn hosted(
    name: &'static str,
    marker: &'static str,
    style: ApiStyle,
    base_url: BaseUrl,
    auth: AuthScheme,
    json_mode: JsonMode,
) -> BackendBinding {
    BackendBinding {
        name,
        marker: Some(marker),
        mode: ExecutionMode::HostedApi,
        style,
        base_url,
        auth,
        json_mode,
        strict_schema: false,
        model_override: None,
        send_max_tokens: true,
    }
}

const OPENAI_URL: BaseUrl = BaseUrl::Vendor {
    default: "https://api.openai.com/v1",
    env: Some("OPENAI_BASE_URL"),
};

/// Hosted-API bindings, in match order.
pub static HOSTED_BINDINGS: [BackendBinding; 12] = [
    hosted(
        "claude",
        "claude",
        ApiStyle::AnthropicMessages,
        BaseUrl::Vendor {
            default: "https://api.anthropic.com/v1",
            env: Some("ANTHROPIC_BASE_URL"),
        },
        AuthScheme::AnthropicKey {
            env: "ANTHROPIC_API_KEY",
        },
        JsonMode::Off,
    ),
    BackendBinding {
        strict_schema: true,
        ..hosted(
            "gemini",
            "gemini",
            ApiStyle::OpenAiChat,
            BaseUrl::Vendor {
                default: "https://generativelanguage.googleapis.com/v1beta/openai",
                env: None,
            },
            AuthScheme::Bearer {
                env: "GEMINI_API_KEY",
            },
            JsonMode::JsonSchema,
        )
    },
    hosted(
        "openai",
        "gpt",
        ApiStyle::OpenAiChat,
        OPENAI_URL,
        AuthScheme::Bearer {
            env: "OPENAI_API_KEY",
        },
        JsonMode::JsonSchema,
    ),
    hosted(
        "dashscope",
        "qwen",
        ApiStyle::OpenAiChat,
        BaseUrl::Vendor {
            default: "https://dashscope.aliyuncs.com/compatible-mode/v1",
            env: None,
        },
        AuthScheme::Bearer {
            env: "DASHSCOPE_API_KEY",
        },
        JsonMode::JsonSchema,
    ),
    hosted(
        "qwen-vl-7b",
        "Qwen2-VL-7B-Instruct",
        ApiStyle::OpenAiChat,
        BaseUrl::Remote,
        AuthScheme::None,
        JsonMode::JsonSchema,
    ),
    hosted(
        "qwen-vl-7b",
        "Qwen2.5-VL-7B-Instruct",
        ApiStyle::OpenAiChat,
        BaseUrl::Remote,
        AuthScheme::None,
        JsonMode::JsonSchema,
    ),
    hosted(
        "qwen-vl-72b",
        "Qwen2-VL-72B-Instruct",
        ApiStyle::OpenAiChat,
        BaseUrl::Remote,
        AuthScheme::None,
        JsonMode::JsonSchema,
    ),
    hosted(
        "qwen-vl-72b",
        "Qwen2.5-VL-72B-Instruct",
        ApiStyle::OpenAiChat,
        BaseUrl::Remote,
        AuthScheme::None,
        JsonMode::JsonSchema,
    ),
    hosted(
        "llama-11b",
        "Llama-3.2-11B-Vision-Instruct",
        ApiStyle::OpenAiChat,
        BaseUrl::Remote,
        AuthScheme::None,
        JsonMode::JsonSchema,
    ),
    hosted(
        "llama-90b-self-hosted",
        "meta-llama/Llama-3.2-90B-Vision-Instruct",
        ApiStyle::OpenAiChat,
        BaseUrl::Remote,
        AuthScheme::None,
        JsonMode::JsonSchema,
    ),
    BackendBinding {
        model_override: Some("accounts/fireworks/models/llama-v3p2-90b-vision-instruct"),
        send_max_tokens: false,
        ..hosted(
            "fireworks",
            "90b-vision-instruct",
            ApiStyle::OpenAiChat,
            BaseUrl::Vendor {
                default: "https://api.fireworks.ai/inference/v1",
                env: None,
            },
            AuthScheme::Bearer {
                env: "firework_API_KEY",
            },
            JsonMode::Json,
        )
    },
    // lmdeploy only honours json_schema on its pytorch backend, so nothing is sent
    hosted(
        "internvl",
        "OpenGVLab/InternVL",
        ApiStyle::OpenAiChat,
        BaseUrl::Remote,
        AuthScheme::None,
        JsonMode::Off,
    ),
];

pub static LOCAL_BINDING: BackendBinding = BackendBinding {
    name: "local",
    marker: None,
    mode: ExecutionMode::Local,
    style: ApiStyle::OpenAiChat,
    base_url: BaseUrl::Local,
    auth: AuthScheme::None,
    json_mode: JsonMode::JsonSchema,
    strict_schema: false,
    model_override: None,
    send_max_tokens: true,
};

pub static AZURE_BINDING: BackendBinding = BackendBinding {
    name: "azure_openai",
    marker: None,
    mode: ExecutionMode::CloudGated,
    style: ApiStyle::AzureOpenAi,
    base_url: BaseUrl::Azure,
    auth: AuthScheme::AzureAd,
    json_mode: JsonMode::JsonSchema,
    strict_schema: false,
    model_override: None,
    send_max_tokens: true,
};

/// Model families that only accept one sampling temperature.
pub const FIXED_TEMPERATURE_FAMILIES: &[(&str, f64)] = &[("o3", 1.0)];

/// Temperature actually sent for `model`, given what the caller asked for.
pub fn effective_temperature(model: &str, requested: f64) -> f64 {
    FIXED_TEMPERATURE_FAMILIES
        .iter()
        .find(|(marker, _)| model.contains(marker))
        .map(|(_, fixed)| *fixed)
        .unwrap_or(requested)
}

/// Flags accompanying the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeFlags {
    pub mode: ExecutionMode,
    pub language_only: bool,
    pub domain: TaskDomain,
}

impl ModeFlags {
    pub fn new(mode: ExecutionMode, language_only: bool, domain: TaskDomain) -> Self {
        Self {
            mode,
            language_only,
            domain,
        }
    }

    pub fn plan_schema(&self) -> PlanSchema {
        PlanSchema::new(self.language_only, self.domain)
    }
}

/// Result of selection: the bound call path plus the schema variant it will request.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub binding: &'static BackendBinding,
    pub model_name: String,
    pub plan: PlanSchema,
    pub language_only: bool,
}

impl Selection {
    /// Model id sent on the wire.
    pub fn wire_model(&self) -> &str {
        self.binding.model_override.unwrap_or(&self.model_name)
    }
}

/// Pick the call path for `model_name`.
pub fn select(model_name: &str, flags: ModeFlags) -> Result<Selection, Error> {
    if model_name.trim().is_empty() {
        return Err(Error::unsupported_model(model_name).with_hint("model_name must not be empty"));
    }

    let binding = match flags.mode {
        ExecutionMode::Local => &LOCAL_BINDING,
        ExecutionMode::CloudGated => &AZURE_BINDING,
        ExecutionMode::HostedApi => HOSTED_BINDINGS
            .iter()
            .find(|b| b.marker.map(|m| model_name.contains(m)).unwrap_or(false))
            .ok_or_else(|| {
                Error::unsupported_model(model_name).with_hint(format!(
                    "hosted model names must contain one of: {}",
                    hosted_markers().join(", ")
                ))
            })?,
    };

    debug!(
        model = model_name,
        binding = binding.name,
        mode = %flags.mode,
        schema = flags.plan_schema().label(),
        "selected backend binding"
    );

    Ok(Selection {
        binding,
        model_name: model_name.to_string(),
        plan: flags.plan_schema(),
        language_only: flags.language_only,
    })
}

pub fn hosted_markers() -> Vec<&'static str> {
    HOSTED_BINDINGS.iter().filter_map(|b| b.marker).collect()
}

/// Every binding in match order (hosted first), for listings.
pub fn all_bindings() -> Vec<&'static BackendBinding> {
    HOSTED_BINDINGS
        .iter()
        .chain(std::iter::once(&LOCAL_BINDING))
        .chain(std::iter::once(&AZURE_BINDING))
        .collect()
}
