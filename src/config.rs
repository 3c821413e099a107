//! Run configuration: which model, how it is reached, and the sampling settings.
//!
//! Loaded from YAML. Credentials and endpoints not present in the file are read from the
//! environment when the client is built.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorContext};
use crate::routing::{BackendBinding, BaseUrl, ExecutionMode, ModeFlags};
use crate::structured::TaskDomain;
use crate::Result;

pub const DEFAULT_LOCAL_MODEL_URL: &str = "http://localhost:23333/v1";
pub const DEFAULT_AZURE_ENDPOINT: &str = "https://trapi.research.microsoft.com/gcr/shared";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-12-01-preview";
pub const DEFAULT_AZURE_SCOPE: &str = "api://trapi/.default";
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 2048;

fn default_model_type() -> String {
    "remote".to_string()
}

fn default_max_completion_tokens() -> u32 {
    DEFAULT_MAX_COMPLETION_TOKENS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    pub model_name: String,
    /// `remote`, `local` or `azure_openai`
    #[serde(default = "default_model_type")]
    pub model_type: String,
    #[serde(default)]
    pub language_only: bool,
    /// `manip` selects the manipulation schemas
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Check normalized replies against the plan schema
    #[serde(default)]
    pub validate_schema: bool,

    /// Replaces the binding's base URL, whatever its kind
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub local_url: Option<String>,
    #[serde(default)]
    pub azure_endpoint: Option<String>,
    #[serde(default)]
    pub azure_api_version: Option<String>,
    #[serde(default)]
    pub azure_scope: Option<String>,
    /// Used instead of the binding's API key variable
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl EvalConfig {
    /// Config with defaults for everything but the model.
    pub fn new(model_name: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            model_name: model_name.into(),
            model_type: mode.as_str().to_string(),
            language_only: false,
            task_type: None,
            temperature: 0.0,
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            timeout_secs: None,
            validate_schema: false,
            base_url: None,
            remote_url: None,
            local_url: None,
            azure_endpoint: None,
            azure_api_version: None,
            azure_scope: None,
            api_key: None,
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: EvalConfig = serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid config: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.execution_mode()?;
        if self.max_completion_tokens == 0 {
            return Err(Error::configuration_with_context(
                "max_completion_tokens must be positive",
                ErrorContext::new()
                    .with_field_path("max_completion_tokens")
                    .with_source("config_loader"),
            ));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(Error::configuration_with_context(
                format!("temperature must be a non-negative number, got {}", self.temperature),
                ErrorContext::new()
                    .with_field_path("temperature")
                    .with_source("config_loader"),
            ));
        }
        Ok(())
    }

    pub fn execution_mode(&self) -> Result<ExecutionMode> {
        self.model_type.parse()
    }

    pub fn mode_flags(&self) -> Result<ModeFlags> {
        Ok(ModeFlags::new(
            self.execution_mode()?,
            self.language_only,
            TaskDomain::from_task_type(self.task_type.as_deref()),
        ))
    }

    /// Base URL for `binding`, reading the process environment.
    pub fn resolve_base_url(&self, binding: &BackendBinding) -> Result<String> {
        self.resolve_base_url_with(binding, |k| env::var(k).ok())
    }

    /// Base URL for `binding` with an explicit variable lookup.
    ///
    /// The config's `base_url` wins, then the binding-specific config field, then the
    /// environment, then the built-in default.
    pub fn resolve_base_url_with<F>(&self, binding: &BackendBinding, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = non_empty(self.base_url.clone()) {
            return Ok(url);
        }
        let lookup = |k: &str| non_empty(lookup(k));
        match binding.base_url {
            BaseUrl::Vendor { default, env } => Ok(env
                .and_then(|k| lookup(k))
                .unwrap_or_else(|| default.to_string())),
            BaseUrl::Remote => non_empty(self.remote_url.clone())
                .or_else(|| lookup("remote_url"))
                .or_else(|| lookup("REMOTE_URL"))
                .ok_or_else(|| {
                    Error::configuration_with_context(
                        format!("binding '{}' needs a self-hosted server URL", binding.name),
                        ErrorContext::new()
                            .with_field_path("remote_url")
                            .with_details("set remote_url in the config or the remote_url environment variable")
                            .with_source("config"),
                    )
                }),
            BaseUrl::Local => Ok(non_empty(self.local_url.clone())
                .or_else(|| lookup("LOCAL_MODEL_URL"))
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL_URL.to_string())),
            BaseUrl::Azure => Ok(non_empty(self.azure_endpoint.clone())
                .or_else(|| lookup("AZURE_OPENAI_ENDPOINT"))
                .unwrap_or_else(|| DEFAULT_AZURE_ENDPOINT.to_string())),
        }
    }

    /// API key for `binding`, or `None` when it does not use one.
    pub fn resolve_api_key(&self, binding: &BackendBinding) -> Result<Option<String>> {
        self.resolve_api_key_with(binding, |k| env::var(k).ok())
    }

    pub fn resolve_api_key_with<F>(&self, binding: &BackendBinding, lookup: F) -> Result<Option<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(var) = binding.auth.env_var() else {
            return Ok(None);
        };
        non_empty(self.api_key.clone())
            .or_else(|| non_empty(lookup(var)))
            .map(Some)
            .ok_or_else(|| {
                Error::configuration_with_context(
                    format!("missing API key for binding '{}'", binding.name),
                    ErrorContext::new()
                        .with_field_path(var)
                        .with_details(format!("export {}=...", var))
                        .with_source("config"),
                )
            })
    }

    pub fn resolve_azure_api_version(&self) -> String {
        non_empty(self.azure_api_version.clone())
            .or_else(|| non_empty(env::var("AZURE_OPENAI_API_VERSION").ok()))
            .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string())
    }

    pub fn resolve_azure_scope(&self) -> String {
        non_empty(self.azure_scope.clone())
            .or_else(|| non_empty(env::var("AZURE_OPENAI_SCOPE").ok()))
            .unwrap_or_else(|| DEFAULT_AZURE_SCOPE.to_string())
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{AZURE_BINDING, HOSTED_BINDINGS, LOCAL_BINDING};
    use std::collections::HashMap;

    fn binding(name: &str) -> &'static BackendBinding {
        HOSTED_BINDINGS.iter().find(|b| b.name == name).unwrap()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn test_yaml_defaults() {
        let cfg = EvalConfig::from_yaml_str("model_name: gpt-4o-2024-08-06\n").unwrap();
        assert_eq!(cfg.model_type, "remote");
        assert_eq!(cfg.max_completion_tokens, 2048);
        assert_eq!(cfg.temperature, 0.0);
        assert!(!cfg.language_only);
        assert!(!cfg.validate_schema);
        assert_eq!(cfg.execution_mode().unwrap(), ExecutionMode::HostedApi);
    }

    #[test]
    fn test_yaml_full() {
        let yaml = r#"
model_name: Qwen/Qwen2.5-VL-72B-Instruct
model_type: remote
language_only: false
task_type: manip
temperature: 0.3
timeout_secs: 30
remote_url: http://10.0.0.5:8000/v1
"#;
        let cfg = EvalConfig::from_yaml_str(yaml).unwrap();
        let flags = cfg.mode_flags().unwrap();
        assert_eq!(flags.domain, TaskDomain::Manipulation);
        assert_eq!(cfg.timeout_secs, Some(30));
        assert_eq!(
            cfg.resolve_base_url_with(binding("qwen-vl-72b"), env_of(&[])).unwrap(),
            "http://10.0.0.5:8000/v1"
        );
    }

    #[test]
    fn test_unknown_model_type_rejected() {
        let err = EvalConfig::from_yaml_str("model_name: x\nmodel_type: carrier\n").unwrap_err();
        assert_eq!(err.context().unwrap().field_path.as_deref(), Some("model_type"));
    }

    #[test]
    fn test_missing_model_name_rejected() {
        assert!(matches!(
            EvalConfig::from_yaml_str("model_type: local\n"),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_vendor_url_env_then_default() {
        let cfg = EvalConfig::new("gpt-4o", ExecutionMode::HostedApi);
        let openai = binding("openai");
        assert_eq!(
            cfg.resolve_base_url_with(openai, env_of(&[])).unwrap(),
            "https://api.openai.com/v1"
        );
        assert_eq!(
            cfg.resolve_base_url_with(openai, env_of(&[("OPENAI_BASE_URL", "http://proxy/v1")]))
                .unwrap(),
            "http://proxy/v1"
        );
    }

    #[test]
    fn test_remote_url_required() {
        let cfg = EvalConfig::new("Llama-3.2-11B-Vision-Instruct", ExecutionMode::HostedApi);
        let err = cfg.resolve_base_url_with(binding("llama-11b"), env_of(&[])).unwrap_err();
        assert_eq!(err.context().unwrap().field_path.as_deref(), Some("remote_url"));
        assert_eq!(
            cfg.resolve_base_url_with(binding("llama-11b"), env_of(&[("remote_url", "http://h:1/v1")]))
                .unwrap(),
            "http://h:1/v1"
        );
    }

    #[test]
    fn test_local_and_azure_defaults() {
        let cfg = EvalConfig::new("m", ExecutionMode::Local);
        assert_eq!(cfg.resolve_base_url_with(&LOCAL_BINDING, env_of(&[])).unwrap(), DEFAULT_LOCAL_MODEL_URL);
        assert_eq!(cfg.resolve_base_url_with(&AZURE_BINDING, env_of(&[])).unwrap(), DEFAULT_AZURE_ENDPOINT);
    }

    #[test]
    fn test_base_url_override_wins() {
        let mut cfg = EvalConfig::new("gpt-4o", ExecutionMode::HostedApi);
        cfg.base_url = Some("http://127.0.0.1:9".into());
        assert_eq!(
            cfg.resolve_base_url_with(binding("openai"), env_of(&[("OPENAI_BASE_URL", "http://x")]))
                .unwrap(),
            "http://127.0.0.1:9"
        );
    }

    #[test]
    fn test_api_key_resolution() {
        let mut cfg = EvalConfig::new("claude-3-5-sonnet", ExecutionMode::HostedApi);
        let claude = binding("claude");
        let err = cfg.resolve_api_key_with(claude, env_of(&[])).unwrap_err();
        assert_eq!(err.context().unwrap().field_path.as_deref(), Some("ANTHROPIC_API_KEY"));
        assert_eq!(
            cfg.resolve_api_key_with(claude, env_of(&[("ANTHROPIC_API_KEY", "sk-ant")])).unwrap(),
            Some("sk-ant".to_string())
        );
        cfg.api_key = Some("inline".into());
        assert_eq!(cfg.resolve_api_key_with(claude, env_of(&[])).unwrap(), Some("inline".to_string()));
        assert_eq!(cfg.resolve_api_key_with(binding("internvl"), env_of(&[])).unwrap(), None);
    }

    #[test]
    fn test_negative_temperature_rejected() {
        assert!(EvalConfig::from_yaml_str("model_name: gpt-4o\ntemperature: -1\n").is_err());
    }
}
