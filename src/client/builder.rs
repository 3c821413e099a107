//! Client construction.

use tracing::info;

use crate::auth::{BearerTokenProvider, ChainedTokenCredential, TokenCredential};
use crate::client::core::{EvalClient, RequestAuth};
use crate::config::EvalConfig;
use crate::drivers::create_driver;
use crate::routing::{self, AuthScheme};
use crate::structured::{JsonMode, JsonModeConfig, Normalizer};
use crate::transport::{HttpTransport, TransportConfig};
use crate::Result;

/// Builder for [`EvalClient`].
///
/// Everything that touches the environment happens here, once: backend selection,
/// endpoint and key lookup, and (for Azure) the first token fetch.
pub struct EvalClientBuilder {
    config: EvalConfig,
    credential: Option<Box<dyn TokenCredential>>,
    transport: Option<TransportConfig>,
}

impl EvalClientBuilder {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            credential: None,
            transport: None,
        }
    }

    /// Replace the default Azure credential chain (CLI, then managed identity).
    pub fn credential(mut self, credential: Box<dyn TokenCredential>) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Replace the environment-derived transport settings.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport = Some(config);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<EvalClient> {
        let config = self.config;
        config.validate()?;

        let selection = routing::select(&config.model_name, config.mode_flags()?)?;
        let binding = selection.binding;

        let base_url = config.resolve_base_url(binding)?;
        let auth = match binding.auth {
            AuthScheme::None => RequestAuth::None,
            AuthScheme::Bearer { .. } => RequestAuth::Bearer(config.resolve_api_key(binding)?.unwrap_or_default()),
            AuthScheme::AnthropicKey { .. } => {
                RequestAuth::AnthropicKey(config.resolve_api_key(binding)?.unwrap_or_default())
            }
            AuthScheme::AzureAd => {
                let credential = self
                    .credential
                    .unwrap_or_else(|| Box::new(ChainedTokenCredential::azure_default(None)));
                let provider = BearerTokenProvider::new(credential, config.resolve_azure_scope());
                // Fail at startup rather than on the first episode
                provider.token()?;
                RequestAuth::AzureAd(provider)
            }
        };

        let transport_config = self
            .transport
            .unwrap_or_else(|| TransportConfig::from_env(config.timeout_secs));
        let transport = HttpTransport::new(&base_url, &transport_config)?;
        let driver = create_driver(binding.style, binding.name, &config.resolve_azure_api_version());

        // Check replies against the schema the binding actually asks for
        let normalizer = match (config.validate_schema, binding.json_mode) {
            (false, _) => Normalizer::new(),
            (true, JsonMode::Json) => Normalizer::with_single_step_schema(selection.plan)?,
            (true, _) => Normalizer::with_schema(selection.plan)?,
        };
        let response_format =
            JsonModeConfig::for_plan(binding.json_mode, selection.plan, binding.strict_schema).to_openai_format();

        info!(
            model = selection.model_name.as_str(),
            binding = binding.name,
            mode = %binding.mode,
            base_url = transport.base_url(),
            schema = selection.plan.label(),
            timeout_secs = transport_config.timeout.as_secs(),
            "evaluation client ready"
        );

        Ok(EvalClient {
            selection,
            transport,
            driver,
            auth,
            normalizer,
            response_format,
            temperature: config.temperature,
            max_completion_tokens: config.max_completion_tokens,
        })
    }
}
