//! Error type for the crate.
//!
//! Every failure surfaces as a variant of [`Error`]. Configuration problems carry an
//! [`ErrorContext`] naming the field and the component that rejected it.

use std::path::PathBuf;
use thiserror::Error;

/// Structured error context for configuration failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Config key or env var that caused the error (e.g., "model_type", "remote_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected values)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "client_builder")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the evaluation runtime.
///
/// Nothing here is recovered internally; every variant is surfaced to the caller,
/// which decides between aborting the run and skipping the episode.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported model name: {model}{}", .hint.as_ref().map(|h| format!("\n Hint: {}", h)).unwrap_or_default())]
    UnsupportedModel { model: String, hint: Option<String> },

    #[error("Malformed model response: {reason} (excerpt: {excerpt:?})")]
    MalformedResponse { reason: String, excerpt: String },

    #[error("Backend call failed [{backend}]{}: {message}", .status.map(|s| format!(" HTTP {}", s)).unwrap_or_default())]
    BackendCall {
        backend: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Missing result file: {}", .path.display())]
    MissingResultFile { path: PathBuf },

    #[error("Invalid result file {}: {reason}", .path.display())]
    InvalidResultFile { path: PathBuf, reason: String },

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

/// Longest prefix of a raw model reply kept in `MalformedResponse` errors.
const EXCERPT_CHARS: usize = 160;

impl Error {
    pub fn unsupported_model(model: impl Into<String>) -> Self {
        Error::UnsupportedModel {
            model: model.into(),
            hint: None,
        }
    }

    /// Attach an actionable hint to an `UnsupportedModel` error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        if let Error::UnsupportedModel { hint: ref mut slot, .. } = self {
            *slot = Some(hint.into());
        }
        self
    }

    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        Error::MalformedResponse {
            reason: reason.into(),
            excerpt: raw.chars().take(EXCERPT_CHARS).collect(),
        }
    }

    pub fn backend(backend: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Error::BackendCall {
            backend: backend.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}
