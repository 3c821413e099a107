//! Role-tagged chat turns with optional image parts.
//!
//! A [`ModelRequest`] is the unit handed to the dispatcher. It is built once by the
//! caller and never mutated; drivers serialize it into their provider's wire shape.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Single chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User turn carrying one image followed by its text prompt.
    pub fn user_with_image(text: impl Into<String>, image: ImageRef) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Parts(vec![
                ContentPart::Image { image },
                ContentPart::Text { text: text.into() },
            ]),
        }
    }

    pub fn contains_image(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(ps) => ps.iter().any(|p| matches!(p, ContentPart::Image { .. })),
        }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(ps) => ps
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Copy of this turn with image parts removed (language-only mode).
    pub fn without_images(&self) -> Self {
        match &self.content {
            MessageContent::Text(_) => self.clone(),
            MessageContent::Parts(_) => Self {
                role: self.role,
                content: MessageContent::Text(self.text()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Message content: plain text or a list of typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { image: ImageRef },
}

/// Where an image comes from. Paths are read lazily at serialization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRef {
    Path(PathBuf),
    Base64 { media_type: String, data: String },
    Url(String),
}

/// Image resolved to something a provider can accept.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedImage {
    Inline { media_type: String, data: String },
    Url(String),
}

impl ResolvedImage {
    /// `data:` URL for inline images, the plain URL otherwise.
    pub fn to_url(&self) -> String {
        match self {
            ResolvedImage::Inline { media_type, data } => format!("data:{};base64,{}", media_type, data),
            ResolvedImage::Url(u) => u.clone(),
        }
    }
}

impl ImageRef {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ImageRef::Path(path.into())
    }

    pub fn from_bytes(bytes: &[u8], media_type: impl Into<String>) -> Self {
        ImageRef::Base64 {
            media_type: media_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn resolve(&self) -> crate::Result<ResolvedImage> {
        match self {
            ImageRef::Path(p) => {
                let bytes = std::fs::read(p)?;
                Ok(ResolvedImage::Inline {
                    media_type: guess_media_type(p).to_string(),
                    data: base64::engine::general_purpose::STANDARD.encode(bytes),
                })
            }
            ImageRef::Base64 { media_type, data } => Ok(ResolvedImage::Inline {
                media_type: media_type.clone(),
                data: data.clone(),
            }),
            ImageRef::Url(u) => {
                // data URLs are split back into their parts so Anthropic can take them
                if let Some(rest) = u.strip_prefix("data:") {
                    if let Some((media_type, data)) = rest.split_once(";base64,") {
                        return Ok(ResolvedImage::Inline {
                            media_type: media_type.to_string(),
                            data: data.to_string(),
                        });
                    }
                }
                Ok(ResolvedImage::Url(u.clone()))
            }
        }
    }
}

fn guess_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        // simulator frames are PNG
        _ => "image/png",
    }
}

/// Ordered, immutable list of turns for one model call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelRequest {
    messages: Vec<Message>,
}

impl ModelRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn has_image(&self) -> bool {
        self.messages.iter().any(Message::contains_image)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for ModelRequest {
    fn from(messages: Vec<Message>) -> Self {
        Self::new(messages)
    }
}
