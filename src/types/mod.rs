//! Core type definitions

pub mod message;

pub use message::{
    ContentPart, ImageRef, Message, MessageContent, MessageRole, ModelRequest, ResolvedImage,
};
