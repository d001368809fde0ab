//! The inference seam the synthesizer depends on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat-completion conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A chat-completion backend.
///
/// Implemented by [`crate::GroqClient`]; tests substitute scripted fakes.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Model identifier recorded on every analysis.
    fn model(&self) -> &str;

    /// Sends the conversation and returns the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] once the client's own transient retries
    /// are exhausted.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, InferenceError>;
}
