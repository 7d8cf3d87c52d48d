// OpenAI-compatible chat-completions wire types.
// Only the fields this client sends or reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Message roles understood by chat-completions endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Wire name of the role
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A message as it goes over the wire: role and text, nothing else
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    pub role: MessageRole,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One `data:` payload of a streamed completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub choices: Option<Vec<StreamChoice>>,
}

/// Streaming choice delta
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: Option<u32>,

    #[serde(default)]
    pub delta: Option<MessageDelta>,

    /// Reason for stopping
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Partial message for streaming
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Partial content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl StreamChunk {
    /// Text carried by the first choice, if any.
    ///
    /// An empty string counts as no content.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.choices
            .as_deref()
            .and_then(<[StreamChoice]>::first)
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }

    /// Finish reason of the first choice, if the endpoint sent one
    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .as_deref()
            .and_then(<[StreamChoice]>::first)
            .and_then(|choice| choice.finish_reason.as_deref())
    }
}
