//! Conversation state around a streaming exchange.
//!
//! A session records the user's turn and an empty assistant placeholder up front,
//! grows the placeholder as deltas arrive, and on failure keeps whatever text was
//! already received with an error note appended.

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Message, Role, Zhipu, ZhipuRequestError};

/// Title of a session that has no messages yet
pub const UNTITLED: &str = "New chat";

/// Number of characters of the first prompt used as the session title
pub const TITLE_MAX_CHARS: usize = 15;

/// Prefix of the note appended to an assistant message whose stream failed
pub const ERROR_MARKER: &str = "❌ Service error";

/// A conversation with the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Handle to an exchange that [`ChatSession::begin_exchange`] started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    /// Id of the assistant placeholder that receives the deltas
    pub assistant_id: String,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: UNTITLED.to_string(),
            messages: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Start a session with a system prompt
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.messages.push(Message::system(prompt));
        session
    }

    /// Record the user's input and an empty assistant placeholder.
    ///
    /// Returns `None` for blank input. The first user message names the session.
    pub fn begin_exchange(&mut self, input: &str) -> Option<PendingReply> {
        if input.trim().is_empty() {
            return None;
        }

        if !self.messages.iter().any(|m| m.role == Role::User) {
            self.title = derive_title(input);
        }

        let assistant = Message::assistant("");
        let assistant_id = assistant.id.clone();
        self.messages.push(Message::user(input));
        self.messages.push(assistant);
        self.touch();

        Some(PendingReply { assistant_id })
    }

    /// Messages to send for `reply`: everything before its placeholder
    #[must_use]
    pub fn history_for(&self, reply: &PendingReply) -> &[Message] {
        let end = self
            .messages
            .iter()
            .position(|m| m.id == reply.assistant_id)
            .unwrap_or(self.messages.len());
        &self.messages[..end]
    }

    /// Append a streamed fragment to the placeholder
    pub fn apply_delta(&mut self, reply: &PendingReply, delta: &str) {
        if let Some(message) = self.message_mut(&reply.assistant_id) {
            message.content.push_str(delta);
        }
    }

    /// Mark the reply as failed, keeping any text already received
    pub fn fail(&mut self, reply: &PendingReply, error: &ZhipuRequestError) {
        let note = format!("{ERROR_MARKER}: {}", user_facing_message(error));
        if let Some(message) = self.message_mut(&reply.assistant_id) {
            if message.content.is_empty() {
                message.content = note;
            } else {
                message.content.push_str("\n\n");
                message.content.push_str(&note);
            }
        }
        self.touch();
    }

    /// Current text of the reply
    #[must_use]
    pub fn reply_text(&self, reply: &PendingReply) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.id == reply.assistant_id)
            .map(|m| m.content.as_str())
    }

    /// Forget the conversation, keeping the session id and any system prompt
    pub fn clear(&mut self) {
        self.messages.retain(|m| m.role == Role::System);
        self.title = UNTITLED.to_string();
        self.touch();
    }

    /// Run one exchange: record `input`, stream the reply into the session, and
    /// call `on_delta` for every fragment as it arrives.
    ///
    /// Returns `None` for blank input.
    ///
    /// # Errors
    ///
    /// The stream's error. The session has already been annotated when it is returned.
    pub async fn send(
        &mut self,
        client: &Zhipu,
        input: &str,
        mut on_delta: impl FnMut(&str),
    ) -> Option<Result<PendingReply, ZhipuRequestError>> {
        let reply = self.begin_exchange(input)?;
        let mut stream = client.stream(self.history_for(&reply));

        while let Some(item) = stream.next().await {
            match item {
                Ok(delta) => {
                    on_delta(&delta);
                    self.apply_delta(&reply, &delta);
                }
                Err(e) => {
                    log::warn!("reply {} failed: {e}", reply.assistant_id);
                    self.fail(&reply, &e);
                    return Some(Err(e));
                }
            }
        }

        self.touch();
        Some(Ok(reply))
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Session title for a first prompt: up to 15 characters, `...` when cut
#[must_use]
pub fn derive_title(input: &str) -> String {
    let mut chars = input.chars();
    let mut title: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        title.push_str("...");
    }
    title
}

/// Text shown to the user for a failed exchange
#[must_use]
pub fn user_facing_message(error: &ZhipuRequestError) -> String {
    if error.is_configuration_error() {
        format!(
            "invalid API key ({error}); configure one with `zhipu-chat config set api-key <KEY>` or {}",
            crate::config::API_KEY_ENV
        )
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_first_prompt() {
        assert_eq!(derive_title("short"), "short");
        assert_eq!(derive_title("exactly 15 char"), "exactly 15 char");
        assert_eq!(derive_title("this is longer than fifteen"), "this is longer ...");
        assert_eq!(derive_title("请帮我写一首关于秋天的诗，要求押韵"), "请帮我写一首关于秋天的诗，要求...");
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let mut session = ChatSession::new();
        assert!(session.begin_exchange("   \n").is_none());
        assert!(session.messages.is_empty());
        assert_eq!(session.title, UNTITLED);
    }

    #[test]
    fn test_history_excludes_placeholder() {
        let mut session = ChatSession::with_system_prompt("be nice");
        let reply = session.begin_exchange("hi").unwrap();

        let history = session.history_for(&reply);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::User);
        assert_eq!(history[1].content, "hi");
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.title, "hi");
    }

    #[test]
    fn test_title_only_set_once() {
        let mut session = ChatSession::new();
        let first = session.begin_exchange("first question").unwrap();
        session.apply_delta(&first, "answer");
        session.begin_exchange("second question").unwrap();
        assert_eq!(session.title, "first question");
    }

    #[test]
    fn test_deltas_accumulate() {
        let mut session = ChatSession::new();
        let reply = session.begin_exchange("hi").unwrap();
        session.apply_delta(&reply, "Hel");
        session.apply_delta(&reply, "lo");
        assert_eq!(session.reply_text(&reply), Some("Hello"));
    }

    #[test]
    fn test_failure_keeps_partial_text() {
        let mut session = ChatSession::new();
        let reply = session.begin_exchange("hi").unwrap();
        session.apply_delta(&reply, "partial");
        session.fail(
            &reply,
            &ZhipuRequestError::Api {
                status: 500,
                message: "request failed: 500".to_string(),
            },
        );
        assert_eq!(
            session.reply_text(&reply),
            Some("partial\n\n❌ Service error: request failed: 500")
        );
    }

    #[test]
    fn test_failure_without_text_and_key_hint() {
        let mut session = ChatSession::new();
        let reply = session.begin_exchange("hi").unwrap();
        session.fail(&reply, &ZhipuRequestError::MissingApiKey);

        let text = session.reply_text(&reply).unwrap();
        assert!(text.starts_with("❌ Service error: invalid API key (no valid API key)"));
        assert!(text.contains(crate::config::API_KEY_ENV));
    }

    #[test]
    fn test_clear_keeps_system_prompt() {
        let mut session = ChatSession::with_system_prompt("sys");
        session.begin_exchange("hi").unwrap();
        session.clear();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::System);
        assert_eq!(session.title, UNTITLED);
    }
}
