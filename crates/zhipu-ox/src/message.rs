use chat_ox_common::{MessageRole, WireMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use chat_ox_common::MessageRole as Role;

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Local identifier; never sent to the endpoint
    pub id: String,

    /// The role of the message sender
    pub role: MessageRole,

    /// The text of the message
    pub content: String,

    /// When the message was created, stored as Unix milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// The role/content pair that goes over the wire
    #[must_use]
    pub fn to_wire(&self) -> WireMessage {
        WireMessage::new(self.role, self.content.clone())
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        message.to_wire()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(!msg.id.is_empty());

        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Message::user("a").id, Message::user("a").id);
    }

    #[test]
    fn test_wire_form_drops_local_fields() {
        let msg = Message::user("hi");
        let wire = serde_json::to_value(msg.to_wire()).unwrap();
        assert_eq!(wire, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_timestamp_serializes_as_millis() {
        let msg = Message::assistant("ok");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["timestamp"], msg.timestamp.timestamp_millis());

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, msg.id);
        assert_eq!(back.timestamp.timestamp_millis(), msg.timestamp.timestamp_millis());
    }
}
