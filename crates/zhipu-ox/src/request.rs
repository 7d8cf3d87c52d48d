use bon::Builder;
use chat_ox_common::WireMessage;
use serde::{Deserialize, Serialize};

use crate::{Message, Model};

/// Body of a streaming chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct ChatRequest {
    /// Conversation so far, oldest first
    #[builder(field)]
    pub messages: Vec<WireMessage>,

    /// The model to use for completion
    #[builder(into)]
    pub model: String,

    /// Whether to stream the response
    #[builder(default = true)]
    pub stream: bool,
}

impl ChatRequest {
    /// Streaming request for the given conversation
    pub fn new(model: &Model, messages: &[Message]) -> Self {
        Self::builder().model(model.as_str()).messages(messages).build()
    }
}

impl<S: chat_request_builder::State> ChatRequestBuilder<S> {
    /// Append conversation messages, oldest first
    pub fn messages<'a>(mut self, messages: impl IntoIterator<Item = &'a Message>) -> Self {
        self.messages
            .extend(messages.into_iter().map(Message::to_wire));
        self
    }
}
