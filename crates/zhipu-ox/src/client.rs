use std::sync::Arc;

use bon::Builder;
use chat_ox_common::{BoxStream, RequestBuilder, RequestConfig};
use futures_util::{StreamExt, TryStreamExt, stream};

use crate::{
    ChatRequest, Message, ZhipuRequestError,
    config::{ConfigResolver, LayeredConfig, MemoryStore, ResolvedConfig},
};

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("zhipu-ox/", env!("CARGO_PKG_VERSION"));

/// Zhipu AI streaming chat client
///
/// Configuration is resolved through the injected [`ConfigResolver`] at the start of
/// every call, so changes to stored settings apply to the next request.
#[derive(Debug, Clone, Builder)]
pub struct Zhipu {
    /// Where the key, endpoint and model come from
    #[builder(into)]
    resolver: Arc<dyn ConfigResolver>,

    /// HTTP client for making requests
    #[builder(default)]
    client: reqwest::Client,
}

impl Zhipu {
    /// Create a client with a fixed key and the default endpoint and model
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_resolver(ResolvedConfig::with_api_key(api_key))
    }

    /// Create a client that reads `ZHIPU_AI_*` environment variables on every call
    pub fn from_env() -> Self {
        Self::with_resolver(LayeredConfig::standard(MemoryStore::new()))
    }

    pub fn with_resolver(resolver: impl ConfigResolver + 'static) -> Self {
        Self {
            resolver: Arc::new(resolver),
            client: reqwest::Client::new(),
        }
    }

    /// Configuration the next call would use
    #[must_use]
    pub fn config(&self) -> ResolvedConfig {
        self.resolver.resolve()
    }

    /// Build the request for `messages` without sending it.
    ///
    /// # Errors
    ///
    /// [`ZhipuRequestError::MissingApiKey`] when no layer provides a usable key.
    pub fn build_request(&self, messages: &[Message]) -> Result<reqwest::Request, ZhipuRequestError> {
        let (builder, request) = self.prepare(messages)?;
        Ok(builder.build_stream_request(&request)?)
    }

    /// Stream the assistant's reply to `messages`, one text fragment at a time.
    ///
    /// Nothing is sent until the stream is first polled. Dropping the stream
    /// abandons the request.
    pub fn stream(&self, messages: &[Message]) -> BoxStream<'static, Result<String, ZhipuRequestError>> {
        match self.prepare(messages) {
            Ok((builder, request)) => builder
                .stream(&request)
                .map_err(ZhipuRequestError::from)
                .boxed(),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }

    /// Stream the reply and collect it into one string.
    ///
    /// # Errors
    ///
    /// Any error the stream reports. Text received before the error is lost; use
    /// [`Zhipu::stream`] to keep partial output.
    pub async fn complete(&self, messages: &[Message]) -> Result<String, ZhipuRequestError> {
        self.stream(messages).try_collect::<Vec<_>>().await.map(|parts| parts.concat())
    }

    /// Resolve configuration and assemble the request body
    fn prepare(&self, messages: &[Message]) -> Result<(RequestBuilder, ChatRequest), ZhipuRequestError> {
        let config = self.resolver.resolve();
        let api_key = config
            .valid_api_key()
            .ok_or(ZhipuRequestError::MissingApiKey)?;

        let builder = RequestBuilder::new(
            self.client.clone(),
            RequestConfig::new(&config.base_url, api_key).with_user_agent(USER_AGENT),
        );
        let request = ChatRequest::new(&config.model, messages);

        log::debug!(
            "prepared {} message(s) for model {} at {}",
            request.messages.len(),
            request.model,
            config.base_url
        );

        Ok((builder, request))
    }
}
