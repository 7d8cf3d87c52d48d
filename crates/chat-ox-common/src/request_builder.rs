use crate::{
    error::{self, CommonRequestError},
    streaming::SseParser,
};
use async_stream::try_stream;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use reqwest::{RequestBuilder as ReqwestRequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// Configuration for request building
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Full endpoint URL; requests are posted here as-is
    pub url: String,
    pub api_key: String,
    pub user_agent: Option<String>,
}

impl RequestConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            user_agent: None,
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Builds and sends authenticated JSON requests to one chat-completions endpoint
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: reqwest::Client,
    config: RequestConfig,
}

impl RequestBuilder {
    pub fn new(client: reqwest::Client, config: RequestConfig) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Build a reqwest `RequestBuilder` for a JSON `POST` to the endpoint.
    ///
    /// # Errors
    ///
    /// Fails with [`CommonRequestError::AuthenticationMissing`] when the API key is
    /// blank. Nothing is sent in that case.
    pub fn build_request(&self) -> Result<ReqwestRequestBuilder, CommonRequestError> {
        let api_key = self.config.api_key.trim();
        if api_key.is_empty() {
            return Err(CommonRequestError::AuthenticationMissing);
        }

        let mut req = self
            .client
            .post(&self.config.url)
            .bearer_auth(api_key)
            .header("content-type", "application/json");

        if let Some(ref user_agent) = self.config.user_agent {
            req = req.header("user-agent", user_agent);
        }

        Ok(req)
    }

    /// Build the complete streaming request, body included, without sending it.
    ///
    /// The body gets `"stream": true` whatever it said before.
    ///
    /// # Errors
    ///
    /// Fails when the key is missing, the body does not serialize to a JSON
    /// object, or reqwest rejects the request (e.g. an invalid URL).
    pub fn build_stream_request<B: Serialize>(
        &self,
        body: &B,
    ) -> Result<reqwest::Request, CommonRequestError> {
        let payload = stream_payload(serde_json::to_value(body)?)?;
        Ok(self.build_request()?.json(&payload).build()?)
    }

    /// Execute a streaming request and yield text deltas.
    ///
    /// Configuration problems are reported as the first item, before any I/O. HTTP
    /// failures are reported before any delta.
    pub fn stream<B>(&self, body: &B) -> BoxStream<'static, Result<String, CommonRequestError>>
    where
        B: Serialize,
    {
        let client = self.client.clone();
        let prepared = self.build_stream_request(body);

        Box::pin(try_stream! {
            let request = prepared?;

            log::debug!("POST {} (streaming)", request.url());
            let response = client.execute(request).await?;
            let status = response.status();

            if !status.is_success() {
                // an unreadable error body still reports the status
                let bytes = response.bytes().await.unwrap_or_else(|e| {
                    log::debug!("failed to read error body: {e}");
                    Bytes::new()
                });
                log::debug!("streaming request rejected with status {}", status.as_u16());
                Err(error::parse_error_response(status, &bytes))?;
            } else if !has_body(status) {
                Err(CommonRequestError::StreamUnavailable)?;
            } else {
                let mut parser = SseParser::new(response);

                while let Some(delta) = parser.next_delta().await? {
                    yield delta;
                }
            }
        })
    }
}

/// Statuses whose responses never carry a body
fn has_body(status: StatusCode) -> bool {
    !matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT)
}

/// Turn a request body into the JSON object that is actually posted
fn stream_payload(body: Value) -> Result<Value, CommonRequestError> {
    let mut obj = match body {
        Value::Object(map) => map,
        other => {
            return Err(CommonRequestError::RequestBuilder(format!(
                "Streaming body must be a JSON object, got {other}"
            )));
        }
    };

    obj.insert("stream".to_string(), Value::Bool(true));

    Ok(Value::Object(obj))
}
