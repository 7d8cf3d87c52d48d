use thiserror::Error;

/// Common errors that can occur while talking to a chat-completions endpoint
#[derive(Error, Debug)]
pub enum CommonRequestError {
    /// HTTP transport failed (connect, send, or reading the body)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization of the request body failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No usable API key was configured
    #[error("no valid API key")]
    AuthenticationMissing,

    /// The endpoint answered with a non-success status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The response carries no body that could be streamed
    #[error("response body is not readable")]
    StreamUnavailable,

    /// Error originating from the request builder
    #[error("Request builder error: {0}")]
    RequestBuilder(String),
}

impl CommonRequestError {
    /// HTTP status code for errors that came back from the endpoint
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Parse error response from HTTP status and body
///
/// The message is taken from `{"error": {"message": ...}}` (or a top-level
/// `message`) when the body is JSON; otherwise it falls back to
/// `request failed: <status>`.
#[must_use]
pub fn parse_error_response(status: reqwest::StatusCode, body: &[u8]) -> CommonRequestError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(extract_error_message)
        .unwrap_or_else(|| format!("request failed: {}", status.as_u16()));

    CommonRequestError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Extract error message from the usual provider JSON error shapes
fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    // {"error": {"message": "..."}}
    if let Some(msg) = json
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(serde_json::Value::as_str)
    {
        return Some(msg.to_string());
    }

    // Generic message field
    json.get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}
