use chat_ox_common::CommonRequestError;
use thiserror::Error;

/// Errors that can occur when streaming a completion from Zhipu AI
#[derive(Debug, Error)]
pub enum ZhipuRequestError {
    /// No usable API key in any configuration layer. Raised before any network I/O.
    #[error("no valid API key")]
    MissingApiKey,

    /// The endpoint answered with a non-success status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The response has no body to stream
    #[error("unable to read the response stream")]
    StreamUnavailable,

    /// HTTP client errors
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization errors
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),

    /// The request could not be assembled
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ZhipuRequestError {
    /// Whether the user has to fix their credentials before retrying
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        match self {
            ZhipuRequestError::MissingApiKey => true,
            ZhipuRequestError::Api { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// HTTP status for errors reported by the endpoint
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ZhipuRequestError::Api { status, .. } => Some(*status),
            ZhipuRequestError::ReqwestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<CommonRequestError> for ZhipuRequestError {
    fn from(error: CommonRequestError) -> Self {
        match error {
            CommonRequestError::Http(e) => ZhipuRequestError::ReqwestError(e),
            CommonRequestError::Json(e) => ZhipuRequestError::SerdeError(e),
            CommonRequestError::AuthenticationMissing => ZhipuRequestError::MissingApiKey,
            CommonRequestError::Api { status, message } => {
                ZhipuRequestError::Api { status, message }
            }
            CommonRequestError::StreamUnavailable => ZhipuRequestError::StreamUnavailable,
            CommonRequestError::RequestBuilder(message) => {
                ZhipuRequestError::InvalidRequest(message)
            }
        }
    }
}
