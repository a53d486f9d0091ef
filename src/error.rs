use thiserror::Error;

/// Failures raised while talking to the language-model provider.
#[derive(Error, Debug)]
pub enum AiError {
    /// The request could not be sent or the provider answered with a
    /// non-success status. `detail` carries the response body when there is one.
    #[error("AI API request failed: {detail}")]
    UpstreamUnavailable { status: Option<u16>, detail: String },

    #[error("AI stream interrupted: {0}")]
    StreamReadFailure(String),

    /// A single `data:` line could not be parsed. Never surfaced to clients.
    #[error("malformed stream frame: {0}")]
    DecodeFrame(#[from] serde_json::Error),

    #[error("AI API returned no readable response stream")]
    NoReadableBody,

    #[error("invalid AI API response: {0}")]
    InvalidResponse(String),
}

impl AiError {
    pub(crate) fn unavailable(detail: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            status: None,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AiError>;
