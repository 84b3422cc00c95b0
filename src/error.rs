//! Error type shared by the library modules.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    /// No Replicate API token in the environment or the config file.
    #[error("Replicate API token is not configured. Set REPLICATE_API_TOKEN or enter a token.")]
    ConfigurationMissing,

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Replicate API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The prediction itself failed or was canceled on the Replicate side.
    #[error("prediction failed: {0}")]
    Prediction(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }
}
