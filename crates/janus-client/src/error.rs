//! Error types for the persistence clients.

use janus_core::JanusError;

/// Errors from talking to a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("reporter shut down")]
    Shutdown,
}

/// Errors loading or saving the client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("RON write error: {0}")]
    RonWrite(#[from] ron::Error),

    #[error("no config directory on this platform")]
    NoConfigDir,

    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

impl From<ClientError> for JanusError {
    fn from(e: ClientError) -> Self {
        JanusError::Backend(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
