use thiserror::Error;

/// Coarse grouping used by front ends to decide how to surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before anything was sent; show inline next to the input.
    Validation,
    /// Transport failure or a non-success response; show a generic banner.
    Network,
    /// The server no longer accepts the session; send the user to login.
    Auth,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error("session expired or missing, please log in again")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("local storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Validation(_) | ClientError::Config(_) => ErrorCategory::Validation,
            ClientError::Unauthorized => ErrorCategory::Auth,
            ClientError::NotFound(_)
            | ClientError::Api { .. }
            | ClientError::Transport(_)
            | ClientError::Decode(_)
            | ClientError::Storage(_) => ErrorCategory::Network,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
