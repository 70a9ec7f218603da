use thiserror::Error;

/// Main error type for BetaHealth
#[derive(Error, Debug)]
pub enum ChatError {
    /// The endpoint handle could not be created; the session is unusable.
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Short, stable label used when logging a failed turn
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Setup(_) => "setup",
            ChatError::Network(_) => "network",
            ChatError::Quota(_) => "quota",
            ChatError::Api { .. } => "api",
            ChatError::MalformedResponse(_) => "malformed_response",
            ChatError::Config(_) => "config",
            ChatError::Io(_) => "io",
        }
    }

    /// Classify an arbitrary error chain, looking for a `ChatError` inside it
    pub fn kind_of(err: &anyhow::Error) -> &'static str {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<ChatError>())
            .map(ChatError::kind)
            .unwrap_or("unknown")
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::MalformedResponse(err.to_string())
        } else {
            ChatError::Network(err.to_string())
        }
    }
}
