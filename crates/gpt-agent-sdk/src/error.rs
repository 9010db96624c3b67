use crate::types::ErrorMessage;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    /// Missing or rejected credential. Never retried.
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited by provider: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),

    /// Misuse of a conversation client (overlapping queries, use after close)
    #[error("Invalid client state: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Connection and protocol level failures, whatever their origin.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http(_) | Self::Api { .. })
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Self::State(_))
    }

    /// Converts a reqwest failure, keeping timeouts distinguishable from
    /// other connection errors.
    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Transport(format!("request timed out: {}", error))
        } else {
            Self::Http(error)
        }
    }
}

/// Lets callers treat an in-stream error message as a failure with `?`
impl From<ErrorMessage> for AgentError {
    fn from(message: ErrorMessage) -> Self {
        match message.code {
            Some(code) => Self::Decode(format!("{}: {}", code, message.message)),
            None => Self::Decode(message.message),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
