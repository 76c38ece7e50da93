use thiserror::Error;
use crate::types::exchange::ExchangeId;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Connection Errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Max reconnect attempts exceeded")]
    MaxReconnectAttemptsExceeded,

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Login not supported by {0}")]
    LoginUnsupported(ExchangeId),

    #[error("Login timed out")]
    LoginTimeout,

    // Decode Errors
    #[error("Event deserialization failed: {0}")]
    DeserializationError(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Exchange error: code={code}, msg={msg}")]
    ExchangeError {
        code: String,
        msg: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    // IO Errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // Supervision Errors
    #[error("Task {name} failed: {reason}")]
    TaskFailed {
        name: String,
        reason: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DeserializationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
