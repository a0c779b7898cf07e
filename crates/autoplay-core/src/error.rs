//! Error types for Autoplay

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown action token: {0}")]
    UnknownAction(String),

    #[error("simulated system error: {operation} - {message}")]
    SystemError { operation: String, message: String },

    #[error("audio error: {0}")]
    AudioError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn system(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SystemError {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn audio(message: impl Into<String>) -> Self {
        Self::AudioError(message.into())
    }
}
