//! Error types for model-connect-http.

use thiserror::Error;

/// Error type for connector operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to serialize a request payload or query parameter.
    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Required route configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single-record operation was given a payload without an identifier.
    #[error("A saved model must contain an ID for {model}")]
    MissingIdentifier {
        /// Model the operation was addressed to.
        model: String,
    },

    /// The backend answered with a failing status.
    #[error("HTTP response error {status}: {status_text}")]
    Transport {
        /// Numeric status code.
        status: u16,
        /// Reason phrase reported with the status.
        status_text: String,
    },

    /// The response cannot be consumed as a stream.
    #[error("Stream unsupported: {0}")]
    StreamUnsupported(String),

    /// I/O error while reading a response body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for errors raised before any network call was made.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::MissingIdentifier { .. })
    }

    /// Status code of a failing response, if this is a transport failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, Error>;
