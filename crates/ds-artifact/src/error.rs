//! Error types for ds-artifact.

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("artifact not found")]
    NotFound,

    #[error("transfer cancelled")]
    Cancelled,

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("transfer stalled for {0:?}")]
    Timeout(Duration),

    #[error("content length mismatch: expected {expected} bytes, received {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("a transfer is already in flight on this client")]
    Busy,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status associated with the failure, if the backend produced one.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::NotFound => Some(404),
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// Collapse the error into the single shape every caller receives.
    ///
    /// Backend failures carry the message already extracted from the
    /// response body; everything else uses its display text.
    #[must_use]
    pub fn normalize(&self) -> NormalizedError {
        let message = match self {
            Error::Status { message, .. } => message.clone(),
            other => other.to_string(),
        };
        NormalizedError::new(message)
    }

    /// Build a network error from a transport failure, keeping its source chain.
    pub(crate) fn network<E: std::error::Error>(err: E) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        Error::Network(message)
    }
}

/// Normalized failure shape: `{ "body": { "message": "..." } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedError {
    pub body: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl NormalizedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            body: ErrorBody {
                message: message.into(),
            },
        }
    }

    pub fn message(&self) -> &str { &self.body.message }
}
