// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;
use thiserror::Error;

/// Which side of the wire a remote operation failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request never produced a response (refused, reset, timed out).
    Network,
    /// The server answered with a non-success status or an unreadable body.
    Server,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Server => f.write_str("server"),
        }
    }
}

/// A form field that failed its local pre-submit check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum KhataError {
    #[error("{kind} error: {message}")]
    OperationFailed { kind: FailureKind, message: String },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("encode csv: {0}")]
    Csv(#[from] csv::Error),
}

impl KhataError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::OperationFailed {
            kind: FailureKind::Network,
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::OperationFailed {
            kind: FailureKind::Server,
            message: message.into(),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::OperationFailed { kind, .. } => Some(*kind),
            Self::Validation(_) | Self::Csv(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, KhataError>;

#[cfg(test)]
mod tests {
    use super::{FailureKind, KhataError, ValidationError};

    #[test]
    fn operation_failure_message_names_the_kind() {
        let error = KhataError::network("cannot reach http://localhost:8000");
        assert_eq!(
            error.to_string(),
            "network error: cannot reach http://localhost:8000"
        );
        assert_eq!(error.failure_kind(), Some(FailureKind::Network));

        let error = KhataError::server("404: Customer not found");
        assert_eq!(error.failure_kind(), Some(FailureKind::Server));
    }

    #[test]
    fn validation_errors_are_not_remote_failures() {
        let error = KhataError::from(ValidationError::new("name", "name is required"));
        assert_eq!(error.failure_kind(), None);
        assert!(error.to_string().contains("name is required"));
    }
}
