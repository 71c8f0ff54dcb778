//! Error types for the SignCaption core

use thiserror::Error;

/// Result type alias for SignCaption core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while driving a caption session
///
/// Low confidence and disagreement are not errors: the stabilizer reports
/// them as a decision that confirms no label.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller broke a data contract (vector width, label count, etc.)
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Operation attempted in a session state that does not allow it
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        /// Operation that was rejected
        operation: &'static str,
        /// Session state at the time of the call
        state: &'static str,
    },

    /// Window snapshot requested before the buffer filled up
    #[error("Window not full: {len}/{capacity} vectors")]
    WindowNotFull {
        /// Vectors currently held
        len: usize,
        /// Window capacity
        capacity: usize,
    },

    /// Classifier failed to produce a probability vector
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background task failed (panic or cancellation)
    #[error("Task error: {0}")]
    Task(String),

    /// Caption event delivery failed
    #[error("Sink error: {0}")]
    Sink(#[from] crate::sink::CaptionSinkError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a contract violation error
    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }

    /// Create a classifier error
    pub fn classifier(message: impl Into<String>) -> Self {
        Self::Classifier(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error is a programmer error that must abort the session
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::ContractViolation(_) | Error::InvalidState { .. } | Error::WindowNotFull { .. }
        )
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for Error {
    fn from(err: ort::Error) -> Self {
        Error::Classifier(format!("ONNX Runtime error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_classification() {
        assert!(Error::contract("width").is_contract_violation());
        assert!(Error::InvalidState {
            operation: "append",
            state: "stopped"
        }
        .is_contract_violation());
        assert!(!Error::classifier("boom").is_contract_violation());
    }

    #[test]
    fn test_invalid_state_message() {
        let err = Error::InvalidState {
            operation: "start",
            state: "stopped",
        };
        assert_eq!(err.to_string(), "Cannot start while session is stopped");
    }
}
