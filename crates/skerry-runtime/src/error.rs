//! Error types for skerry-runtime.

use thiserror::Error;

/// Result type alias for skerry-runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while talking to the container engine.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The container engine could not be reached
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),

    /// The engine rejected an operation
    #[error("container {operation} failed: {message}")]
    OperationFailed {
        /// Operation name (create, start, inspect, stop, remove)
        operation: &'static str,
        /// Diagnostic message reported by the engine
        message: String,
    },

    /// The container spec is not usable
    #[error("invalid container spec: {0}")]
    InvalidSpec(String),
}

impl RuntimeError {
    /// Shorthand for an [`RuntimeError::OperationFailed`].
    pub fn operation(operation: &'static str, message: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation,
            message: message.into(),
        }
    }

    /// True if the engine itself could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
