//! Error types for skerry-core.

use crate::SessionId;
use skerry_runtime::RuntimeError;
use thiserror::Error;

/// Result type alias for skerry-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur during sandbox operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No free host port could be found in the configured range
    #[error("no available ports in range {min}-{max}")]
    ResourceExhausted {
        /// Lower bound of the range
        min: u16,
        /// Upper bound of the range
        max: u16,
    },

    /// The container engine could not be reached
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// The container engine rejected an operation
    #[error("container operation failed: {0}")]
    ContainerOperationFailed(String),

    /// Readiness polling gave up
    #[error("sandbox not ready after {attempts} attempts")]
    SandboxNotReady {
        /// Number of inspections performed
        attempts: u32,
    },

    /// Sandbox creation failed; no resources remain reserved
    #[error("failed to create sandbox for session {session_id}: {source}")]
    SandboxCreationFailed {
        /// Session the sandbox was created for
        session_id: SessionId,
        /// The step that failed
        #[source]
        source: Box<CoreError>,
    },

    /// A proxied call to the in-container tool server failed
    #[error("sandbox operation {operation} failed{}: {message}", status_suffix(.status))]
    SandboxOperationFailed {
        /// Tool operation name
        operation: String,
        /// HTTP status, if a response was received
        status: Option<u16>,
        /// Response body or transport diagnostic
        message: String,
    },

    /// The session handle has been closed
    #[error("session is closed: {0}")]
    SessionClosed(SessionId),

    /// Restart could not re-establish a container
    #[error("failed to restart session {session_id}: {source}")]
    SandboxRestartFailed {
        /// Session being restarted
        session_id: SessionId,
        /// Why re-creation failed
        #[source]
        source: Box<CoreError>,
    },

    /// Unknown sandbox variant name
    #[error("unknown sandbox variant: {0}")]
    UnknownVariant(String),

    /// A live sandbox is already registered for this session
    #[error("session already has a live sandbox: {0}")]
    SessionExists(SessionId),

    /// Sandbox not found
    #[error("sandbox not found: {0}")]
    NotFound(SessionId),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// The operation ran past its deadline
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" with status {s}"))
        .unwrap_or_default()
}

impl CoreError {
    pub(crate) fn operation_failed(
        operation: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::SandboxOperationFailed {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// The innermost cause, looking through creation and restart wrappers.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            Self::SandboxCreationFailed { source, .. }
            | Self::SandboxRestartFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<RuntimeError> for CoreError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Unavailable(msg) => Self::RuntimeUnavailable(msg),
            other => Self::ContainerOperationFailed(other.to_string()),
        }
    }
}
