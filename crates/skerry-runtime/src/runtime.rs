//! The `ContainerRuntime` trait - the seam between Skerry and a container engine.

use crate::error::Result;
use crate::spec::ContainerSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Engine-assigned container identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Wrap an engine-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first 12 characters, as `docker ps` shows them.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time view of a container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerStatus {
    /// The engine reports the container as running.
    pub running: bool,
    /// Engine status string (`created`, `running`, `exited`, ...), if reported.
    pub status: Option<String>,
}

/// Thin façade over a container engine.
///
/// Implementations perform no retries; callers decide which operations are
/// safe to repeat. Every method fails with [`RuntimeError::Unavailable`] when the
/// engine cannot be reached and [`RuntimeError::OperationFailed`] when it rejects
/// the request.
///
/// [`RuntimeError::Unavailable`]: crate::RuntimeError::Unavailable
/// [`RuntimeError::OperationFailed`]: crate::RuntimeError::OperationFailed
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create (but do not start) a container.
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId>;

    /// Start a created container.
    async fn start(&self, id: &ContainerId) -> Result<()>;

    /// Inspect a container's state.
    async fn inspect(&self, id: &ContainerId) -> Result<ContainerStatus>;

    /// Stop a container, killing it after `timeout`.
    async fn stop(&self, id: &ContainerId, timeout: Duration) -> Result<()>;

    /// Remove a container.
    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()>;

    /// Check that the engine is reachable.
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_id_short() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }

    #[test]
    fn test_container_id_display() {
        let id = ContainerId::new("abc");
        assert_eq!(format!("{id}"), "abc");
        assert_eq!(id.as_str(), "abc");
    }
}
