//! Session identifiers and container records.

use crate::variant::SandboxVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skerry_runtime::ContainerId;
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a session, kept across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random session ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Connection metadata for one running sandbox.
///
/// The bearer token is neither serialized nor shown by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRecord {
    /// Session this sandbox belongs to.
    pub session_id: SessionId,
    /// Engine-assigned container ID.
    pub container_id: ContainerId,
    /// Control-plane URL, derived from the first host port.
    pub base_url: String,
    /// Host ports, parallel to the variant's container ports.
    pub ports: Vec<u16>,
    /// Shared bearer token for the in-container service.
    #[serde(skip)]
    pub bearer_token: Option<String>,
    /// Variant the sandbox was created from.
    pub variant: SandboxVariant,
    /// When the sandbox became ready.
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for ContainerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRecord")
            .field("session_id", &self.session_id)
            .field("container_id", &self.container_id)
            .field("base_url", &self.base_url)
            .field("ports", &self.ports)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("variant", &self.variant)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl ContainerRecord {
    /// Host port published for a given container port, if the variant exposes it.
    pub fn host_port_for(&self, container_port: u16) -> Option<u16> {
        self.variant
            .ports()
            .iter()
            .position(|p| *p == container_port)
            .and_then(|idx| self.ports.get(idx).copied())
    }

    /// The control-plane host port.
    pub fn primary_port(&self) -> Option<u16> {
        self.ports.first().copied()
    }
}

/// Base URL for a sandbox whose control plane is published on `port`.
pub(crate) fn base_url_for(port: u16) -> String {
    format!("http://localhost:{port}")
}
