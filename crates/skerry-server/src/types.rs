//! Request and response bodies for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skerry_core::{ContainerRecord, SandboxSession};

/// Body of `POST /sessions`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Variant name (default: `base`).
    #[serde(default)]
    pub variant: Option<String>,

    /// Caller-chosen session ID; generated when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// A session as reported by the API.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    /// Session identifier.
    pub session_id: String,
    /// Variant name.
    pub variant: String,
    /// `Open` or `Closed`.
    pub state: String,
    /// Current container, absent after a failed restart.
    pub container_id: Option<String>,
    /// Tool server URL of the current container.
    pub base_url: Option<String>,
    /// Host ports of the current container.
    pub ports: Vec<u16>,
    /// When the current container became ready.
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&SandboxSession> for SessionInfo {
    fn from(session: &SandboxSession) -> Self {
        let record = session.record();
        Self {
            session_id: session.session_id().to_string(),
            variant: session.variant().to_string(),
            state: session.state().to_string(),
            container_id: record.map(|r| r.container_id.to_string()),
            base_url: record.map(|r| r.base_url.clone()),
            ports: record.map(|r| r.ports.clone()).unwrap_or_default(),
            created_at: record.map(|r| r.created_at),
        }
    }
}

/// Body of `GET /sandboxes`.
#[derive(Debug, Serialize)]
pub struct ListSandboxesResponse {
    /// Live sandboxes ordered by session ID.
    pub sandboxes: Vec<ContainerRecord>,
}

/// Body of `GET /sessions/:id/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Liveness of the sandbox.
    pub healthy: bool,
    /// Detailed status reported by the sandbox, when reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
}
