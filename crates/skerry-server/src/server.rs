//! SkerryServer - session table shared by the HTTP handlers.

use crate::types::{HealthResponse, SessionInfo};
use dashmap::DashMap;
use futures::future::join_all;
use serde_json::Value;
use skerry_core::{
    ContainerRecord, CoreError, SandboxManager, SandboxSession, SandboxVariant, SessionId,
};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

type SharedSession = Arc<TokioMutex<SandboxSession>>;

/// Server state: the sandbox manager plus the sessions opened through the API.
///
/// Each session sits behind its own async mutex, so calls on one session run
/// in order while different sessions proceed in parallel.
#[derive(Clone)]
pub struct SkerryServer {
    manager: Arc<SandboxManager>,
    sessions: Arc<DashMap<SessionId, SharedSession>>,
}

impl SkerryServer {
    /// Create a server around a sandbox manager.
    pub fn new(manager: Arc<SandboxManager>) -> Self {
        Self {
            manager,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Get a reference to the sandbox manager.
    pub fn manager(&self) -> &SandboxManager {
        &self.manager
    }

    /// Number of sessions opened through this server.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, id: &SessionId) -> Result<SharedSession, CoreError> {
        self.sessions
            .get(id)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| CoreError::NotFound(id.clone()))
    }

    /// Open a session, creating its sandbox.
    pub async fn open_session(
        &self,
        variant: SandboxVariant,
        session_id: Option<SessionId>,
    ) -> Result<SessionInfo, CoreError> {
        let session_id = session_id.unwrap_or_else(SessionId::generate);
        if self.sessions.contains_key(&session_id) {
            return Err(CoreError::SessionExists(session_id));
        }

        let session = self
            .manager
            .open_session_with_id(session_id.clone(), variant)
            .await?;
        let info = SessionInfo::from(&session);

        // a concurrent request may have opened the same ID in the meantime
        if let Err(mut session) = self.insert(session_id.clone(), session) {
            session.close().await;
            return Err(CoreError::SessionExists(session_id));
        }

        tracing::info!(session_id = %session_id, variant = %variant, "Session opened");
        Ok(info)
    }

    fn insert(&self, id: SessionId, session: SandboxSession) -> Result<(), SandboxSession> {
        match self.sessions.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(session),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(TokioMutex::new(session)));
                Ok(())
            }
        }
    }

    /// Close a session and remove its sandbox.
    pub async fn close_session(&self, id: &SessionId) -> Result<(), CoreError> {
        let (_, session) = self
            .sessions
            .remove(id)
            .ok_or_else(|| CoreError::NotFound(id.clone()))?;
        session.lock().await.close().await;
        Ok(())
    }

    /// Restart a session's sandbox.
    pub async fn restart_session(&self, id: &SessionId) -> Result<SessionInfo, CoreError> {
        let session = self.session(id)?;
        let mut session = session.lock().await;
        session.restart().await?;
        Ok(SessionInfo::from(&*session))
    }

    /// Describe a session.
    pub async fn session_info(&self, id: &SessionId) -> Result<SessionInfo, CoreError> {
        let session = self.session(id)?;
        let session = session.lock().await;
        Ok(SessionInfo::from(&*session))
    }

    /// Liveness and detailed status of a session's sandbox.
    pub async fn session_health(&self, id: &SessionId) -> Result<HealthResponse, CoreError> {
        let session = self.session(id)?;
        let session = session.lock().await;
        let healthy = session.is_healthy().await;
        let status = if healthy {
            session.health_status().await.ok()
        } else {
            None
        };
        Ok(HealthResponse { healthy, status })
    }

    /// Proxy a tool call to a session's sandbox.
    pub async fn call_tool(
        &self,
        id: &SessionId,
        operation: &str,
        params: &Value,
    ) -> Result<Value, CoreError> {
        let session = self.session(id)?;
        let session = session.lock().await;
        session.call_tool(operation, params).await
    }

    /// Live sandboxes ordered by session ID.
    pub fn list_sandboxes(&self) -> Vec<ContainerRecord> {
        let mut records: Vec<_> = self.manager.list_sandboxes().into_values().collect();
        records.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        records
    }

    /// Close every session opened through this server.
    pub async fn close_all(&self) {
        let ids: Vec<SessionId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        tracing::info!(count = ids.len(), "Closing all sessions");
        join_all(ids.iter().map(|id| self.close_session(id))).await;
    }

    /// Detach every session, leaving its sandbox running.
    ///
    /// Waits for in-flight calls on each session to finish first.
    pub async fn detach_all(&self) {
        let ids: Vec<SessionId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            let Some((_, session)) = self.sessions.remove(&id) else {
                continue;
            };
            if let Some(record) = session.lock().await.detach() {
                tracing::info!(
                    session_id = %id,
                    container_id = %record.container_id.short(),
                    "Session detached, sandbox left running"
                );
            };
        }
    }
}
