//! Session handle bound to one logical session.
//!
//! A session keeps its [`SessionId`] for its whole life while the container
//! behind it may be replaced by [`SandboxSession::restart`].

use crate::client::{ExecutionResult, SandboxClient};
use crate::error::{CoreError, Result};
use crate::manager::{SandboxManager, SessionClaim};
use crate::record::{ContainerRecord, SessionId};
use crate::variant::SandboxVariant;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting operations.
    Open,
    /// Closed; every operation fails with [`CoreError::SessionClosed`].
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// The container a session currently talks to.
#[derive(Debug)]
struct Binding {
    record: ContainerRecord,
    client: SandboxClient,
}

/// Caller-facing handle for one sandbox session.
///
/// Operations take `&self` and go to the current container's tool server.
/// [`restart`](Self::restart) and [`close`](Self::close) take `&mut self`, so
/// no operation can race a container swap.
///
/// An open session whose restart failed has no container. It stays `Open`
/// but every operation fails with [`CoreError::SandboxOperationFailed`]
/// until a later restart succeeds.
///
/// The session ID stays reserved for this handle until it is closed,
/// detached or dropped, so no second handle can open the same ID. Dropping
/// an open session removes its container in the background.
pub struct SandboxSession {
    session_id: SessionId,
    variant: SandboxVariant,
    manager: Arc<SandboxManager>,
    state: SessionState,
    binding: Option<Binding>,
    claim: Option<SessionClaim>,
}

impl fmt::Debug for SandboxSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxSession")
            .field("session_id", &self.session_id)
            .field("variant", &self.variant)
            .field("state", &self.state)
            .field("record", &self.record())
            .finish()
    }
}

impl SandboxSession {
    /// Wrap a freshly created sandbox.
    ///
    /// The sandbox is removed again if no client can be built for it.
    pub(crate) async fn attach(
        manager: Arc<SandboxManager>,
        record: ContainerRecord,
        claim: SessionClaim,
    ) -> Result<Self> {
        let session_id = record.session_id.clone();
        let variant = record.variant;
        let container_id = record.container_id.clone();
        let binding = match bind(&manager, record) {
            Ok(binding) => binding,
            Err(e) => {
                manager.remove_container(&session_id, &container_id).await;
                return Err(e);
            }
        };

        tracing::debug!(session_id = %session_id, "Session opened");
        Ok(Self {
            session_id,
            variant,
            manager,
            state: SessionState::Open,
            binding: Some(binding),
            claim: Some(claim),
        })
    }

    /// Get the session ID.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Get the variant this session was opened with.
    pub fn variant(&self) -> SandboxVariant {
        self.variant
    }

    /// Get the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True until [`close`](Self::close) is called.
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Record of the current container, if one is bound.
    pub fn record(&self) -> Option<&ContainerRecord> {
        self.binding.as_ref().map(|b| &b.record)
    }

    /// Whether a container is bound. False after a failed restart.
    pub fn has_container(&self) -> bool {
        self.binding.is_some()
    }

    fn client(&self, operation: &str) -> Result<&SandboxClient> {
        if self.state == SessionState::Closed {
            return Err(CoreError::SessionClosed(self.session_id.clone()));
        }
        self.binding.as_ref().map(|b| &b.client).ok_or_else(|| {
            CoreError::operation_failed(operation, None, "session has no running sandbox")
        })
    }

    /// Invoke any tool exposed at `/tools/<operation>`.
    pub async fn call_tool<P, R>(&self, operation: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.client(operation)?.call(operation, params).await
    }

    /// Like [`call_tool`](Self::call_tool), aborting when `cancel` fires.
    pub async fn call_tool_with_cancel<P, R>(
        &self,
        operation: &str,
        params: &P,
        cancel: &CancellationToken,
    ) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.client(operation)?
            .call_until(operation, params, cancel)
            .await
    }

    /// List the tools the sandbox exposes.
    pub async fn list_tools(&self) -> Result<Value> {
        self.call_tool("list", &json!({})).await
    }

    /// Call a tool by name through the generic `/tools/call` endpoint.
    pub async fn call(&self, name: &str, args: &Value) -> Result<Value> {
        let args = serde_json::to_string(args)
            .map_err(|e| CoreError::operation_failed("call", None, e.to_string()))?;
        self.call_tool("call", &json!({ "name": name, "args": args }))
            .await
    }

    /// Run a cell in the sandbox's IPython kernel.
    pub async fn run_ipython_cell(&self, code: &str, split_output: bool) -> Result<ExecutionResult> {
        self.call_tool(
            "run_ipython_cell",
            &json!({ "code": code, "split_output": split_output }),
        )
        .await
    }

    /// Run a shell command.
    pub async fn run_shell_command(
        &self,
        command: &str,
        split_output: bool,
    ) -> Result<ExecutionResult> {
        self.call_tool(
            "run_shell_command",
            &json!({ "command": command, "split_output": split_output }),
        )
        .await
    }

    /// Read a file.
    pub async fn read_file(&self, path: &str) -> Result<Value> {
        self.call_tool("read_file", &json!({ "path": path })).await
    }

    /// Write a file, replacing existing content.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<Value> {
        self.call_tool("write_file", &json!({ "path": path, "content": content }))
            .await
    }

    /// Create a directory and any missing parents.
    pub async fn create_directory(&self, path: &str) -> Result<Value> {
        self.call_tool("create_directory", &json!({ "path": path }))
            .await
    }

    /// List a directory.
    pub async fn list_directory(&self, path: &str) -> Result<Value> {
        self.call_tool("list_directory", &json!({ "path": path }))
            .await
    }

    /// Move or rename a file.
    pub async fn move_file(&self, source: &str, destination: &str) -> Result<Value> {
        self.call_tool(
            "move_file",
            &json!({ "source_path": source, "destination_path": destination }),
        )
        .await
    }

    /// File metadata.
    pub async fn get_file_info(&self, path: &str) -> Result<Value> {
        self.call_tool("get_file_info", &json!({ "path": path }))
            .await
    }

    /// Liveness of the bound sandbox. False when closed or without a container.
    pub async fn is_healthy(&self) -> bool {
        match self.client("healthz") {
            Ok(client) => client.health_check().await,
            Err(_) => false,
        }
    }

    /// Detailed status from the sandbox.
    pub async fn health_status(&self) -> Result<Value> {
        self.client("health")?.health_status().await
    }

    /// Replace the container behind this session.
    ///
    /// The current client is closed and the old container removed before a
    /// new one is created with the same variant and session ID. If creation
    /// fails the session stays open without a container.
    ///
    /// # Errors
    ///
    /// - [`CoreError::SessionClosed`] if the session is closed
    /// - [`CoreError::SandboxRestartFailed`] if no new container could be created
    pub async fn restart(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(CoreError::SessionClosed(self.session_id.clone()));
        }

        let start = Instant::now();
        tracing::info!(session_id = %self.session_id, "Restarting session");
        self.unbind().await;

        let restarted = match self
            .manager
            .launch(self.session_id.clone(), self.variant, &CancellationToken::new())
            .await
        {
            Ok(record) => {
                let container_id = record.container_id.clone();
                match bind(&self.manager, record) {
                    Ok(binding) => Ok(binding),
                    Err(e) => {
                        self.manager
                            .remove_container(&self.session_id, &container_id)
                            .await;
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        };

        match restarted {
            Ok(binding) => {
                tracing::info!(
                    session_id = %self.session_id,
                    container_id = %binding.record.container_id.short(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Session restarted"
                );
                self.binding = Some(binding);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %e,
                    "Restart failed, session has no sandbox"
                );
                Err(CoreError::SandboxRestartFailed {
                    session_id: self.session_id.clone(),
                    source: Box::new(e),
                })
            }
        }
    }

    /// Close the session and remove its container. Idempotent.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.unbind().await;
        self.state = SessionState::Closed;
        self.claim = None;
        tracing::info!(session_id = %self.session_id, "Session closed");
    }

    /// Let go of the sandbox without removing it.
    ///
    /// The sandbox stays registered with the manager and keeps running; the
    /// session ID is freed and the session becomes `Closed`.
    pub fn detach(&mut self) -> Option<ContainerRecord> {
        self.state = SessionState::Closed;
        self.claim = None;
        self.binding.take().map(|binding| {
            binding.client.close();
            binding.record
        })
    }

    async fn unbind(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.client.close();
            self.manager
                .remove_container(&self.session_id, &binding.record.container_id)
                .await;
        }
    }
}

fn bind(manager: &SandboxManager, record: ContainerRecord) -> Result<Binding> {
    let client = SandboxClient::new(
        record.base_url.clone(),
        record.bearer_token.clone(),
        manager.config().request_timeout,
    )?;
    Ok(Binding { record, client })
}

impl Drop for SandboxSession {
    fn drop(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        let Binding { record, client } = binding;
        client.close();

        let session_id = self.session_id.clone();
        tracing::warn!(session_id = %session_id, "Session dropped while open, removing sandbox");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let manager = Arc::clone(&self.manager);
                handle.spawn(async move {
                    manager
                        .remove_container(&session_id, &record.container_id)
                        .await;
                });
            }
            Err(_) => {
                tracing::warn!(session_id = %session_id, "No runtime to remove sandbox, it will leak");
            }
        }
    }
}
