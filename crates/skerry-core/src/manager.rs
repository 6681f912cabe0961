//! Sandbox manager for lifecycle management of container sandboxes.

use crate::config::{ManagerConfig, WORKSPACE_DIR};
use crate::error::{CoreError, Result};
use crate::ports::PortAllocator;
use crate::record::{base_url_for, ContainerRecord, SessionId};
use crate::registry::SandboxRegistry;
use crate::session::SandboxSession;
use crate::variant::SandboxVariant;
use chrono::Utc;
use dashmap::DashSet;
use futures::future::join_all;
use rand::Rng;
use skerry_runtime::{ContainerId, ContainerRuntime, ContainerSpec};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Label attached to every container this manager creates.
pub const MANAGED_BY_LABEL: (&str, &str) = ("managed-by", "skerry");

/// Label key carrying the owning session ID.
pub const SESSION_LABEL: &str = "skerry.session";

/// Creates, tracks and removes sandbox containers.
///
/// The manager owns the port pool and the registry of live sandboxes. It is
/// shared as an `Arc<SandboxManager>`; every method takes `&self` and no
/// lock is held across container engine calls.
///
/// # Thread Safety
///
/// Port reservation and registration are atomic per port and per session,
/// so concurrent creations never share a host port and a session ID maps to
/// at most one live container. A session ID held by an open
/// [`SandboxSession`] stays reserved until that handle is closed, detached
/// or dropped, even while it has no container.
pub struct SandboxManager {
    config: ManagerConfig,
    runtime: Arc<dyn ContainerRuntime>,
    ports: Arc<PortAllocator>,
    registry: SandboxRegistry,
    claims: DashSet<SessionId>,
}

impl std::fmt::Debug for SandboxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxManager")
            .field("config", &self.config)
            .field("ports", &self.ports)
            .field("sandboxes", &self.registry.len())
            .field("sessions", &self.claims.len())
            .finish()
    }
}

impl SandboxManager {
    /// Create a new manager on top of a container runtime.
    pub fn new(config: ManagerConfig, runtime: Arc<dyn ContainerRuntime>) -> Result<Self> {
        config.validate()?;
        let ports = PortAllocator::new(config.port_min, config.port_max)?;
        tracing::info!(
            port_min = config.port_min,
            port_max = config.port_max,
            prefix = %config.container_prefix,
            "Creating sandbox manager"
        );
        Ok(Self {
            config,
            runtime,
            ports: Arc::new(ports),
            registry: SandboxRegistry::new(),
            claims: DashSet::new(),
        })
    }

    /// Get the manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The host port pool.
    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    /// Create a sandbox for `session_id` and wait until it is ready.
    ///
    /// The call is abandoned when `cancel` fires or the configured creation
    /// deadline passes. On any failure the reserved ports are released and a
    /// partially created container is removed before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`CoreError::SessionExists`] if the session already has a live sandbox
    ///   or is held by an open session handle
    /// - [`CoreError::SandboxCreationFailed`] wrapping the step that failed
    pub async fn create_sandbox(
        &self,
        session_id: SessionId,
        variant: SandboxVariant,
        cancel: &CancellationToken,
    ) -> Result<ContainerRecord> {
        if self.claims.contains(&session_id) {
            return Err(CoreError::SessionExists(session_id));
        }
        self.launch(session_id, variant, cancel).await
    }

    /// Create a sandbox without consulting session claims.
    ///
    /// Used by the handle that holds the claim for `session_id`.
    pub(crate) async fn launch(
        &self,
        session_id: SessionId,
        variant: SandboxVariant,
        cancel: &CancellationToken,
    ) -> Result<ContainerRecord> {
        if self.registry.contains(&session_id) {
            return Err(CoreError::SessionExists(session_id));
        }

        let start = Instant::now();
        tracing::info!(session_id = %session_id, variant = %variant, "Creating sandbox");

        let mut reservation = Reservation::new(Arc::clone(&self.ports), Arc::clone(&self.runtime));
        let limit = self.config.create_timeout;
        let deadline = async move {
            match limit {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            result = self.provision(&session_id, variant, &mut reservation) => result,
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
            limit = deadline => Err(CoreError::DeadlineExceeded(limit)),
        };

        let failure = match outcome {
            Ok(record) => match self.registry.insert_new(record.clone()) {
                Ok(()) => {
                    reservation.disarm();
                    tracing::info!(
                        session_id = %session_id,
                        container_id = %record.container_id.short(),
                        base_url = %record.base_url,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Sandbox ready"
                    );
                    return Ok(record);
                }
                Err(_) => CoreError::SessionExists(session_id.clone()),
            },
            Err(e) => e,
        };

        tracing::warn!(
            session_id = %session_id,
            error = %failure,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sandbox creation failed, rolling back"
        );
        reservation.rollback().await;

        Err(CoreError::SandboxCreationFailed {
            session_id,
            source: Box::new(failure),
        })
    }

    async fn provision(
        &self,
        session_id: &SessionId,
        variant: SandboxVariant,
        reservation: &mut Reservation,
    ) -> Result<ContainerRecord> {
        let ports = self.ports.allocate(variant.ports().len())?;
        reservation.ports = ports.clone();
        tracing::debug!(session_id = %session_id, ?ports, "Ports reserved");

        let spec = self.container_spec(session_id, variant, &ports)?;
        let container_id = self.runtime.create(&spec).await?;
        reservation.container = Some(container_id.clone());
        tracing::debug!(
            session_id = %session_id,
            container_id = %container_id.short(),
            "Container created"
        );

        self.runtime.start(&container_id).await?;
        tracing::debug!(session_id = %session_id, "Container started");

        self.wait_ready(&container_id).await?;

        Ok(ContainerRecord {
            session_id: session_id.clone(),
            container_id,
            base_url: base_url_for(ports[0]),
            ports,
            bearer_token: self.config.bearer_token.clone(),
            variant,
            created_at: Utc::now(),
        })
    }

    fn container_spec(
        &self,
        session_id: &SessionId,
        variant: SandboxVariant,
        ports: &[u16],
    ) -> Result<ContainerSpec> {
        let suffix: u32 = rand::thread_rng().gen();
        let mut builder = ContainerSpec::builder(variant.image())
            .name(format!(
                "{}{}-{:08x}",
                self.config.container_prefix, session_id, suffix
            ))
            .env("SESSION_ID", session_id)
            .env("WORKSPACE_DIR", WORKSPACE_DIR)
            .envs(&self.config.extra_env)
            .label(MANAGED_BY_LABEL.0, MANAGED_BY_LABEL.1)
            .label(SESSION_LABEL, session_id.as_str())
            .network_mode("bridge");

        if let Some(token) = &self.config.bearer_token {
            builder = builder.env("SECRET_TOKEN", token);
        }
        if variant == SandboxVariant::Browser {
            if let Some(port) = ports.get(1) {
                builder = builder.env("DOMAIN", format!("localhost:{port}"));
            }
        }
        if let Some(dir) = &self.config.mount_dir {
            builder = builder.bind_mount(dir, WORKSPACE_DIR, false);
        }
        for (host_port, container_port) in ports.iter().zip(variant.ports()) {
            builder = builder.publish(*host_port, *container_port);
        }

        Ok(builder.build()?)
    }

    /// Poll the engine until the container runs or attempts run out.
    ///
    /// Inspect failures count as attempts. Dropping the future stops polling.
    async fn wait_ready(&self, container_id: &ContainerId) -> Result<()> {
        let attempts = self.config.readiness_attempts;
        for attempt in 1..=attempts {
            match self.runtime.inspect(container_id).await {
                Ok(status) if status.running => {
                    tracing::debug!(
                        container_id = %container_id.short(),
                        attempt,
                        "Container running"
                    );
                    tokio::time::sleep(self.config.readiness_grace).await;
                    return Ok(());
                }
                Ok(status) => {
                    tracing::trace!(
                        container_id = %container_id.short(),
                        attempt,
                        status = ?status.status,
                        "Container not running yet"
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        container_id = %container_id.short(),
                        attempt,
                        error = %e,
                        "Inspect failed"
                    );
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.readiness_interval).await;
            }
        }
        Err(CoreError::SandboxNotReady { attempts })
    }

    /// Remove a session's sandbox.
    ///
    /// Engine failures are logged and swallowed; the record is unregistered
    /// and its ports released regardless. Returns whether a record existed.
    pub async fn remove_sandbox(&self, session_id: &SessionId) -> bool {
        let Some(record) = self.registry.remove(session_id) else {
            tracing::debug!(session_id = %session_id, "No sandbox to remove");
            return false;
        };
        self.teardown(record).await;
        true
    }

    /// Remove a session's sandbox only if it is still `container_id`.
    ///
    /// A sandbox that has since been replaced under the same session ID is
    /// left alone. Returns whether anything was removed.
    pub async fn remove_container(
        &self,
        session_id: &SessionId,
        container_id: &ContainerId,
    ) -> bool {
        let Some(record) = self
            .registry
            .remove_if(session_id, |record| record.container_id == *container_id)
        else {
            tracing::debug!(
                session_id = %session_id,
                container_id = %container_id.short(),
                "Container no longer registered, nothing to remove"
            );
            return false;
        };
        self.teardown(record).await;
        true
    }

    async fn teardown(&self, record: ContainerRecord) {
        let session_id = &record.session_id;
        let container_id = &record.container_id;
        if let Err(e) = self.runtime.stop(container_id, self.config.stop_timeout).await {
            tracing::warn!(
                session_id = %session_id,
                container_id = %container_id.short(),
                error = %e,
                "Failed to stop container"
            );
        }
        if let Err(e) = self.runtime.remove(container_id, true).await {
            tracing::warn!(
                session_id = %session_id,
                container_id = %container_id.short(),
                error = %e,
                "Failed to remove container"
            );
        }
        self.ports.release(&record.ports);

        tracing::info!(session_id = %session_id, "Sandbox removed");
    }

    /// Get a copy of a session's record.
    pub fn get_sandbox(&self, session_id: &SessionId) -> Option<ContainerRecord> {
        self.registry.get(session_id)
    }

    /// Snapshot of every live sandbox.
    pub fn list_sandboxes(&self) -> HashMap<SessionId, ContainerRecord> {
        self.registry.snapshot()
    }

    /// Number of live sandboxes.
    pub fn count(&self) -> usize {
        self.registry.len()
    }

    /// Whether an open session handle holds `session_id`.
    pub fn has_open_session(&self, session_id: &SessionId) -> bool {
        self.claims.contains(session_id)
    }

    /// Remove every live sandbox.
    ///
    /// Removals run concurrently; failures are logged and do not stop the
    /// others.
    pub async fn cleanup_all(&self) {
        let ids = self.registry.session_ids();
        let count = ids.len();
        tracing::info!(count, "Removing all sandboxes");

        join_all(ids.iter().map(|id| self.remove_sandbox(id))).await;

        tracing::info!(count, "All sandboxes removed");
    }

    /// Create a sandbox under a fresh session ID and wrap it in a session.
    pub async fn open_session(self: &Arc<Self>, variant: SandboxVariant) -> Result<SandboxSession> {
        self.open_session_with_id(SessionId::generate(), variant).await
    }

    /// Create a sandbox for a caller-chosen session ID and wrap it in a session.
    ///
    /// # Errors
    ///
    /// - [`CoreError::SessionExists`] if another open handle holds the ID or
    ///   the ID already has a live sandbox
    /// - [`CoreError::SandboxCreationFailed`] wrapping the step that failed
    pub async fn open_session_with_id(
        self: &Arc<Self>,
        session_id: SessionId,
        variant: SandboxVariant,
    ) -> Result<SandboxSession> {
        let claim = self
            .claim(&session_id)
            .ok_or_else(|| CoreError::SessionExists(session_id.clone()))?;
        let record = self
            .launch(session_id, variant, &CancellationToken::new())
            .await?;
        SandboxSession::attach(Arc::clone(self), record, claim).await
    }

    fn claim(self: &Arc<Self>, session_id: &SessionId) -> Option<SessionClaim> {
        self.claims.insert(session_id.clone()).then(|| SessionClaim {
            manager: Arc::clone(self),
            session_id: session_id.clone(),
        })
    }
}

/// An open session's hold on its ID. Dropping it frees the ID.
pub(crate) struct SessionClaim {
    manager: Arc<SandboxManager>,
    session_id: SessionId,
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        self.manager.claims.remove(&self.session_id);
    }
}

/// Resources held by an in-progress creation.
///
/// Dropping an armed reservation releases its ports and schedules removal of
/// the partially created container.
struct Reservation {
    allocator: Arc<PortAllocator>,
    runtime: Arc<dyn ContainerRuntime>,
    ports: Vec<u16>,
    container: Option<ContainerId>,
}

impl Reservation {
    fn new(allocator: Arc<PortAllocator>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            allocator,
            runtime,
            ports: Vec::new(),
            container: None,
        }
    }

    /// Hand ownership of the resources to the registry.
    fn disarm(mut self) {
        self.ports.clear();
        self.container = None;
    }

    /// Remove the container and release the ports.
    async fn rollback(mut self) {
        if let Some(id) = self.container.take() {
            if let Err(e) = self.runtime.remove(&id, true).await {
                tracing::warn!(
                    container_id = %id.short(),
                    error = %e,
                    "Failed to remove container during rollback"
                );
            }
        }
        self.allocator.release(&std::mem::take(&mut self.ports));
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.ports.is_empty() {
            self.allocator.release(&std::mem::take(&mut self.ports));
        }
        let Some(id) = self.container.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let runtime = Arc::clone(&self.runtime);
                handle.spawn(async move {
                    if let Err(e) = runtime.remove(&id, true).await {
                        tracing::warn!(
                            container_id = %id.short(),
                            error = %e,
                            "Failed to remove abandoned container"
                        );
                    }
                });
            }
            Err(_) => {
                tracing::warn!(container_id = %id.short(), "Abandoned container left running");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use skerry_runtime::{ContainerStatus, RuntimeError};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records specs and never reports the container as running.
    #[derive(Default)]
    struct SpecRecorder {
        specs: Mutex<Vec<ContainerSpec>>,
    }

    #[async_trait]
    impl ContainerRuntime for SpecRecorder {
        async fn create(&self, spec: &ContainerSpec) -> skerry_runtime::Result<ContainerId> {
            self.specs.lock().unwrap().push(spec.clone());
            Ok(ContainerId::new("c0ffee"))
        }
        async fn start(&self, _id: &ContainerId) -> skerry_runtime::Result<()> {
            Ok(())
        }
        async fn inspect(&self, _id: &ContainerId) -> skerry_runtime::Result<ContainerStatus> {
            Err(RuntimeError::operation("inspect", "no such container"))
        }
        async fn stop(&self, _id: &ContainerId, _t: Duration) -> skerry_runtime::Result<()> {
            Ok(())
        }
        async fn remove(&self, _id: &ContainerId, _force: bool) -> skerry_runtime::Result<()> {
            Ok(())
        }
        async fn ping(&self) -> skerry_runtime::Result<()> {
            Ok(())
        }
    }

    fn manager(config: ManagerConfig) -> SandboxManager {
        SandboxManager::new(config, Arc::new(SpecRecorder::default())).unwrap()
    }

    #[test]
    fn test_container_spec_env_and_mounts() {
        let config = ManagerConfig::builder()
            .port_range(20000, 20100)
            .bearer_token("secret")
            .mount_dir("/srv/work")
            .env("TZ", "UTC")
            .build()
            .unwrap();
        let manager = manager(config);
        let session = SessionId::from("s1");

        let spec = manager
            .container_spec(&session, SandboxVariant::Browser, &[20001, 20002, 20003, 20004])
            .unwrap();

        assert_eq!(spec.image, "agentruntime/sandbox:browser");
        assert_eq!(spec.env_var("SESSION_ID"), Some("s1"));
        assert_eq!(spec.env_var("SECRET_TOKEN"), Some("secret"));
        assert_eq!(spec.env_var("WORKSPACE_DIR"), Some("/workspace"));
        assert_eq!(spec.env_var("TZ"), Some("UTC"));
        assert_eq!(spec.env_var("DOMAIN"), Some("localhost:20002"));
        assert_eq!(spec.mounts.len(), 1);
        assert_eq!(spec.mounts[0].container_path, "/workspace");
        assert!(!spec.mounts[0].read_only);
        assert_eq!(spec.ports.len(), 4);
        assert_eq!(spec.ports[2].host_port, 20003);
        assert_eq!(spec.ports[2].container_port, 3000);
        assert_eq!(spec.labels.get("managed-by").map(String::as_str), Some("skerry"));
        assert_eq!(spec.network_mode, "bridge");

        let name = spec.name.unwrap();
        assert!(name.starts_with("runtime_sandbox_container_s1-"), "{name}");
        assert_eq!(name.len(), "runtime_sandbox_container_s1-".len() + 8);
    }

    #[test]
    fn test_container_spec_minimal() {
        let manager = manager(ManagerConfig::default());
        let spec = manager
            .container_spec(&SessionId::from("s2"), SandboxVariant::Base, &[50000])
            .unwrap();

        assert!(spec.env_var("SECRET_TOKEN").is_none());
        assert!(spec.env_var("DOMAIN").is_none());
        assert!(spec.mounts.is_empty());
        assert_eq!(spec.ports.len(), 1);
        assert_eq!(spec.ports[0].container_port, 8000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_failure_releases_ports() {
        let config = ManagerConfig::builder()
            .port_range(20000, 20010)
            .readiness(3, Duration::from_secs(1), Duration::from_secs(1))
            .build()
            .unwrap();
        let manager = manager(config);

        let err = manager
            .create_sandbox(
                SessionId::from("s1"),
                SandboxVariant::Base,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err.root_cause(),
            CoreError::SandboxNotReady { attempts: 3 }
        ));
        assert_eq!(manager.ports().occupied_count(), 0);
        assert_eq!(manager.count(), 0);
    }

    #[tokio::test]
    async fn test_remove_unknown_session() {
        let manager = manager(ManagerConfig::default());
        assert!(!manager.remove_sandbox(&SessionId::from("missing")).await);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ManagerConfig {
            readiness_attempts: 0,
            ..ManagerConfig::default()
        };
        assert!(SandboxManager::new(config, Arc::new(SpecRecorder::default())).is_err());
    }
}
