//! Docker implementation of [`ContainerRuntime`] using `bollard`.

use crate::error::{Result, RuntimeError};
use crate::runtime::{ContainerId, ContainerRuntime, ContainerStatus};
use crate::spec::ContainerSpec;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::models::{HostConfig, Mount, MountTypeEnum, PortBinding as DockerPortBinding};
use bollard::Docker;
use std::collections::HashMap;
use std::time::Duration;

/// Seconds bollard waits on a single engine request.
const ENGINE_TIMEOUT_SECS: u64 = 120;

/// Container runtime backed by a Docker engine.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the engine.
    ///
    /// `host` accepts `unix:///path/to/docker.sock`, `tcp://host:port` or
    /// `http://host:port`. With `None` the local defaults are used
    /// (`DOCKER_HOST`, then the platform socket).
    ///
    /// The connection is verified with a ping.
    pub async fn connect(host: Option<&str>) -> Result<Self> {
        let docker = match host {
            None => Docker::connect_with_local_defaults(),
            Some(h) if h.starts_with("unix://") => {
                Docker::connect_with_unix(h, ENGINE_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            Some(h) => {
                let addr = h.replacen("tcp://", "http://", 1);
                Docker::connect_with_http(&addr, ENGINE_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
        }
        .map_err(|e| RuntimeError::Unavailable(format!("failed to connect to Docker: {e}")))?;

        let runtime = Self { docker };
        runtime.ping().await?;
        tracing::info!(host = host.unwrap_or("local defaults"), "Connected to Docker engine");
        Ok(runtime)
    }

    /// Wrap an existing bollard client without pinging it.
    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }

    fn host_config(spec: &ContainerSpec) -> HostConfig {
        let mounts = spec
            .mounts
            .iter()
            .map(|m| Mount {
                typ: Some(MountTypeEnum::BIND),
                source: Some(m.host_path.to_string_lossy().into_owned()),
                target: Some(m.container_path.clone()),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect::<Vec<_>>();

        let port_bindings = spec
            .ports
            .iter()
            .map(|p| {
                (
                    format!("{}/tcp", p.container_port),
                    Some(vec![DockerPortBinding {
                        host_ip: None,
                        host_port: Some(p.host_port.to_string()),
                    }]),
                )
            })
            .collect::<HashMap<_, _>>();

        HostConfig {
            mounts: (!mounts.is_empty()).then_some(mounts),
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            network_mode: Some(spec.network_mode.clone()),
            ..Default::default()
        }
    }
}

/// Classify a bollard error: connection problems mean the engine is unavailable,
/// anything the engine answered is an operation failure.
fn classify(operation: &'static str, err: bollard::errors::Error) -> RuntimeError {
    use bollard::errors::Error;
    match err {
        Error::DockerResponseServerError {
            status_code,
            message,
        } => RuntimeError::operation(operation, format!("{status_code}: {message}")),
        Error::IOError { .. }
        | Error::HyperResponseError { .. }
        | Error::RequestTimeoutError
        | Error::SocketNotFoundError(_) => RuntimeError::Unavailable(err.to_string()),
        other => RuntimeError::operation(operation, other.to_string()),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        spec.validate()?;

        let exposed_ports = spec
            .ports
            .iter()
            .map(|p| (format!("{}/tcp", p.container_port), HashMap::new()))
            .collect::<HashMap<_, _>>();

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            labels: Some(spec.labels.clone().into_iter().collect()),
            host_config: Some(Self::host_config(spec)),
            ..Default::default()
        };

        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("skerry-{}", uuid::Uuid::new_v4()));
        tracing::debug!(name = %name, image = %spec.image, ports = spec.ports.len(), "Creating container");

        let response = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(|e| classify("create", e))?;

        for warning in &response.warnings {
            tracing::warn!(name = %name, warning = %warning, "Docker create warning");
        }

        Ok(ContainerId::new(response.id))
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        tracing::debug!(container_id = %id.short(), "Starting container");
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| classify("start", e))
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerStatus> {
        let info = self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| classify("inspect", e))?;

        let state = info.state.unwrap_or_default();
        Ok(ContainerStatus {
            running: state.running.unwrap_or(false),
            status: state.status.map(|s| s.to_string()),
        })
    }

    async fn stop(&self, id: &ContainerId, timeout: Duration) -> Result<()> {
        tracing::debug!(container_id = %id.short(), timeout_secs = timeout.as_secs(), "Stopping container");
        self.docker
            .stop_container(
                id.as_str(),
                Some(StopContainerOptions {
                    t: timeout.as_secs() as i64,
                }),
            )
            .await
            .map_err(|e| classify("stop", e))
    }

    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()> {
        tracing::debug!(container_id = %id.short(), force, "Removing container");
        self.docker
            .remove_container(
                id.as_str(),
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| classify("remove", e))
    }

    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Unavailable(format!("Docker ping failed: {e}")))
    }
}
