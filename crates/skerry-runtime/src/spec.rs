//! Container specification and its builder.

use crate::error::{Result, RuntimeError};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A host directory bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    /// Directory on the host.
    pub host_path: PathBuf,
    /// Mount point inside the container.
    pub container_path: String,
    /// Mount read-only.
    pub read_only: bool,
}

/// A TCP port published from the container to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortBinding {
    /// Port on the host.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
}

/// Everything the engine needs to create one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Image reference, e.g. `agentruntime/sandbox:base`.
    pub image: String,
    /// Container name. The engine picks one when unset.
    pub name: Option<String>,
    /// Environment as `KEY=VALUE` strings.
    pub env: Vec<String>,
    /// Bind mounts.
    pub mounts: Vec<BindMount>,
    /// Published TCP ports.
    pub ports: Vec<PortBinding>,
    /// Container labels.
    pub labels: BTreeMap<String, String>,
    /// Network mode (default: `bridge`).
    pub network_mode: String,
}

impl Default for ContainerSpec {
    fn default() -> Self {
        Self {
            image: String::new(),
            name: None,
            env: Vec::new(),
            mounts: Vec::new(),
            ports: Vec::new(),
            labels: BTreeMap::new(),
            network_mode: "bridge".to_string(),
        }
    }
}

impl ContainerSpec {
    /// Create a new spec builder for the given image.
    pub fn builder(image: impl Into<String>) -> ContainerSpecBuilder {
        ContainerSpecBuilder {
            spec: ContainerSpec {
                image: image.into(),
                ..Default::default()
            },
        }
    }

    /// Validate the spec.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(RuntimeError::InvalidSpec("image is required".into()));
        }
        if let Some(bad) = self.env.iter().find(|e| !e.contains('=')) {
            return Err(RuntimeError::InvalidSpec(format!(
                "environment entry must be KEY=VALUE: {bad}"
            )));
        }
        if let Some(bad) = self
            .ports
            .iter()
            .find(|p| p.host_port == 0 || p.container_port == 0)
        {
            return Err(RuntimeError::InvalidSpec(format!(
                "port binding uses port 0: {} -> {}",
                bad.host_port, bad.container_port
            )));
        }
        Ok(())
    }

    /// Look up an environment variable by key.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().find_map(|entry| {
            entry
                .split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }
}

/// Fluent builder for [`ContainerSpec`].
#[derive(Debug, Clone)]
pub struct ContainerSpecBuilder {
    spec: ContainerSpec,
}

impl ContainerSpecBuilder {
    /// Set the container name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.spec.name = Some(name.into());
        self
    }

    /// Add one environment variable.
    pub fn env(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.spec.env.push(format!("{key}={value}"));
        self
    }

    /// Add every pair from an iterator of environment variables.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.spec.env.extend(
            vars.into_iter()
                .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref())),
        );
        self
    }

    /// Bind-mount a host directory.
    pub fn bind_mount(
        mut self,
        host_path: impl Into<PathBuf>,
        container_path: impl Into<String>,
        read_only: bool,
    ) -> Self {
        self.spec.mounts.push(BindMount {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only,
        });
        self
    }

    /// Publish a container TCP port on a host port.
    pub fn publish(mut self, host_port: u16, container_port: u16) -> Self {
        self.spec.ports.push(PortBinding {
            host_port,
            container_port,
        });
        self
    }

    /// Attach a label.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.labels.insert(key.into(), value.into());
        self
    }

    /// Set the network mode.
    pub fn network_mode(mut self, mode: impl Into<String>) -> Self {
        self.spec.network_mode = mode.into();
        self
    }

    /// Build the spec, validating it.
    pub fn build(self) -> Result<ContainerSpec> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}
