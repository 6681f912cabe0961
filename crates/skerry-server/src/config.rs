//! Configuration for the Skerry server.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use skerry_core::{CoreError, ManagerConfig};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Configuration for the Skerry server.
#[derive(Clone)]
pub struct ServerConfig {
    /// Prefix for container names.
    pub container_prefix: String,

    /// Inclusive host port range handed to sandboxes.
    pub port_range: (u16, u16),

    /// Shared secret for the in-sandbox tool servers.
    pub bearer_token: Option<String>,

    /// Host directory mounted at `/workspace` in every sandbox.
    pub mount_dir: Option<PathBuf>,

    /// Extra environment variables for every sandbox.
    pub docker_env: BTreeMap<String, String>,

    /// Remove all sandboxes on shutdown (default: true).
    pub auto_cleanup: bool,

    /// Container engine address; local defaults when unset.
    pub docker_host: Option<String>,

    /// Readiness inspections per sandbox (default: 30).
    pub ready_attempts: u32,

    /// HTTP server bind address.
    pub http_addr: SocketAddr,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("container_prefix", &self.container_prefix)
            .field("port_range", &self.port_range)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("mount_dir", &self.mount_dir)
            .field("docker_env", &self.docker_env)
            .field("auto_cleanup", &self.auto_cleanup)
            .field("docker_host", &self.docker_host)
            .field("ready_attempts", &self.ready_attempts)
            .field("http_addr", &self.http_addr)
            .finish()
    }
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("mount directory not found: {0}")]
    MissingMountDir(PathBuf),

    #[error(transparent)]
    Manager(#[from] CoreError),
}

impl Default for ServerConfig {
    fn default() -> Self {
        let manager = ManagerConfig::default();
        Self {
            container_prefix: manager.container_prefix,
            port_range: (manager.port_min, manager.port_max),
            bearer_token: None,
            mount_dir: None,
            docker_env: BTreeMap::new(),
            auto_cleanup: manager.auto_cleanup,
            docker_host: None,
            ready_attempts: manager.readiness_attempts,
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8080),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SKERRY_CONTAINER_PREFIX` | `runtime_sandbox_container_` |
    /// | `SKERRY_PORT_RANGE` | `49152-59999` |
    /// | `SKERRY_BEARER_TOKEN` | unset |
    /// | `SKERRY_MOUNT_DIR` | unset |
    /// | `SKERRY_DOCKER_ENV` | unset (`K=V,K2=V2`) |
    /// | `SKERRY_AUTO_CLEANUP` | `true` |
    /// | `SKERRY_DOCKER_HOST` | local defaults |
    /// | `SKERRY_READY_ATTEMPTS` | `30` |
    /// | `SKERRY_HTTP_HOST` | `0.0.0.0` |
    /// | `SKERRY_HTTP_PORT` | `8080` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        let http_host: IpAddr = var("SKERRY_HTTP_HOST")
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.http_addr.ip());

        let http_port: u16 = var("SKERRY_HTTP_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.http_addr.port());

        let port_range = match var("SKERRY_PORT_RANGE") {
            Some(raw) => parse_port_range(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Ignoring malformed SKERRY_PORT_RANGE");
                default.port_range
            }),
            None => default.port_range,
        };

        Self {
            container_prefix: var("SKERRY_CONTAINER_PREFIX").unwrap_or(default.container_prefix),
            port_range,
            bearer_token: var("SKERRY_BEARER_TOKEN").filter(|t| !t.is_empty()),
            mount_dir: var("SKERRY_MOUNT_DIR")
                .filter(|d| !d.is_empty())
                .map(PathBuf::from),
            docker_env: var("SKERRY_DOCKER_ENV")
                .map(|v| parse_env_list(&v))
                .unwrap_or_default(),
            auto_cleanup: var("SKERRY_AUTO_CLEANUP")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(default.auto_cleanup),
            docker_host: var("SKERRY_DOCKER_HOST").filter(|h| !h.is_empty()),
            ready_attempts: var("SKERRY_READY_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.ready_attempts),
            http_addr: SocketAddr::new(http_host, http_port),
        }
    }

    /// Build the sandbox manager configuration.
    pub fn manager_config(&self) -> Result<ManagerConfig, ConfigError> {
        let mut builder = ManagerConfig::builder()
            .container_prefix(&self.container_prefix)
            .port_range(self.port_range.0, self.port_range.1)
            .auto_cleanup(self.auto_cleanup);

        let defaults = ManagerConfig::default();
        builder = builder.readiness(
            self.ready_attempts,
            defaults.readiness_interval,
            defaults.readiness_grace,
        );
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_token(token);
        }
        if let Some(dir) = &self.mount_dir {
            builder = builder.mount_dir(dir);
        }
        for (key, value) in &self.docker_env {
            builder = builder.env(key, value);
        }

        Ok(builder.build()?)
    }

    /// Validate the configuration.
    ///
    /// Call this at startup to get clear error messages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.mount_dir {
            if !dir.is_dir() {
                return Err(ConfigError::MissingMountDir(dir.clone()));
            }
        }
        self.manager_config().map(|_| ())
    }
}

/// Parse `min-max` into an inclusive range.
fn parse_port_range(raw: &str) -> Option<(u16, u16)> {
    let (min, max) = raw.split_once('-')?;
    Some((min.trim().parse().ok()?, max.trim().parse().ok()?))
}

/// Parse `K=V,K2=V2`. Entries without `=` are skipped.
fn parse_env_list(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Some((key.to_string(), value.to_string())),
            _ => {
                tracing::warn!(entry, "Ignoring malformed SKERRY_DOCKER_ENV entry");
                None
            }
        })
        .collect()
}
