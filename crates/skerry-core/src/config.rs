//! Sandbox manager configuration.

use crate::error::CoreError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Mount point of the shared workspace inside every sandbox.
pub const WORKSPACE_DIR: &str = "/workspace";

/// Configuration for [`SandboxManager`](crate::SandboxManager).
///
/// The `Debug` output never shows the bearer token.
#[derive(Clone)]
pub struct ManagerConfig {
    /// Prefix for container names (default: `runtime_sandbox_container_`).
    pub container_prefix: String,
    /// Lowest host port handed to sandboxes (inclusive).
    pub port_min: u16,
    /// Highest host port handed to sandboxes (inclusive).
    pub port_max: u16,
    /// Shared secret passed to every sandbox and sent as a bearer token.
    pub bearer_token: Option<String>,
    /// Host directory mounted at `/workspace`.
    pub mount_dir: Option<PathBuf>,
    /// Extra environment variables for every sandbox.
    pub extra_env: BTreeMap<String, String>,
    /// Remove every sandbox on shutdown (default: true).
    pub auto_cleanup: bool,
    /// Readiness inspections before giving up (default: 30).
    pub readiness_attempts: u32,
    /// Sleep between readiness inspections (default: 1s).
    pub readiness_interval: Duration,
    /// Extra wait once the container is running (default: 1s).
    pub readiness_grace: Duration,
    /// Grace period given to `stop` before the engine kills (default: 10s).
    pub stop_timeout: Duration,
    /// Overall deadline for creating one sandbox.
    pub create_timeout: Option<Duration>,
    /// Timeout for one call to the in-container service (default: 120s).
    pub request_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            container_prefix: "runtime_sandbox_container_".to_string(),
            port_min: 49152,
            port_max: 59999,
            bearer_token: None,
            mount_dir: None,
            extra_env: BTreeMap::new(),
            auto_cleanup: true,
            readiness_attempts: 30,
            readiness_interval: Duration::from_secs(1),
            readiness_grace: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(10),
            create_timeout: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("container_prefix", &self.container_prefix)
            .field("port_min", &self.port_min)
            .field("port_max", &self.port_max)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("mount_dir", &self.mount_dir)
            .field("extra_env", &self.extra_env)
            .field("auto_cleanup", &self.auto_cleanup)
            .field("readiness_attempts", &self.readiness_attempts)
            .field("readiness_interval", &self.readiness_interval)
            .field("readiness_grace", &self.readiness_grace)
            .field("stop_timeout", &self.stop_timeout)
            .field("create_timeout", &self.create_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ManagerConfig {
    /// Create a new config builder.
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.port_min == 0 || self.port_min > self.port_max {
            return Err(CoreError::InvalidConfig(format!(
                "port range {}-{} is empty",
                self.port_min, self.port_max
            )));
        }
        if self.readiness_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "readiness_attempts must be > 0".into(),
            ));
        }
        if let Some(key) = self
            .extra_env
            .keys()
            .find(|k| k.is_empty() || k.contains('='))
        {
            return Err(CoreError::InvalidConfig(format!(
                "invalid environment variable name: {key:?}"
            )));
        }
        Ok(())
    }
}

/// Builder for ManagerConfig.
#[derive(Debug, Default)]
pub struct ManagerConfigBuilder {
    config: ManagerConfig,
}

impl ManagerConfigBuilder {
    /// Set the container name prefix.
    pub fn container_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.container_prefix = prefix.into();
        self
    }

    /// Set the inclusive host port range.
    pub fn port_range(mut self, min: u16, max: u16) -> Self {
        self.config.port_min = min;
        self.config.port_max = max;
        self
    }

    /// Set the shared bearer token.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config.bearer_token = Some(token.into());
        self
    }

    /// Mount a host directory at `/workspace`.
    pub fn mount_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.mount_dir = Some(dir.into());
        self
    }

    /// Add an extra environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.extra_env.insert(key.into(), value.into());
        self
    }

    /// Enable or disable cleanup on shutdown.
    pub fn auto_cleanup(mut self, enabled: bool) -> Self {
        self.config.auto_cleanup = enabled;
        self
    }

    /// Tune readiness polling.
    pub fn readiness(mut self, attempts: u32, interval: Duration, grace: Duration) -> Self {
        self.config.readiness_attempts = attempts;
        self.config.readiness_interval = interval;
        self.config.readiness_grace = grace;
        self
    }

    /// Set the stop grace period.
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    /// Bound the total time spent creating one sandbox.
    pub fn create_timeout(mut self, timeout: Duration) -> Self {
        self.config.create_timeout = Some(timeout);
        self
    }

    /// Set the per-request timeout for calls into a sandbox.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<ManagerConfig, CoreError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.container_prefix, "runtime_sandbox_container_");
        assert_eq!(config.readiness_attempts, 30);
        assert_eq!(config.readiness_interval, Duration::from_secs(1));
        assert_eq!(config.stop_timeout, Duration::from_secs(10));
        assert!(config.auto_cleanup);
        assert!(config.bearer_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_success() {
        let config = ManagerConfig::builder()
            .port_range(20000, 20100)
            .bearer_token("secret")
            .mount_dir("/srv/sandboxes")
            .env("HTTP_PROXY", "http://proxy:3128")
            .readiness(5, Duration::from_millis(10), Duration::ZERO)
            .create_timeout(Duration::from_secs(60))
            .build()
            .expect("should build successfully");

        assert_eq!((config.port_min, config.port_max), (20000, 20100));
        assert_eq!(config.bearer_token.as_deref(), Some("secret"));
        assert_eq!(config.mount_dir, Some(PathBuf::from("/srv/sandboxes")));
        assert_eq!(config.extra_env["HTTP_PROXY"], "http://proxy:3128");
        assert_eq!(config.readiness_attempts, 5);
        assert_eq!(config.create_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_debug_hides_token() {
        let config = ManagerConfig::builder()
            .bearer_token("s3cr3t-token")
            .build()
            .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cr3t-token"));
        assert!(debug.contains("bearer_token: Some(\"<redacted>\")"));

        let builder = format!("{:?}", ManagerConfig::builder().bearer_token("s3cr3t-token"));
        assert!(!builder.contains("s3cr3t-token"));
    }

    #[test]
    fn test_builder_validation_bad_range() {
        let result = ManagerConfig::builder().port_range(3000, 2000).build();
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_validation_zero_attempts() {
        let result = ManagerConfig::builder()
            .readiness(0, Duration::ZERO, Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_validation_bad_env_key() {
        let result = ManagerConfig::builder().env("A=B", "c").build();
        assert!(result.is_err());
    }
}
