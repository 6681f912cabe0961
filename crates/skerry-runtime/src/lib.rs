//! # skerry-runtime
//!
//! Container runtime adapter for Skerry sandboxes.
//! Provides a small, retry-free façade over a container engine.
//!
//! ## Quick Start
//!
//! ```no_run
//! use skerry_runtime::{ContainerRuntime, ContainerSpec, DockerRuntime};
//! use std::time::Duration;
//!
//! # async fn example() -> skerry_runtime::Result<()> {
//! let docker = DockerRuntime::connect(None).await?;
//!
//! let spec = ContainerSpec::builder("agentruntime/sandbox:base")
//!     .name("sandbox-demo")
//!     .env("WORKSPACE_DIR", "/workspace")
//!     .publish(20001, 8000)
//!     .build()?;
//!
//! let id = docker.create(&spec).await?;
//! docker.start(&id).await?;
//! assert!(docker.inspect(&id).await?.running);
//!
//! docker.stop(&id, Duration::from_secs(10)).await?;
//! docker.remove(&id, true).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Engine Trait**: `ContainerRuntime` is the seam used by `skerry-core`,
//!   so tests can substitute an in-memory engine
//! - **Docker Backend**: `DockerRuntime` over `bollard`
//! - **Builder Pattern**: Ergonomic container specs with `ContainerSpec::builder`

mod docker;
mod error;
mod runtime;
mod spec;

pub use docker::DockerRuntime;
pub use error::{Result, RuntimeError};
pub use runtime::{ContainerId, ContainerRuntime, ContainerStatus};
pub use spec::{BindMount, ContainerSpec, ContainerSpecBuilder, PortBinding};
