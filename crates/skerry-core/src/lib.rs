//! # skerry-core
//!
//! Sandbox lifecycle manager for Skerry container sandboxes.
//!
//! This crate creates, tracks, health-checks, restarts and tears down
//! per-session containers, and hands callers a session handle that proxies
//! tool calls to the server running inside the container.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    skerry-core (host)                    │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌──────────────────┐    ┌──────────────────────────┐   │
//! │  │ SandboxManager   │───▶│ SandboxRegistry          │   │
//! │  │ - create_sandbox │    │ DashMap<SessionId,       │   │
//! │  │ - remove_sandbox │    │         ContainerRecord> │   │
//! │  │ - cleanup_all    │    └──────────────────────────┘   │
//! │  └──────────────────┘    ┌──────────────────────────┐   │
//! │     │          │    ────▶│ PortAllocator (DashSet)  │   │
//! │     │          │         └──────────────────────────┘   │
//! │     │          ▼                                         │
//! │     │   ┌──────────────────────────┐                    │
//! │     │   │ dyn ContainerRuntime     │                    │
//! │     │   │ (from skerry-runtime)    │                    │
//! │     │   └──────────────────────────┘                    │
//! │     ▼                                                    │
//! │  ┌──────────────────┐    ┌──────────────────────────┐   │
//! │  │ SandboxSession   │───▶│ SandboxClient (reqwest)  │   │
//! │  │ - run_*/files    │    │ POST /tools/<operation>  │   │
//! │  │ - browser_*      │    └──────────────────────────┘   │
//! │  │ - restart/close  │                │ http            │
//! │  └──────────────────┘                ▼                  │
//! └──────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │              tool server (in the container)              │
//! │              Listening on container port 8000            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use skerry_core::{ManagerConfig, SandboxManager, SandboxVariant};
//! use skerry_runtime::DockerRuntime;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let runtime = Arc::new(DockerRuntime::connect(None).await?);
//! let config = ManagerConfig::builder().bearer_token("secret").build()?;
//! let manager = Arc::new(SandboxManager::new(config, runtime)?);
//!
//! let mut session = manager.open_session(SandboxVariant::Base).await?;
//!
//! let result = session.run_shell_command("echo hi", false).await?;
//! println!("Output: {}", result.text());
//!
//! session.write_file("/workspace/hello.txt", "Hello, World!").await?;
//! session.restart().await?;
//!
//! // Cleanup
//! session.close().await;
//! manager.cleanup_all().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Sandbox Lifecycle**: Create, restart and remove per-session containers
//! - **Leak-free Creation**: Failed or cancelled creations release ports and containers
//! - **Concurrent Access**: Lock-free registry and port pool
//! - **Tool Proxy**: Code, file-system and browser operations over HTTP

mod browser;
mod client;
mod config;
mod error;
mod manager;
mod ports;
mod record;
mod registry;
mod session;
mod variant;

pub use client::{ExecutionResult, SandboxClient, TextContent};
pub use config::{ManagerConfig, ManagerConfigBuilder, WORKSPACE_DIR};
pub use error::{CoreError, Result};
pub use manager::{SandboxManager, MANAGED_BY_LABEL, SESSION_LABEL};
pub use ports::{PortAllocator, MAX_ATTEMPTS_PER_PORT};
pub use record::{ContainerRecord, SessionId};
pub use registry::SandboxRegistry;
pub use session::{SandboxSession, SessionState};
pub use variant::{SandboxVariant, VariantSpec};
