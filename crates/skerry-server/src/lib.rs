//! # skerry-server
//!
//! HTTP control plane exposing Skerry sandboxes to agents.
//!
//! ## Quick Start
//!
//! Run the server with default configuration:
//!
//! ```bash
//! cargo run -p skerry-server
//! ```
//!
//! Configure via environment variables:
//!
//! ```bash
//! export SKERRY_PORT_RANGE=49152-59999
//! export SKERRY_BEARER_TOKEN=change-me
//! export SKERRY_MOUNT_DIR=/srv/skerry/workspace
//! cargo run -p skerry-server
//! ```
//!
//! ## Routes
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /health` | Server health and sandbox count |
//! | `GET /sandboxes` | Live sandboxes |
//! | `POST /sessions` | Open a session (`{"variant": "base"}`) |
//! | `DELETE /sessions/:id` | Close a session |
//! | `POST /sessions/:id/restart` | Replace the session's sandbox |
//! | `GET /sessions/:id/health` | Sandbox liveness |
//! | `POST /sessions/:id/tools/:operation` | Proxy a tool call |

pub mod http;
mod config;
mod server;
mod types;

pub use config::{ConfigError, ServerConfig};
pub use server::SkerryServer;
pub use types::*;
