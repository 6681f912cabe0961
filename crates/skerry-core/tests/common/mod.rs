//! In-memory container runtime for integration tests.
//!
//! Starting a fake container binds a small tool server on the host port
//! published for container port 8000, so sessions talk real HTTP.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use skerry_core::{ManagerConfig, SandboxManager};
use skerry_runtime::{ContainerId, ContainerRuntime, ContainerSpec, ContainerStatus, RuntimeError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runtime call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Start,
    Inspect,
}

struct FakeContainer {
    spec: ContainerSpec,
    running: bool,
    server: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<HashMap<ContainerId, FakeContainer>>,
    removed: Mutex<Vec<ContainerId>>,
    fail_at: Mutex<Option<Step>>,
    never_running: AtomicBool,
    inspect_calls: AtomicU32,
    next_id: AtomicU32,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_at(&self, step: Step) {
        *self.fail_at.lock().unwrap() = Some(step);
    }

    pub fn clear_failures(&self) {
        *self.fail_at.lock().unwrap() = None;
    }

    pub fn set_never_running(&self, never: bool) {
        self.never_running.store(never, Ordering::SeqCst);
    }

    pub fn inspect_calls(&self) -> u32 {
        self.inspect_calls.load(Ordering::SeqCst)
    }

    /// Containers created and not yet removed.
    pub fn live_containers(&self) -> usize {
        self.containers.lock().unwrap().len()
    }

    pub fn removed(&self) -> Vec<ContainerId> {
        self.removed.lock().unwrap().clone()
    }

    pub fn spec_of(&self, id: &ContainerId) -> Option<ContainerSpec> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .map(|c| c.spec.clone())
    }

    fn should_fail(&self, step: Step) -> bool {
        *self.fail_at.lock().unwrap() == Some(step)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create(&self, spec: &ContainerSpec) -> skerry_runtime::Result<ContainerId> {
        if self.should_fail(Step::Create) {
            return Err(RuntimeError::operation("create", "image not found"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = ContainerId::new(format!("fake{n:08x}"));
        self.containers.lock().unwrap().insert(
            id.clone(),
            FakeContainer {
                spec: spec.clone(),
                running: false,
                server: None,
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &ContainerId) -> skerry_runtime::Result<()> {
        if self.should_fail(Step::Start) {
            return Err(RuntimeError::operation("start", "port is already allocated"));
        }
        let spec = self
            .spec_of(id)
            .ok_or_else(|| RuntimeError::operation("start", "no such container"))?;
        let port = spec
            .ports
            .iter()
            .find(|p| p.container_port == 8000)
            .map(|p| p.host_port)
            .ok_or_else(|| RuntimeError::operation("start", "control port not published"))?;

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| RuntimeError::operation("start", e.to_string()))?;
        let stub = Arc::new(Stub {
            container_id: id.to_string(),
            token: spec.env_var("SECRET_TOKEN").map(str::to_string),
        });
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, stub_router(stub)).await;
        });

        let mut containers = self.containers.lock().unwrap();
        if let Some(container) = containers.get_mut(id) {
            container.running = true;
            container.server = Some(server);
        }
        Ok(())
    }

    async fn inspect(&self, id: &ContainerId) -> skerry_runtime::Result<ContainerStatus> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail(Step::Inspect) {
            return Err(RuntimeError::operation("inspect", "engine hiccup"));
        }
        let running = self
            .containers
            .lock()
            .unwrap()
            .get(id)
            .map(|c| c.running)
            .ok_or_else(|| RuntimeError::operation("inspect", "no such container"))?;
        let running = running && !self.never_running.load(Ordering::SeqCst);
        Ok(ContainerStatus {
            running,
            status: Some(if running { "running" } else { "created" }.to_string()),
        })
    }

    async fn stop(&self, id: &ContainerId, _timeout: Duration) -> skerry_runtime::Result<()> {
        if let Some(container) = self.containers.lock().unwrap().get_mut(id) {
            container.running = false;
        }
        Ok(())
    }

    async fn remove(&self, id: &ContainerId, _force: bool) -> skerry_runtime::Result<()> {
        let container = self
            .containers
            .lock()
            .unwrap()
            .remove(id)
            .ok_or_else(|| RuntimeError::operation("remove", "no such container"))?;
        self.removed.lock().unwrap().push(id.clone());
        if let Some(server) = container.server {
            server.abort();
            // wait for the listener to be dropped so the port is free again
            let _ = server.await;
        }
        Ok(())
    }

    async fn ping(&self) -> skerry_runtime::Result<()> {
        Ok(())
    }
}

struct Stub {
    container_id: String,
    token: Option<String>,
}

fn stub_router(stub: Arc<Stub>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { Json("OK") }))
        .route("/health", get(health))
        .route("/tools/:operation", post(tool))
        .with_state(stub)
}

async fn health(State(stub): State<Arc<Stub>>) -> Json<Value> {
    Json(json!({ "status": "healthy", "container_id": stub.container_id }))
}

async fn tool(
    State(stub): State<Arc<Stub>>,
    Path(operation): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(token) = &stub.token {
        let expected = format!("Bearer {token}");
        let given = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }

    match operation.as_str() {
        "run_shell_command" => {
            let command = body["command"].as_str().unwrap_or_default();
            let result = match command.strip_prefix("echo ") {
                Some(rest) => execution(format!("{rest}\n"), false),
                None => execution(format!("sh: {command}: not found\n"), true),
            };
            Json(result).into_response()
        }
        "whoami" => Json(json!(stub.container_id)).into_response(),
        "headers" => {
            let authorization = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());
            Json(json!({ "authorization": authorization })).into_response()
        }
        "sleep" => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(json!({ "slept": true })).into_response()
        }
        "fail" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => Json(json!({ "operation": operation, "params": body })).into_response(),
    }
}

fn execution(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text, "description": "stdout" }],
        "isError": is_error,
    })
}

/// Manager over `runtime` with fast readiness polling and its own port range.
pub fn manager(runtime: Arc<FakeRuntime>, min: u16, max: u16) -> Arc<SandboxManager> {
    manager_with(runtime, config(min, max))
}

pub fn config(min: u16, max: u16) -> ManagerConfig {
    ManagerConfig::builder()
        .port_range(min, max)
        .bearer_token("secret")
        .readiness(5, Duration::from_millis(10), Duration::ZERO)
        .request_timeout(Duration::from_secs(5))
        .build()
        .expect("valid test config")
}

pub fn manager_with(runtime: Arc<FakeRuntime>, config: ManagerConfig) -> Arc<SandboxManager> {
    Arc::new(SandboxManager::new(config, runtime).expect("valid manager"))
}
