//! HTTP control plane.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /sandboxes` - Live sandboxes
//! - `POST /sessions` - Open a session
//! - `GET /sessions/:id` - Describe a session
//! - `DELETE /sessions/:id` - Close a session
//! - `POST /sessions/:id/restart` - Replace a session's sandbox
//! - `GET /sessions/:id/health` - Sandbox liveness
//! - `POST /sessions/:id/tools/:operation` - Proxy a tool call

use crate::server::SkerryServer;
use crate::types::{CreateSessionRequest, ErrorResponse, ListSandboxesResponse};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use skerry_core::{CoreError, SandboxVariant, SessionId};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// An error rendered as a JSON error response.
#[derive(Debug)]
pub enum ApiError {
    /// The request body is not valid JSON for the endpoint.
    BadRequest(String),
    /// The operation itself failed.
    Core(CoreError),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

/// HTTP status for an error.
///
/// Creation failures are classified by their root cause; restart failures
/// are always a bad gateway.
pub fn status_for(err: &CoreError) -> StatusCode {
    if let CoreError::SandboxRestartFailed { .. } = err {
        return StatusCode::BAD_GATEWAY;
    }
    match err.root_cause() {
        CoreError::UnknownVariant(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::SessionExists(_) => StatusCode::CONFLICT,
        CoreError::SessionClosed(_) => StatusCode::GONE,
        CoreError::SandboxOperationFailed { .. } | CoreError::ContainerOperationFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
        CoreError::ResourceExhausted { .. } | CoreError::RuntimeUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CoreError::SandboxNotReady { .. } | CoreError::DeadlineExceeded(_) => {
            StatusCode::GATEWAY_TIMEOUT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Core(err) => (status_for(&err), err.to_string()),
        };
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %error, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %error, "Request rejected");
        }
        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Parse a JSON request body. An empty body yields `None`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<Option<T>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
}

/// Build the HTTP router.
///
/// The returned router can be served directly with axum or composed
/// into a larger application.
pub fn build_router(server: SkerryServer) -> Router {
    tracing::debug!("Building HTTP router");

    Router::new()
        .route("/health", get(health_handler))
        .route("/sandboxes", get(list_sandboxes))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(close_session))
        .route("/sessions/:id/restart", post(restart_session))
        .route("/sessions/:id/health", get(session_health))
        .route("/sessions/:id/tools/:operation", post(call_tool))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

async fn health_handler(State(server): State<SkerryServer>) -> impl IntoResponse {
    tracing::trace!("Health check request");
    Json(serde_json::json!({
        "status": "healthy",
        "service": "skerry-server",
        "sandboxes": server.manager().count(),
        "sessions": server.session_count(),
    }))
}

async fn list_sandboxes(State(server): State<SkerryServer>) -> impl IntoResponse {
    Json(ListSandboxesResponse {
        sandboxes: server.list_sandboxes(),
    })
}

async fn create_session(
    State(server): State<SkerryServer>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: CreateSessionRequest = parse_body(&body)?.unwrap_or_default();
    let variant = match request.variant.as_deref() {
        Some(name) => name.parse::<SandboxVariant>()?,
        None => SandboxVariant::default(),
    };
    let session_id = request.session_id.map(SessionId::from);

    let info = server.open_session(variant, session_id).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn get_session(
    State(server): State<SkerryServer>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(server.session_info(&SessionId::from(id)).await?))
}

async fn close_session(
    State(server): State<SkerryServer>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    server.close_session(&SessionId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn restart_session(
    State(server): State<SkerryServer>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(server.restart_session(&SessionId::from(id)).await?))
}

async fn session_health(
    State(server): State<SkerryServer>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(server.session_health(&SessionId::from(id)).await?))
}

async fn call_tool(
    State(server): State<SkerryServer>,
    Path((id, operation)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let params: Value = parse_body(&body)?.unwrap_or_else(|| serde_json::json!({}));
    tracing::debug!(session_id = %id, operation = %operation, "Proxying tool call");
    Ok(Json(
        server
            .call_tool(&SessionId::from(id), &operation, &params)
            .await?,
    ))
}

/// Start the HTTP server.
///
/// This function runs until the server is shut down via the provided
/// shutdown signal.
pub async fn serve(
    server: SkerryServer,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let router = build_router(server);

    tracing::info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!(%addr, "TCP listener bound");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
