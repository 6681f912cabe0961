//! HTTP client for the tool server running inside a sandbox.
//!
//! Every tool is a `POST {base_url}/tools/<operation>` with a JSON body of
//! named parameters. Liveness is `GET /healthz` (the JSON string `"OK"`),
//! detailed status is `GET /health`.

use crate::error::CoreError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Client for one sandbox's tool server.
///
/// A client is owned by exactly one session and closed exactly once:
/// [`close`](Self::close) consumes it.
pub struct SandboxClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for SandboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxClient")
            .field("base_url", &self.base_url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("closed", &self.cancel.is_cancelled())
            .finish()
    }
}

impl SandboxClient {
    /// Create a client for the tool server at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, CoreError> {
        let base_url = base_url.into();
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CoreError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.filter(|t| !t.is_empty()),
            cancel: CancellationToken::new(),
        })
    }

    /// Base URL of the tool server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Invoke a tool and decode its JSON result.
    pub async fn call<P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        operation: &str,
        params: &P,
    ) -> Result<R, CoreError> {
        self.call_until(operation, params, &self.cancel).await
    }

    /// Invoke a tool, aborting if `cancel` fires or the client is closed first.
    pub async fn call_until<P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        operation: &str,
        params: &P,
        cancel: &CancellationToken,
    ) -> Result<R, CoreError> {
        let url = format!("{}/tools/{}", self.base_url, operation);
        tracing::debug!(url = %url, "Sending tool request");

        let request = self.authorize(self.http.post(&url)).json(params);
        self.send(operation, request, cancel).await
    }

    /// Liveness check: true only if `/healthz` answers `"OK"`.
    pub async fn health_check(&self) -> bool {
        let request = self.authorize(self.http.get(format!("{}/healthz", self.base_url)));
        match self.send::<String>("healthz", request, &self.cancel).await {
            Ok(body) => body == "OK",
            Err(e) => {
                tracing::debug!(base_url = %self.base_url, error = %e, "Health check failed");
                false
            }
        }
    }

    /// Detailed status from `/health`.
    pub async fn health_status(&self) -> Result<serde_json::Value, CoreError> {
        let request = self.authorize(self.http.get(format!("{}/health", self.base_url)));
        self.send("health", request, &self.cancel).await
    }

    /// Close the client, aborting in-flight requests.
    pub fn close(self) {
        self.cancel.cancel();
        tracing::trace!(base_url = %self.base_url, "Sandbox client closed");
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<R: DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<R, CoreError> {
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| CoreError::operation_failed(operation, None, e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| CoreError::operation_failed(operation, Some(status.as_u16()), e.to_string()))?;
            tracing::trace!(operation, status = status.as_u16(), body = %body, "Tool response body");

            if !status.is_success() {
                return Err(CoreError::operation_failed(operation, Some(status.as_u16()), body));
            }

            serde_json::from_str(&body).map_err(|e| {
                CoreError::operation_failed(
                    operation,
                    Some(status.as_u16()),
                    format!("invalid response body: {e}"),
                )
            })
        };

        tokio::select! {
            result = exchange => result,
            _ = cancel.cancelled() => {
                tracing::debug!(operation, "Tool request cancelled");
                Err(CoreError::Cancelled)
            }
            _ = self.cancel.cancelled() => {
                tracing::debug!(operation, "Client closed, tool request aborted");
                Err(CoreError::Cancelled)
            }
        }
    }
}

/// Result of running code or a shell command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Output blocks.
    #[serde(default)]
    pub content: Vec<TextContent>,
    /// True if execution raised an error.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ExecutionResult {
    /// All text blocks joined together.
    pub fn text(&self) -> String {
        self.content.iter().map(|c| c.text.as_str()).collect()
    }
}

/// One block of execution output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// Block type, normally `text`.
    #[serde(rename = "type", default = "default_content_type")]
    pub kind: String,
    /// The output text.
    #[serde(default)]
    pub text: String,
    /// Optional label such as `stdout` or `stderr` when output is split.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_content_type() -> String {
    "text".to_string()
}
