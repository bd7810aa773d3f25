use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{ACCEPT, HOST};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{StatsError, StatsResult};

/// Runtime API socket when none is configured.
pub const DEFAULT_SOCKET_PATH: &str = "/podman.sock";
/// Docker-compatible API version prefix.
pub const DEFAULT_API_VERSION: &str = "v1.40";
/// Budget for one request: connect, send, and read the full body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of raw stats snapshots for a container.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Fetch one point-in-time snapshot. One call is one attempt; retrying
    /// is the caller's business.
    async fn stats(&self, container: &str) -> StatsResult<Value>;
}

/// HTTP/1.1 client for the runtime's administrative API on a Unix socket.
///
/// Opens a fresh connection per request.
#[derive(Debug, Clone)]
pub struct UnixSocketClient {
    socket_path: PathBuf,
    api_version: String,
    timeout: Duration,
}

impl UnixSocketClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Request target for a one-shot (non-streaming) stats call.
    pub fn stats_path(&self, container: &str) -> String {
        format!(
            "/{}/containers/{}/stats?stream=false",
            self.api_version.trim_matches('/'),
            urlencoding::encode(container)
        )
    }

    async fn get(&self, path: &str) -> StatsResult<Bytes> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| StatsError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "runtime api connection closed with error");
            }
        });

        let req = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(HOST, "localhost")
            .header(ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())?;

        let resp = sender.send_request(req).await?;
        let status = resp.status();
        let body = resp.into_body().collect().await?.to_bytes();

        if !status.is_success() {
            return Err(StatsError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl StatsSource for UnixSocketClient {
    async fn stats(&self, container: &str) -> StatsResult<Value> {
        let path = self.stats_path(container);
        let body = tokio::time::timeout(self.timeout, self.get(&path))
            .await
            .map_err(|_| StatsError::Timeout(self.timeout))??;
        match serde_json::from_slice(&body)? {
            stats @ Value::Object(_) => Ok(stats),
            _ => Err(StatsError::NotAnObject),
        }
    }
}
