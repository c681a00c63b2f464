//! HTTP client for the tile detection server.
//!
//! Talks to the inference server's two routes: `POST /detect` takes a
//! multipart upload with the tile in the `image` field and answers with the
//! annotated PNG; `GET /health` answers with a small JSON status object.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::service::{DetectionService, TileRequest};
use crate::config::DetectorConfig;
use crate::error::PipelineError;

/// Longest slice of an error body carried into an error message.
const ERROR_BODY_LIMIT: usize = 200;

/// Health check timeout.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Body of the `/health` route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" && self.model_loaded
    }
}

/// Detection service reached over HTTP.
pub struct HttpDetector {
    detect_url: String,
    health_url: String,
    form_field: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            detect_url: config.url(&config.detect_path),
            health_url: config.url(&config.health_path),
            form_field: config.form_field.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    pub fn detect_url(&self) -> &str {
        &self.detect_url
    }

    /// Query the health route.
    pub async fn health(&self) -> Result<HealthStatus, PipelineError> {
        let resp = self
            .client
            .get(&self.health_url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.health_error(format!("Request failed: {e}"), None))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(self.health_error(format!("HTTP {status}"), Some(status.as_u16())));
        }

        resp.json::<HealthStatus>()
            .await
            .map_err(|e| self.health_error(format!("Unreadable response: {e}"), None))
    }

    fn health_error(&self, message: String, status_code: Option<u16>) -> PipelineError {
        PipelineError::Health {
            url: self.health_url.clone(),
            message,
            status_code,
        }
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= ERROR_BODY_LIMIT {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(ERROR_BODY_LIMIT).collect();
        format!("{head}...")
    }
}

#[async_trait]
impl DetectionService for HttpDetector {
    fn name(&self) -> &str {
        "http"
    }

    async fn is_available(&self) -> bool {
        matches!(self.health().await, Ok(h) if h.is_healthy())
    }

    async fn detect(&self, request: &TileRequest) -> Result<Vec<u8>, PipelineError> {
        let start = Instant::now();
        let fail = |message: String, status_code: Option<u16>| PipelineError::Detection {
            tile_index: request.index,
            message,
            status_code,
        };

        let part = Part::bytes(request.png.clone())
            .file_name(request.file_name())
            .mime_str("image/png")
            .map_err(|e| fail(format!("Invalid upload part: {e}"), None))?;
        let form = Form::new().part(self.form_field.clone(), part);

        let resp = self
            .client
            .post(&self.detect_url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fail(
                        format!("Request timed out after {}ms", self.timeout.as_millis()),
                        None,
                    )
                } else {
                    fail(format!("Request failed: {e}"), None)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(fail(
                format!("Server error: HTTP {status}: {}", excerpt(&text)),
                Some(status.as_u16()),
            ));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| fail(format!("Failed to read response body: {e}"), None))?;

        tracing::trace!(
            "Tile {} at {} detected in {:?} ({} bytes)",
            request.index,
            request.anchor,
            start.elapsed(),
            bytes.len()
        );
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Minimal one-route-fits-all HTTP server for exercising the client.

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Canned response: status line code, content type, body.
    #[derive(Clone)]
    pub struct Reply {
        pub status: u16,
        pub content_type: &'static str,
        pub body: Vec<u8>,
    }

    fn reason(status: u16) -> &'static str {
        match status {
            200 => "OK",
            400 => "Bad Request",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }

    fn content_length(head: &str) -> usize {
        head.lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Serve `reply` to every request; returns the base URL.
    ///
    /// The reply closure gets the raw request bytes (head and body).
    pub async fn spawn<F>(reply: F) -> String
    where
        F: Fn(&[u8]) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let reply = std::sync::Arc::new(reply);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let reply = reply.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 8192];
                    let head_end = loop {
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        request.extend_from_slice(&buf[..n]);
                        if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                            break pos + 4;
                        }
                    };
                    let head = String::from_utf8_lossy(&request[..head_end]).to_string();
                    let wanted = head_end + content_length(&head);
                    while request.len() < wanted {
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        request.extend_from_slice(&buf[..n]);
                    }

                    let r = reply(&request);
                    let header = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        r.status,
                        reason(r.status),
                        r.content_type,
                        r.body.len()
                    );
                    let _ = socket.write_all(header.as_bytes()).await;
                    let _ = socket.write_all(&r.body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{addr}")
    }
}
