//! Client side of the map service.
//!
//! The map service is reached through a plain request/response channel:
//! a discovery probe that must answer within a bounded time, then one
//! `add_map` call that is allowed to take as long as the transfer needs.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::UploadError;
use crate::msg::{AddMapRequest, AddMapResponse};

/// A live connection to a map service.
#[async_trait]
pub trait MapServiceClient: Send + Sync {
    /// Block until the service answers, or fail with
    /// [`UploadError::RemoteUnavailable`] once `timeout` has passed.
    async fn wait_for_service(&self, timeout: Duration) -> Result<(), UploadError>;

    /// Send one `AddMap` request and wait for its response without a bound.
    async fn add_map(&self, request: &AddMapRequest) -> Result<AddMapResponse, UploadError>;
}

/// [`MapServiceClient`] over HTTP, against a server started by `mapctl serve`.
///
/// | Method | Path |
/// |--------|------|
/// | `GET`  | `{endpoint}/{service}/health` |
/// | `POST` | `{endpoint}/{service}/add_map` |
pub struct HttpMapServiceClient {
    http: reqwest::Client,
    base: String,
    service_name: String,
}

const PROBE_INTERVAL: Duration = Duration::from_millis(250);

impl HttpMapServiceClient {
    pub fn new(endpoint: &str, service_name: &str) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base: format!("{}/{}", endpoint.trim_end_matches('/'), service_name),
            service_name: service_name.to_string(),
        })
    }

    async fn probe(&self) -> Result<(), String> {
        let resp = self
            .http
            .get(format!("{}/health", self.base))
            .timeout(PROBE_INTERVAL * 4)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(format!("health check returned {}", resp.status()))
        }
    }
}

#[async_trait]
impl MapServiceClient for HttpMapServiceClient {
    async fn wait_for_service(&self, timeout: Duration) -> Result<(), UploadError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_error = String::from("no response");

        loop {
            match tokio::time::timeout_at(deadline, self.probe()).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => {
                    debug!("Map service {} not ready: {}", self.service_name, e);
                    last_error = e;
                }
                Err(_) => break,
            }
            if tokio::time::Instant::now() + PROBE_INTERVAL >= deadline {
                break;
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }

        Err(UploadError::RemoteUnavailable {
            service: self.service_name.clone(),
            reason: format!(
                "not reachable within {:.1}s ({})",
                timeout.as_secs_f64(),
                last_error
            ),
        })
    }

    async fn add_map(&self, request: &AddMapRequest) -> Result<AddMapResponse, UploadError> {
        let resp = self
            .http
            .post(format!("{}/add_map", self.base))
            .json(request)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError::Transport(format!(
                "add_map returned {}: {}",
                status, body
            )));
        }

        resp.json::<AddMapResponse>()
            .await
            .map_err(|e| UploadError::Transport(format!("invalid add_map response: {}", e)))
    }
}
