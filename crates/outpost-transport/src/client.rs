//! HTTP client for the remote command boundary.
//!
//! Three endpoints, all request/response with an optional bearer
//! credential: a health probe, a pending-command fetch, and a per-command
//! result submission. The [`CommandTransport`] trait is the seam the
//! poller depends on; [`CloudClient`] is the reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use outpost_types::{CloudConfig, Command, CommandId, CommandResult};

/// Errors from transport operations. Recovered inside the poller's state
/// machine; never surfaced as a per-command result.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// The remote boundary as the poller sees it.
#[async_trait]
pub trait CommandTransport: Send {
    /// Cheap connectivity probe.
    async fn probe(&self) -> Result<(), TransportError>;

    /// Fetch the pending-command list, in the order the remote wants them
    /// executed.
    async fn fetch_pending(&self) -> Result<Vec<Command>, TransportError>;

    /// Report the result for one command.
    async fn submit_result(
        &self,
        id: &CommandId,
        result: &CommandResult,
    ) -> Result<(), TransportError>;
}

/// Response shape of the pending-command fetch.
#[derive(Debug, Deserialize)]
struct PendingResponse {
    #[serde(default)]
    commands: Vec<Command>,
}

/// Reqwest-backed [`CommandTransport`].
#[derive(Debug)]
pub struct CloudClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl CloudClient {
    /// Build a client from configuration. The connect and request timeouts
    /// are independent of the per-command execution timeout.
    pub fn new(config: &CloudConfig) -> Result<Self, TransportError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| TransportError::Endpoint(format!("{}: {e}", config.endpoint)))?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.endpoint
            .join(path)
            .map_err(|e| TransportError::Endpoint(format!("{path}: {e}")))
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn check_status(response: &reqwest::Response) -> Result<(), TransportError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl CommandTransport for CloudClient {
    async fn probe(&self) -> Result<(), TransportError> {
        let response = self.authed(self.client.get(self.url("health")?)).send().await?;
        Self::check_status(&response)
    }

    async fn fetch_pending(&self) -> Result<Vec<Command>, TransportError> {
        let response = self
            .authed(self.client.get(self.url("commands/pending")?))
            .send()
            .await?;
        Self::check_status(&response)?;

        let parsed: PendingResponse = response.json().await?;
        tracing::debug!(count = parsed.commands.len(), "fetched pending commands");
        Ok(parsed.commands)
    }

    async fn submit_result(
        &self,
        id: &CommandId,
        result: &CommandResult,
    ) -> Result<(), TransportError> {
        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("commands/{id}/result"))?)
                    .json(&result.to_wire()),
            )
            .send()
            .await?;
        Self::check_status(&response)
    }
}
