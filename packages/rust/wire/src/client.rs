//! Submission client: one connection, one request, one response.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use tabreport_shared::config::WireConfig;
use tabreport_shared::{Result, TabreportError, WireRequest, WireResponse};

use crate::frame::{read_frame, write_frame};

/// Client side of the document-service transport.
///
/// Every call opens a fresh connection; the protocol is strictly one request
/// and one response per connection. All timeouts share one budget value.
#[derive(Debug, Clone)]
pub struct WireClient {
    host: String,
    port: u16,
    budget: Duration,
}

impl WireClient {
    /// Build a client from the wire section of the configuration.
    pub fn new(config: &WireConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            budget: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Submit one request and wait for the terminal response.
    ///
    /// Connect, write, and read each run under the configured timeout. Any
    /// failure surfaces as an error; the caller decides whether the batch is
    /// retried on a later poll cycle.
    #[instrument(skip(self, request), fields(id = %request.id_requisicao))]
    pub async fn submit(&self, request: &WireRequest) -> Result<WireResponse> {
        let address = format!("{}:{}", self.host, self.port);

        let mut stream = timeout(self.budget, TcpStream::connect(&address))
            .await
            .map_err(|_| TabreportError::Transport(format!("connect {address}: timed out")))?
            .map_err(|e| TabreportError::Transport(format!("connect {address}: {e}")))?;

        let payload = serde_json::to_vec(request)
            .map_err(|e| TabreportError::Protocol(format!("encode request: {e}")))?;

        timeout(self.budget, write_frame(&mut stream, &payload))
            .await
            .map_err(|_| TabreportError::Transport(format!("send to {address}: timed out")))??;

        let response = timeout(self.budget, read_frame(&mut stream))
            .await
            .map_err(|_| TabreportError::Transport(format!("await {address}: timed out")))??;

        let response: WireResponse = serde_json::from_slice(&response)
            .map_err(|e| TabreportError::Protocol(format!("decode response: {e}")))?;

        debug!(status = %response.status, "submission answered");
        Ok(response)
    }
}
