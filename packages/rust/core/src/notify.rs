//! Terminal-status webhook delivery.
//!
//! Notification is strictly best-effort: delivery runs on a spawned task, is
//! never retried, and its outcome only reaches the logs. The wire response
//! for a submission must never wait on this path.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use tabreport_shared::config::WebhookConfig;
use tabreport_shared::{Result, TabreportError, WebhookNotification};

/// User-Agent string for webhook requests.
const USER_AGENT: &str = concat!("tabreport/", env!("CARGO_PKG_VERSION"));

/// One-shot webhook poster.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
}

impl Notifier {
    /// Build a notifier with the configured delivery timeout.
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TabreportError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fire-and-forget delivery on a spawned task.
    pub fn dispatch(&self, url: String, notification: WebhookNotification) {
        let client = self.client.clone();
        tokio::spawn(async move {
            deliver(&client, &url, &notification).await;
        });
    }

    /// Deliver synchronously. Exposed for call sites (and tests) that want
    /// to observe completion; `dispatch` is the production path.
    pub async fn send(&self, url: &str, notification: &WebhookNotification) {
        deliver(&self.client, url, notification).await;
    }
}

async fn deliver(client: &Client, url: &str, notification: &WebhookNotification) {
    match client.post(url).json(notification).send().await {
        Ok(response) if response.status().is_success() => {
            debug!(
                id = %notification.id_requisicao,
                status = %notification.status,
                "notification delivered"
            );
        }
        Ok(response) => {
            warn!(
                id = %notification.id_requisicao,
                http = %response.status(),
                "notification rejected by webhook endpoint"
            );
        }
        Err(e) => {
            warn!(
                id = %notification.id_requisicao,
                error = %e,
                "notification delivery failed"
            );
        }
    }
}
