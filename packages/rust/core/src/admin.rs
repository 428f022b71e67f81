//! Admin HTTP surface: cache management plus the webhook receiver.
//!
//! Runs alongside the poller and shares exactly one thing with it: the
//! enrichment cache. The webhook endpoint is the terminus of the
//! notification path; it logs the outcome and acknowledges.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use tabreport_enrich::{CacheStats, EnrichmentCache};
use tabreport_shared::WebhookNotification;

/// Build the admin router over a shared enrichment cache.
pub fn admin_router(cache: Arc<EnrichmentCache>) -> Router {
    Router::new()
        .route("/cache/clear", post(clear_cache))
        .route("/cache/stats", get(cache_stats))
        .route("/webhook", post(receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(cache)
}

async fn clear_cache(State(cache): State<Arc<EnrichmentCache>>) -> Json<serde_json::Value> {
    let removed = cache.clear();
    info!(removed, "enrichment cache cleared");
    Json(serde_json::json!({ "removed": removed }))
}

async fn cache_stats(State(cache): State<Arc<EnrichmentCache>>) -> Json<CacheStats> {
    Json(cache.stats())
}

async fn receive_webhook(Json(notification): Json<WebhookNotification>) -> StatusCode {
    info!(
        id = %notification.id_requisicao,
        status = %notification.status,
        document_id = notification.documento_id,
        "terminal-status notification received"
    );
    StatusCode::OK
}
