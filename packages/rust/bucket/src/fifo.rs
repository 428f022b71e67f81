//! Consumption tracking and FIFO capacity eviction.
//!
//! Consumption state is process-local and intentionally not persisted: after
//! a restart, objects still present in the store may be reprocessed. That
//! at-least-once semantic is part of the contract, not a bug.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::{debug, info, instrument, warn};

use tabreport_shared::Result;

use crate::store::ObjectStoreClient;
use crate::CSV_EXTENSION;

/// Tracks consumed objects and bounds the bucket to a maximum object count.
pub struct BucketFifoManager {
    store: ObjectStoreClient,
    max_objects: usize,
    consumed: Mutex<HashSet<String>>,
}

impl BucketFifoManager {
    /// Wrap a store client with an empty consumption set.
    pub fn new(store: ObjectStoreClient, max_objects: usize) -> Self {
        Self {
            store,
            max_objects,
            consumed: Mutex::new(HashSet::new()),
        }
    }

    /// The underlying store client.
    pub fn store(&self) -> &ObjectStoreClient {
        &self.store
    }

    /// List CSV objects not yet handed to the pipeline.
    ///
    /// Order is whatever the store returns; callers must not assume any
    /// processing order beyond "oldest name sorts first" for eviction.
    #[instrument(skip(self))]
    pub async fn list_unconsumed(&self) -> Result<Vec<String>> {
        let objects = self.store.list().await?;

        let consumed = self.consumed.lock().expect("consumption set poisoned");
        let unconsumed: Vec<String> = objects
            .into_iter()
            .map(|o| o.name)
            .filter(|name| name.ends_with(CSV_EXTENSION) && !consumed.contains(name))
            .collect();

        debug!(count = unconsumed.len(), "unconsumed objects");
        Ok(unconsumed)
    }

    /// Mark an object as handed to the pipeline. Idempotent; never deletes
    /// the object itself — deletion is solely the eviction policy's job.
    pub fn mark_consumed(&self, name: &str) {
        self.consumed
            .lock()
            .expect("consumption set poisoned")
            .insert(name.to_string());
    }

    /// Whether an object is currently marked consumed.
    pub fn is_consumed(&self, name: &str) -> bool {
        self.consumed
            .lock()
            .expect("consumption set poisoned")
            .contains(name)
    }

    /// Evict the single oldest CSV object when the bucket holds `max_objects`
    /// or more. Safe to call before and after a submission; a call while
    /// under capacity is a no-op. Failures are logged and swallowed — the
    /// system tolerates transient over-capacity.
    #[instrument(skip(self))]
    pub async fn enforce_capacity(&self) {
        let objects = match self.store.list().await {
            Ok(objects) => objects,
            Err(e) => {
                warn!(error = %e, "capacity check failed, skipping eviction");
                return;
            }
        };

        let mut csv_names: Vec<String> = objects
            .into_iter()
            .map(|o| o.name)
            .filter(|name| name.ends_with(CSV_EXTENSION))
            .collect();

        if csv_names.len() < self.max_objects {
            return;
        }

        // Names embed a sortable timestamp, so the lexicographic minimum is
        // the oldest object.
        csv_names.sort();
        let oldest = csv_names.remove(0);

        match self.store.remove(std::slice::from_ref(&oldest)).await {
            Ok(()) => {
                info!(name = %oldest, "evicted oldest object");
                self.consumed
                    .lock()
                    .expect("consumption set poisoned")
                    .remove(&oldest);
            }
            Err(e) => {
                warn!(name = %oldest, error = %e, "eviction failed, leaving object in place");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing(names: &[&str]) -> serde_json::Value {
        serde_json::Value::Array(
            names
                .iter()
                .map(|n| serde_json::json!({"name": n}))
                .collect(),
        )
    }

    async fn manager_for(server: &MockServer, max: usize) -> BucketFifoManager {
        let store = ObjectStoreClient::new(&server.uri(), "test-key", "incoming").unwrap();
        BucketFifoManager::new(store, max)
    }

    #[tokio::test]
    async fn list_filters_extension_and_consumed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/list/incoming"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(listing(&["a.csv", "b.csv", "readme.txt"])),
            )
            .mount(&server)
            .await;

        let manager = manager_for(&server, 3).await;
        manager.mark_consumed("a.csv");

        let unconsumed = manager.list_unconsumed().await.unwrap();
        assert_eq!(unconsumed, vec!["b.csv".to_string()]);
    }

    #[tokio::test]
    async fn mark_consumed_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/list/incoming"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["a.csv"])))
            .mount(&server)
            .await;

        let manager = manager_for(&server, 3).await;
        manager.mark_consumed("a.csv");
        manager.mark_consumed("a.csv");
        assert!(manager.is_consumed("a.csv"));
        assert!(manager.list_unconsumed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn eviction_removes_single_oldest() {
        let server = MockServer::start().await;
        // Four objects named with ascending timestamps, max 3: A goes.
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/list/incoming"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(&[
                "20240104-D.csv",
                "20240101-A.csv",
                "20240103-C.csv",
                "20240102-B.csv",
            ])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/object/incoming"))
            .and(body_partial_json(
                serde_json::json!({"prefixes": ["20240101-A.csv"]}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server, 3).await;
        manager.mark_consumed("20240101-A.csv");
        manager.enforce_capacity().await;

        // The evicted name leaves the consumption set with its object.
        assert!(!manager.is_consumed("20240101-A.csv"));
    }

    #[tokio::test]
    async fn under_capacity_is_a_noop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/list/incoming"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["a.csv", "b.csv"])))
            .mount(&server)
            .await;
        // No DELETE mock: any removal attempt would 404 and fail the
        // expectation below implicitly.
        let manager = manager_for(&server, 3).await;
        manager.enforce_capacity().await;
    }

    #[tokio::test]
    async fn eviction_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/list/incoming"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(listing(&["a.csv", "b.csv", "c.csv", "d.csv"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let manager = manager_for(&server, 3).await;
        // Must not panic or propagate the failure.
        manager.enforce_capacity().await;
    }
}
