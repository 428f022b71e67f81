//! HTTP client for the shared object store.
//!
//! Speaks the Supabase-storage REST contract: list is a POST with a prefix
//! body, download/upload address `object/{bucket}/{name}`, and remove is a
//! DELETE with a list of names. Extension filtering is the caller's job.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tabreport_shared::{Result, TabreportError};

/// User-Agent string for store requests.
const USER_AGENT: &str = concat!("tabreport/", env!("CARGO_PKG_VERSION"));

/// Fixed timeout for store calls.
const STORE_TIMEOUT_SECS: u64 = 30;

/// One object listed from the store. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectInfo {
    /// Object name; embeds a sortable creation timestamp.
    pub name: String,
}

#[derive(Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: u32,
    offset: u32,
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    prefixes: &'a [String],
}

/// Thin client for one bucket of the object store.
#[derive(Clone)]
pub struct ObjectStoreClient {
    client: Client,
    endpoint: String,
    api_key: String,
    bucket: String,
}

impl ObjectStoreClient {
    /// Build a client for `bucket` at `endpoint`, authenticating with `api_key`.
    pub fn new(endpoint: &str, api_key: &str, bucket: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(STORE_TIMEOUT_SECS))
            .build()
            .map_err(|e| TabreportError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bucket: bucket.to_string(),
        })
    }

    /// List every object in the bucket.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<ObjectInfo>> {
        let url = format!("{}/storage/v1/object/list/{}", self.endpoint, self.bucket);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(&ListRequest {
                prefix: "",
                limit: 1000,
                offset: 0,
            })
            .send()
            .await
            .map_err(|e| TabreportError::Transport(format!("list {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TabreportError::Transport(format!(
                "list {url}: HTTP {status}"
            )));
        }

        let objects: Vec<ObjectInfo> = response
            .json()
            .await
            .map_err(|e| TabreportError::Transport(format!("list {url}: bad body: {e}")))?;

        debug!(count = objects.len(), "listed bucket objects");
        Ok(objects)
    }

    /// Download one object's raw bytes.
    #[instrument(skip(self))]
    pub async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.endpoint, self.bucket, name
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| TabreportError::Transport(format!("download {name}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TabreportError::Transport(format!(
                "download {name}: HTTP {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TabreportError::Transport(format!("download {name}: body: {e}")))?;

        debug!(name, bytes = bytes.len(), "downloaded object");
        Ok(bytes.to_vec())
    }

    /// Upload bytes under `name` with the given content type.
    #[instrument(skip(self, bytes))]
    pub async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.endpoint, self.bucket, name
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header("content-type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| TabreportError::Transport(format!("upload {name}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TabreportError::Transport(format!(
                "upload {name}: HTTP {status}"
            )));
        }
        Ok(())
    }

    /// Remove the named objects.
    #[instrument(skip(self))]
    pub async fn remove(&self, names: &[String]) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}", self.endpoint, self.bucket);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(&RemoveRequest { prefixes: names })
            .send()
            .await
            .map_err(|e| TabreportError::Transport(format!("remove {names:?}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TabreportError::Transport(format!(
                "remove {names:?}: HTTP {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_parses_object_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/list/incoming"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "20240101-data.csv", "id": "1"},
                {"name": "notes.txt", "id": "2"}
            ])))
            .mount(&server)
            .await;

        let store = ObjectStoreClient::new(&server.uri(), "test-key", "incoming").unwrap();
        let objects = store.list().await.unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].name, "20240101-data.csv");
    }

    #[tokio::test]
    async fn download_returns_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/object/incoming/data.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a,b\n1,2\n".to_vec()))
            .mount(&server)
            .await;

        let store = ObjectStoreClient::new(&server.uri(), "test-key", "incoming").unwrap();
        let bytes = store.download("data.csv").await.unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn upload_posts_bytes_with_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/incoming/out.csv"))
            .and(wiremock::matchers::header("content-type", "text/csv"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let store = ObjectStoreClient::new(&server.uri(), "test-key", "incoming").unwrap();
        store
            .upload("out.csv", b"a,b\n".to_vec(), "text/csv")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn remove_sends_names() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/object/incoming"))
            .and(body_partial_json(
                serde_json::json!({"prefixes": ["old.csv"]}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let store = ObjectStoreClient::new(&server.uri(), "test-key", "incoming").unwrap();
        store.remove(&["old.csv".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn http_failure_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = ObjectStoreClient::new(&server.uri(), "test-key", "incoming").unwrap();
        let err = store.download("missing.csv").await.unwrap_err();
        assert!(err.to_string().contains("transport error"));
    }
}
