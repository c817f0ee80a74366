//! HTTP client for the hub backend API
//!
//! Wraps the `/api/projects` CRUD surface and `/api/health`, turning HTTP
//! results into typed [`BackendError`] outcomes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use super::error::BackendError;
use super::record::BackendRecord;
use crate::controller::metrics;

/// Default timeout for every backend call
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Operations the reconciler needs from the hub backend
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Create a new record
    async fn create(&self, record: &BackendRecord) -> Result<(), BackendError>;

    /// Replace the record stored under `id`
    async fn update(&self, id: &str, record: &BackendRecord) -> Result<(), BackendError>;

    /// Remove the record stored under `id`
    async fn delete(&self, id: &str) -> Result<(), BackendError>;

    /// Fetch the record stored under `id`; `Ok(None)` when the backend answers 404
    async fn get(&self, id: &str) -> Result<Option<BackendRecord>, BackendError>;

    /// Check backend liveness
    async fn health_check(&self) -> Result<(), BackendError>;
}

/// [`BackendClient`] backed by reqwest
#[derive(Clone, Debug)]
pub struct HttpBackendClient {
    base_url: String,
    http: Client,
}

impl HttpBackendClient {
    /// Create a client for the backend at `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hub-operator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn projects_url(&self) -> String {
        format!("{}/api/projects", self.base_url)
    }

    // Resource names are DNS-1123 subdomains, so `id` needs no escaping.
    fn project_url(&self, id: &str) -> String {
        format!("{}/api/projects/{}", self.base_url, id)
    }

    /// Send a request and record the outcome; 404s are passed through
    async fn execute(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, BackendError> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = BackendError::from(e);
                warn!("Backend {} failed: {}", operation, err);
                metrics::record_backend_request(operation, err.kind());
                return Err(err);
            }
        };

        let status = response.status();
        debug!("Backend {} returned {}", operation, status);

        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(response);
        }

        let err = rejected(response).await;
        metrics::record_backend_request(operation, err.kind());
        Err(err)
    }

    /// Like [`Self::execute`] but treats 404 as a rejection
    async fn execute_strict(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, BackendError> {
        let response = self.execute(operation, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            let err = rejected(response).await;
            metrics::record_backend_request(operation, err.kind());
            return Err(err);
        }
        metrics::record_backend_request(operation, "success");
        Ok(response)
    }
}

/// Capture status and body of a non-success response
async fn rejected(response: Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    BackendError::Rejected { status, body }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn create(&self, record: &BackendRecord) -> Result<(), BackendError> {
        let request = self.http.post(self.projects_url()).json(record);
        self.execute_strict("create", request).await?;
        Ok(())
    }

    async fn update(&self, id: &str, record: &BackendRecord) -> Result<(), BackendError> {
        let request = self.http.put(self.project_url(id)).json(record);
        self.execute_strict("update", request).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        let request = self.http.delete(self.project_url(id));
        self.execute_strict("delete", request).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<BackendRecord>, BackendError> {
        let request = self.http.get(self.project_url(id));
        let response = self.execute("get", request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            metrics::record_backend_request("get", "not_found");
            return Ok(None);
        }

        let record = response.json::<BackendRecord>().await.map_err(|e| {
            metrics::record_backend_request("get", "serialization");
            BackendError::from(e)
        })?;
        metrics::record_backend_request("get", "success");
        Ok(Some(record))
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let request = self.http.get(format!("{}/api/health", self.base_url));
        self.execute_strict("health", request).await?;
        Ok(())
    }
}
