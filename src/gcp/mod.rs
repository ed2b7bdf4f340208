// ABOUTME: REST backend for Google Cloud built on reqwest and gcp_auth.
// ABOUTME: One authenticated client implements every backend capability trait.

mod error;
mod services;
mod wire;

pub use error::GcpError;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gcp_auth::TokenProvider;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::backend::{ApiError, Operation};
use crate::types::ProjectId;
use error::{CredentialsSnafu, HttpClientSnafu, error_from_response, error_from_transport};
use wire::OperationJson;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

pub(crate) const RUN_API: &str = "https://run.googleapis.com/v2";
pub(crate) const STORAGE_API: &str = "https://storage.googleapis.com/storage/v1";
pub(crate) const STORAGE_UPLOAD_API: &str = "https://storage.googleapis.com/upload/storage/v1";
pub(crate) const ARTIFACT_API: &str = "https://artifactregistry.googleapis.com/v1";
pub(crate) const BUILD_API: &str = "https://cloudbuild.googleapis.com/v1";
pub(crate) const USAGE_API: &str = "https://serviceusage.googleapis.com/v1";
pub(crate) const LOGGING_API: &str = "https://logging.googleapis.com/v2";

/// HTTP behavior of the REST backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GcpOptions {
    /// Per-request timeout.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// How often unfinished long-running operations are re-read.
    #[serde(default = "default_operation_poll_interval", with = "humantime_serde")]
    pub operation_poll_interval: Duration,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_operation_poll_interval() -> Duration {
    Duration::from_secs(2)
}

impl Default for GcpOptions {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            operation_poll_interval: default_operation_poll_interval(),
        }
    }
}

/// Authenticated client for the Google Cloud APIs the pipeline uses.
///
/// Storage bucket creation needs the owning project, so a client is scoped
/// to one project. Every other call carries full resource paths.
pub struct GcpClient {
    project: ProjectId,
    options: GcpOptions,
    tokens: Arc<dyn TokenProvider>,
    http: reqwest::Client,
}

impl fmt::Debug for GcpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpClient")
            .field("project", &self.project)
            .field("options", &self.options)
            .field("tokens", &"<TokenProvider>")
            .finish()
    }
}

impl GcpClient {
    /// Discover application default credentials and build the HTTP client.
    pub async fn connect(project: ProjectId, options: GcpOptions) -> Result<Self, GcpError> {
        let tokens = gcp_auth::provider().await.context(CredentialsSnafu)?;
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .context(HttpClientSnafu)?;
        Ok(Self {
            project,
            options,
            tokens,
            http,
        })
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, ApiError> {
        let token = self
            .tokens
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| {
                ApiError::new(
                    crate::backend::ApiCode::Unauthenticated,
                    format!("failed to get access token: {e}"),
                )
            })?;
        Ok(self.http.request(method, url).bearer_auth(token.as_str()))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(error_from_transport)?;
        let status = response.status();
        let body = response.text().await.map_err(error_from_transport)?;
        if !status.is_success() {
            return Err(error_from_response(status, &body));
        }
        if body.trim().is_empty() {
            return serde_json::from_str("{}")
                .map_err(|e| ApiError::internal(format!("unexpected empty response: {e}")));
        }
        serde_json::from_str(&body)
            .map_err(|e| ApiError::internal(format!("unexpected response body: {e}")))
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        tracing::trace!(url, "GET");
        let request = self.request(Method::GET, url).await?;
        self.send(request).await
    }

    pub(crate) async fn call<B, T>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::trace!(url, %method, "calling API");
        let request = self.request(method, url).await?.query(query).json(body);
        self.send(request).await
    }

    pub(crate) async fn upload<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        content_type: &str,
        data: bytes::Bytes,
    ) -> Result<T, ApiError> {
        tracing::trace!(url, bytes = data.len(), "uploading");
        let request = self
            .request(Method::POST, url)
            .await?
            .query(query)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data);
        self.send(request).await
    }

    /// Re-read an operation under `api_root` until it reports done.
    pub(crate) async fn wait_operation(
        &self,
        api_root: &str,
        operation: Operation,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        if operation.done {
            return Ok(operation.response);
        }
        let url = format!("{api_root}/{}", operation.name.as_str());
        loop {
            tokio::time::sleep(self.options.operation_poll_interval).await;
            let current: OperationJson = self.get(&url).await?;
            let current = current.into_operation()?;
            if current.done {
                tracing::debug!(operation = %current.name.as_str(), "operation finished");
                return Ok(current.response);
            }
        }
    }
}
