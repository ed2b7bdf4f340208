// ABOUTME: Serverless compute operations: look up, create and update services.
// ABOUTME: Mutations accept validate_only so the same call shape serves dry runs.

use super::Operation;
use super::error::ApiError;
use crate::naming::MANAGED_BY_LABEL;
use crate::types::{ImageRef, ServiceName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Service operations.
#[async_trait]
pub trait ComputeOps: Send + Sync {
    /// Fetch a service by its full path. Missing services are `NOT_FOUND`.
    async fn get_service(&self, service_path: &str) -> Result<ServiceRecord, ApiError>;

    /// Create a service under `parent` (`projects/*/locations/*`).
    async fn create_service(
        &self,
        parent: &str,
        service_id: &ServiceName,
        definition: &ServiceDefinition,
        validate_only: bool,
    ) -> Result<Operation, ApiError>;

    /// Replace the configuration of an existing service.
    async fn update_service(
        &self,
        service_path: &str,
        definition: &ServiceDefinition,
        validate_only: bool,
    ) -> Result<Operation, ApiError>;

    /// Wait for a service mutation to finish and return the resulting service.
    async fn wait_service(&self, operation: Operation) -> Result<ServiceRecord, ApiError>;
}

/// Desired state of a service. Built fresh for every deploy and never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub image: ImageRef,
    /// Explicit revision name; changes on every deploy.
    pub revision: String,
    pub labels: BTreeMap<String, String>,
    /// Allow unauthenticated invocations without an IAM binding.
    pub invoker_iam_disabled: bool,
    pub cpu: String,
    pub memory: String,
}

impl ServiceDefinition {
    pub fn new(
        service: &ServiceName,
        image: ImageRef,
        invoker_iam_disabled: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.0.to_string(), MANAGED_BY_LABEL.1.to_string());

        Self {
            image,
            revision: crate::naming::revision_name(service, now),
            labels,
            invoker_iam_disabled,
            cpu: "1".to_string(),
            memory: "512Mi".to_string(),
        }
    }

    /// The same definition with the invoker bypass removed.
    pub fn without_invoker_bypass(&self) -> Self {
        Self {
            invoker_iam_disabled: false,
            ..self.clone()
        }
    }
}

/// A service as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceRecord {
    /// Full resource name.
    pub name: String,
    /// Public URL, once the service is serving.
    pub uri: Option<String>,
    pub latest_ready_revision: Option<String>,
    pub invoker_iam_disabled: bool,
}
