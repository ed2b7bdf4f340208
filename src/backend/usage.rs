// ABOUTME: API activation operations trait.
// ABOUTME: Read whether a named API is enabled for a project and enable it.

use super::Operation;
use super::error::ApiError;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiState {
    Enabled,
    Disabled,
    Unspecified,
}

/// Operations on `projects/*/services/*` API activation resources.
#[async_trait]
pub trait ServiceUsageOps: Send + Sync {
    async fn get_api_state(&self, api_path: &str) -> Result<ApiState, ApiError>;

    async fn enable_api(&self, api_path: &str) -> Result<Operation, ApiError>;

    async fn wait_enable(&self, operation: Operation) -> Result<(), ApiError>;
}
