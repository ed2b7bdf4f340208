// ABOUTME: Remote build operations trait and build job model.
// ABOUTME: Submit a build from an uploaded source archive and read its status back.

use super::error::ApiError;
use crate::types::{BuildId, ImageRef, ProjectId};
use async_trait::async_trait;

/// Build operations.
#[async_trait]
pub trait BuildOps: Send + Sync {
    /// Submit a build and return its ID.
    async fn create_build(&self, project: &ProjectId, spec: &BuildSpec)
    -> Result<BuildId, ApiError>;

    async fn get_build(&self, project: &ProjectId, id: &BuildId) -> Result<BuildRecord, ApiError>;
}

/// Location of the source archive a build starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSource {
    pub bucket: String,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    /// Builder image.
    pub name: String,
    pub entrypoint: Option<String>,
    pub args: Vec<String>,
    pub dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub source: StorageSource,
    pub steps: Vec<BuildStep>,
    /// Images the build must push.
    pub images: Vec<ImageRef>,
}

/// Build status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Queued,
    Working,
    Success,
    Failure,
    InternalError,
    Timeout,
    Cancelled,
}

impl BuildStatus {
    /// Parse the backend's status string. Unrecognised states count as queued.
    pub fn from_api(status: &str) -> Self {
        match status {
            "WORKING" => BuildStatus::Working,
            "SUCCESS" => BuildStatus::Success,
            "FAILURE" => BuildStatus::Failure,
            "INTERNAL_ERROR" => BuildStatus::InternalError,
            // Expired builds sat in the queue past their TTL.
            "TIMEOUT" | "EXPIRED" => BuildStatus::Timeout,
            "CANCELLED" => BuildStatus::Cancelled,
            _ => BuildStatus::Queued,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Queued => "QUEUED",
            BuildStatus::Working => "WORKING",
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Failure => "FAILURE",
            BuildStatus::InternalError => "INTERNAL_ERROR",
            BuildStatus::Timeout => "TIMEOUT",
            BuildStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildStatus::Queued | BuildStatus::Working)
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    pub id: BuildId,
    pub status: BuildStatus,
    /// Pushed images (`results.images[].name`).
    pub images: Vec<String>,
    pub log_url: Option<String>,
}
