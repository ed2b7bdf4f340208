// ABOUTME: Error types for deployment pipeline stages.
// ABOUTME: Each variant keeps the underlying cause so the caller sees the original backend message.

use std::path::PathBuf;

use crate::backend::{ApiError, BuildStatus};
use crate::types::{BuildId, ServiceName};

/// Errors that abort a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A required request field is missing or malformed.
    #[error("invalid deploy request: {0}")]
    InvalidRequest(String),

    /// An API could not be enabled, even after the second attempt.
    #[error("Failed to ensure API [{api}] is enabled. Please check manually. Cause: {source}")]
    ApiActivation { api: String, source: ApiError },

    #[error("failed to create storage bucket {bucket}: {source}")]
    BucketCreation { bucket: String, source: ApiError },

    #[error("failed to ensure artifact repository {repository}: {source}")]
    Repository { repository: String, source: ApiError },

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("failed to upload source to gs://{bucket}/{object}: {source}")]
    Upload {
        bucket: String,
        object: String,
        source: ApiError,
    },

    /// The build reached a terminal status other than success.
    #[error("{message}")]
    BuildFailed {
        build_id: BuildId,
        status: BuildStatus,
        message: String,
    },

    /// The validate-only mutation failed for a reason other than the invoker flag.
    #[error("dry run validation failed for service {service}: {source}")]
    Validation {
        service: ServiceName,
        source: ApiError,
    },

    /// Any other backend failure.
    #[error("{context}: {source}")]
    Api { context: String, source: ApiError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    InvalidRequest,
    ApiActivation,
    Provisioning,
    Packaging,
    Upload,
    Build,
    Validation,
    Backend,
}

impl DeployError {
    pub fn api(context: impl Into<String>, source: ApiError) -> Self {
        DeployError::Api {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::InvalidRequest(_) => DeployErrorKind::InvalidRequest,
            DeployError::ApiActivation { .. } => DeployErrorKind::ApiActivation,
            DeployError::BucketCreation { .. } | DeployError::Repository { .. } => {
                DeployErrorKind::Provisioning
            }
            DeployError::Package(_) => DeployErrorKind::Packaging,
            DeployError::Upload { .. } => DeployErrorKind::Upload,
            DeployError::BuildFailed { .. } => DeployErrorKind::Build,
            DeployError::Validation { .. } => DeployErrorKind::Validation,
            DeployError::Api { .. } => DeployErrorKind::Backend,
        }
    }

    /// The backend error underneath, if there is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            DeployError::ApiActivation { source, .. }
            | DeployError::BucketCreation { source, .. }
            | DeployError::Repository { source, .. }
            | DeployError::Upload { source, .. }
            | DeployError::Validation { source, .. }
            | DeployError::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from building the source archive.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("File or directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid file format: {0}")]
    InvalidFile(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("packaging task failed: {0}")]
    Task(String),
}
