// ABOUTME: Composable capability traits for the cloud backends the pipeline drives.
// ABOUTME: ComputeOps, StorageOps, ArtifactOps, BuildOps, ServiceUsageOps, LogOps, CloudBackend.

mod artifacts;
mod build;
mod compute;
mod error;
mod logging;
mod storage;
mod usage;

pub use artifacts::{ArtifactOps, Repository, RepositoryFormat};
pub use build::{BuildOps, BuildRecord, BuildSpec, BuildStatus, BuildStep, StorageSource};
pub use compute::{ComputeOps, ServiceDefinition, ServiceRecord};
pub use error::{
    ApiCode, ApiError, Classify, DryRunRejection, ErrorClass, classify_dry_run_rejection,
};
pub use logging::{LogEntry, LogOps, LogQuery};
pub use storage::StorageOps;
pub use usage::{ApiState, ServiceUsageOps};

use crate::types::OperationName;

/// Handle to a long-running backend operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: OperationName,
    pub done: bool,
    /// Final resource, when the backend already finished the operation.
    pub response: Option<serde_json::Value>,
}

impl Operation {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: OperationName::new(name),
            done: false,
            response: None,
        }
    }

    pub fn completed(name: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            name: OperationName::new(name),
            done: true,
            response: Some(response),
        }
    }
}

/// Every backend capability the full source pipeline needs.
///
/// Implemented automatically for any type providing all six traits.
pub trait CloudBackend:
    ComputeOps + StorageOps + ArtifactOps + BuildOps + ServiceUsageOps + LogOps
{
}

impl<T> CloudBackend for T where
    T: ComputeOps + StorageOps + ArtifactOps + BuildOps + ServiceUsageOps + LogOps
{
}
