// ABOUTME: Artifact repository operations trait.
// ABOUTME: Fetch a repository by path, create one and wait for the creation to settle.

use super::Operation;
use super::error::ApiError;
use async_trait::async_trait;
use std::fmt;

/// Package format of an artifact repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepositoryFormat {
    #[default]
    Docker,
    Maven,
    Npm,
    Python,
}

impl RepositoryFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryFormat::Docker => "DOCKER",
            RepositoryFormat::Maven => "MAVEN",
            RepositoryFormat::Npm => "NPM",
            RepositoryFormat::Python => "PYTHON",
        }
    }
}

impl fmt::Display for RepositoryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub format: String,
}

/// Artifact repository operations.
#[async_trait]
pub trait ArtifactOps: Send + Sync {
    /// Fetch a repository by full path. Missing repositories are `NOT_FOUND`.
    async fn get_repository(&self, repository_path: &str) -> Result<Repository, ApiError>;

    async fn create_repository(
        &self,
        parent: &str,
        repository_id: &str,
        format: RepositoryFormat,
    ) -> Result<Operation, ApiError>;

    async fn wait_repository(&self, operation: Operation) -> Result<Repository, ApiError>;
}
