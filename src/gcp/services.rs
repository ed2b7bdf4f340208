// ABOUTME: Backend trait implementations for GcpClient.
// ABOUTME: Maps each capability onto its Google Cloud REST endpoint.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;

use super::wire::{
    ApiServiceJson, BucketBody, BuildBody, BuildJson, ListEntriesBody, ListEntriesJson,
    OperationJson, RepositoryBody, RepositoryJson, ServiceBody, ServiceJson, decode_response,
};
use super::{
    ARTIFACT_API, BUILD_API, GcpClient, LOGGING_API, RUN_API, STORAGE_API, STORAGE_UPLOAD_API,
    USAGE_API,
};
use crate::backend::{
    ApiError, ApiState, ArtifactOps, BuildOps, BuildRecord, BuildSpec, ComputeOps, LogEntry,
    LogOps, LogQuery, Operation, Repository, RepositoryFormat, ServiceDefinition, ServiceRecord,
    ServiceUsageOps, StorageOps,
};
use crate::types::{BuildId, ProjectId, ServiceName};

fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

#[async_trait]
impl ComputeOps for GcpClient {
    async fn get_service(&self, service_path: &str) -> Result<ServiceRecord, ApiError> {
        let service: ServiceJson = self.get(&format!("{RUN_API}/{service_path}")).await?;
        Ok(service.into())
    }

    async fn create_service(
        &self,
        parent: &str,
        service_id: &ServiceName,
        definition: &ServiceDefinition,
        validate_only: bool,
    ) -> Result<Operation, ApiError> {
        let op: OperationJson = self
            .call(
                Method::POST,
                &format!("{RUN_API}/{parent}/services"),
                &[
                    ("serviceId", service_id.as_str()),
                    ("validateOnly", flag(validate_only)),
                ],
                &ServiceBody::new(None, definition),
            )
            .await?;
        op.into_operation()
    }

    async fn update_service(
        &self,
        service_path: &str,
        definition: &ServiceDefinition,
        validate_only: bool,
    ) -> Result<Operation, ApiError> {
        let op: OperationJson = self
            .call(
                Method::PATCH,
                &format!("{RUN_API}/{service_path}"),
                &[("validateOnly", flag(validate_only))],
                &ServiceBody::new(Some(service_path), definition),
            )
            .await?;
        op.into_operation()
    }

    async fn wait_service(&self, operation: Operation) -> Result<ServiceRecord, ApiError> {
        let response = self.wait_operation(RUN_API, operation).await?;
        let service: ServiceJson = decode_response(response)?;
        Ok(service.into())
    }
}

#[async_trait]
impl StorageOps for GcpClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ApiError> {
        let url = format!("{STORAGE_API}/b/{}", urlencoding::encode(bucket));
        match self.get::<Value>(&url).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_bucket(&self, bucket: &str, location: &str) -> Result<(), ApiError> {
        let _: Value = self
            .call(
                Method::POST,
                &format!("{STORAGE_API}/b"),
                &[("project", self.project().as_str())],
                &BucketBody {
                    name: bucket,
                    location,
                },
            )
            .await?;
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
    ) -> Result<(), ApiError> {
        let url = format!("{STORAGE_UPLOAD_API}/b/{}/o", urlencoding::encode(bucket));
        let _: Value = self
            .upload(
                &url,
                &[("uploadType", "media"), ("name", object)],
                "application/zip",
                data,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactOps for GcpClient {
    async fn get_repository(&self, repository_path: &str) -> Result<Repository, ApiError> {
        let repo: RepositoryJson = self.get(&format!("{ARTIFACT_API}/{repository_path}")).await?;
        Ok(repo.into())
    }

    async fn create_repository(
        &self,
        parent: &str,
        repository_id: &str,
        format: RepositoryFormat,
    ) -> Result<Operation, ApiError> {
        let op: OperationJson = self
            .call(
                Method::POST,
                &format!("{ARTIFACT_API}/{parent}/repositories"),
                &[("repositoryId", repository_id)],
                &RepositoryBody {
                    format: format.as_str(),
                    description: "Container images deployed to Cloud Run",
                },
            )
            .await?;
        op.into_operation()
    }

    async fn wait_repository(&self, operation: Operation) -> Result<Repository, ApiError> {
        let response = self.wait_operation(ARTIFACT_API, operation).await?;
        let repo: RepositoryJson = decode_response(response)?;
        Ok(repo.into())
    }
}

#[async_trait]
impl BuildOps for GcpClient {
    async fn create_build(
        &self,
        project: &ProjectId,
        spec: &BuildSpec,
    ) -> Result<BuildId, ApiError> {
        let op: OperationJson = self
            .call(
                Method::POST,
                &format!("{BUILD_API}/projects/{project}/builds"),
                &[],
                &BuildBody::from(spec),
            )
            .await?;
        match op.build_id() {
            Some(id) => Ok(id),
            None => {
                let name = op.name.clone();
                op.into_operation()?;
                Err(ApiError::internal(format!(
                    "build operation {name} carries no build id"
                )))
            }
        }
    }

    async fn get_build(&self, project: &ProjectId, id: &BuildId) -> Result<BuildRecord, ApiError> {
        let build: BuildJson = self
            .get(&format!(
                "{BUILD_API}/projects/{project}/builds/{}",
                id.as_str()
            ))
            .await?;
        Ok(build.into())
    }
}

#[async_trait]
impl ServiceUsageOps for GcpClient {
    async fn get_api_state(&self, api_path: &str) -> Result<ApiState, ApiError> {
        let api: ApiServiceJson = self.get(&format!("{USAGE_API}/{api_path}")).await?;
        Ok(api.state())
    }

    async fn enable_api(&self, api_path: &str) -> Result<Operation, ApiError> {
        let op: OperationJson = self
            .call(
                Method::POST,
                &format!("{USAGE_API}/{api_path}:enable"),
                &[],
                &serde_json::json!({}),
            )
            .await?;
        op.into_operation()
    }

    async fn wait_enable(&self, operation: Operation) -> Result<(), ApiError> {
        self.wait_operation(USAGE_API, operation).await?;
        Ok(())
    }
}

#[async_trait]
impl LogOps for GcpClient {
    async fn list_entries(&self, query: &LogQuery) -> Result<Vec<LogEntry>, ApiError> {
        let list: ListEntriesJson = self
            .call(
                Method::POST,
                &format!("{LOGGING_API}/entries:list"),
                &[],
                &ListEntriesBody::from(query),
            )
            .await?;
        Ok(list.entries.into_iter().map(LogEntry::from).collect())
    }
}
