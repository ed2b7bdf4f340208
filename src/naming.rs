// ABOUTME: Deterministic names for every backend resource the pipeline touches.
// ABOUTME: Names are derived from request inputs only, so repeated deploys find the same resources.

use crate::types::{ImageRef, ParseImageRefError, ProjectId, Region, ServiceName};

/// Artifact Registry repository that holds every built image.
pub const REPOSITORY_NAME: &str = "mcp-cloud-run-deployments";

/// Object name of the uploaded source archive.
pub const SOURCE_OBJECT: &str = "source.zip";

/// Label attached to every service this tool creates or updates.
pub const MANAGED_BY_LABEL: (&str, &str) = ("managed-by", "cloudrun-deploy");

/// `{project}-source-bucket`
pub fn bucket_name(project: &ProjectId) -> String {
    format!("{project}-source-bucket")
}

/// `{region}-docker.pkg.dev/{project}/{repository}/{service}:latest`
pub fn image_url(
    project: &ProjectId,
    region: &Region,
    service: &ServiceName,
) -> Result<ImageRef, ParseImageRefError> {
    ImageRef::parse(&format!(
        "{region}-docker.pkg.dev/{project}/{REPOSITORY_NAME}/{service}:latest"
    ))
}

/// `projects/{project}/locations/{region}`
pub fn location_path(project: &ProjectId, region: &Region) -> String {
    format!("projects/{project}/locations/{region}")
}

/// `projects/{project}/locations/{region}/services/{service}`
pub fn service_path(project: &ProjectId, region: &Region, service: &ServiceName) -> String {
    format!("{}/services/{service}", location_path(project, region))
}

/// `projects/{project}/locations/{region}/repositories/{repository}`
pub fn repository_path(project: &ProjectId, region: &Region, repository: &str) -> String {
    format!("{}/repositories/{repository}", location_path(project, region))
}

/// `projects/{project}/services/{api}`
pub fn api_path(project: &ProjectId, api: &str) -> String {
    format!("projects/{project}/services/{api}")
}

/// Revision names must change on every deploy or Cloud Run keeps serving the old one.
pub fn revision_name(service: &ServiceName, now: chrono::DateTime<chrono::Utc>) -> String {
    format!("{service}-{}", now.timestamp_millis())
}
