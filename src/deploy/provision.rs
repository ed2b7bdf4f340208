// ABOUTME: Idempotent provisioning of the source bucket and the image repository.
// ABOUTME: Existing resources are returned unchanged; missing ones are created once.

use crate::backend::{ApiError, ArtifactOps, Repository, RepositoryFormat, StorageOps};
use crate::clock::Clock;
use crate::naming;
use crate::progress::Progress;
use crate::types::{ProjectId, Region};

use super::error::DeployError;
use super::retry::with_retry;

/// Ensure `bucket` exists, creating it in `location` if it does not.
///
/// # Errors
///
/// Returns `DeployError::BucketCreation` if creation fails, or
/// `DeployError::Api` if the existence check fails.
pub async fn ensure_bucket<S: StorageOps + ?Sized>(
    storage: &S,
    clock: &dyn Clock,
    progress: Progress<'_>,
    bucket: &str,
    location: &str,
) -> Result<(), DeployError> {
    let exists = with_retry(clock, &format!("bucket.exists {bucket}"), move || {
        storage.bucket_exists(bucket)
    })
    .await
    .map_err(|source| {
        progress.error(format!("Error checking bucket {bucket}: {source}"));
        DeployError::api(format!("failed to check storage bucket {bucket}"), source)
    })?;

    if exists {
        progress.info(format!("Bucket {bucket} already exists."));
        return Ok(());
    }

    progress.info(format!(
        "Bucket {bucket} does not exist. Creating in location {location}..."
    ));
    with_retry(clock, &format!("createBucket {bucket}"), move || {
        storage.create_bucket(bucket, location)
    })
    .await
    .map_err(|source| {
        progress.error(format!("Failed to create bucket {bucket}: {source}"));
        DeployError::BucketCreation {
            bucket: bucket.to_string(),
            source,
        }
    })?;

    progress.info(format!("Storage bucket {bucket} created."));
    Ok(())
}

/// Ensure the repository `repository_id` exists in `region`.
///
/// # Errors
///
/// Returns `DeployError::Repository` if the lookup fails with anything other
/// than not-found, or if creation fails.
pub async fn ensure_repository<A: ArtifactOps + ?Sized>(
    artifacts: &A,
    clock: &dyn Clock,
    progress: Progress<'_>,
    project: &ProjectId,
    region: &Region,
    repository_id: &str,
    format: RepositoryFormat,
) -> Result<Repository, DeployError> {
    let path = naming::repository_path(project, region, repository_id);
    let repository_error = |source: ApiError| DeployError::Repository {
        repository: repository_id.to_string(),
        source,
    };

    let path_ref = path.as_str();
    match with_retry(clock, &format!("getRepository {repository_id}"), move || {
        artifacts.get_repository(path_ref)
    })
    .await
    {
        Ok(repository) => {
            progress.info(format!("Repository {repository_id} already exists."));
            return Ok(repository);
        }
        Err(err) if err.is_not_found() => {}
        Err(source) => {
            progress.error(format!("Error checking repository {repository_id}: {source}"));
            return Err(repository_error(source));
        }
    }

    progress.info(format!(
        "Repository {repository_id} does not exist. Creating {format} repository in {region}..."
    ));
    let parent = naming::location_path(project, region);
    let parent_ref = parent.as_str();
    let creation_failed = |source: ApiError| {
        progress.error(format!("Failed to create repository {repository_id}: {source}"));
        repository_error(source)
    };
    let operation = with_retry(clock, &format!("createRepository {repository_id}"), move || {
        artifacts.create_repository(parent_ref, repository_id, format)
    })
    .await
    .map_err(creation_failed)?;
    let created = artifacts
        .wait_repository(operation)
        .await
        .map_err(creation_failed)?;

    progress.info(format!("Artifact Registry repository {repository_id} created."));
    Ok(created)
}
