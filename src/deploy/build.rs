// ABOUTME: Remote build trigger and status poller.
// ABOUTME: Failed builds are reported with the tail of their logs, or the log URL when logs are unavailable.

use crate::backend::{
    ApiError, BuildOps, BuildRecord, BuildSpec, BuildStatus, BuildStep, LogOps, LogQuery,
    StorageSource,
};
use crate::clock::Clock;
use crate::progress::Progress;
use crate::types::{BuildId, ImageRef, ProjectId};

use super::error::DeployError;
use super::retry::with_retry;
use super::timings::Timings;

const DOCKER_BUILDER: &str = "gcr.io/cloud-builders/docker";
const PACK_BUILDER: &str = "gcr.io/k8s-skaffold/pack";
const BUILDPACKS_BUILDER_IMAGE: &str = "gcr.io/buildpacks/builder:latest";
const WORKSPACE: &str = "/workspace";

/// Log lines attached to a build failure.
const FAILURE_LOG_LINES: u32 = 100;

/// Build definition for the uploaded archive: a Docker build when the source
/// carries a Dockerfile, a buildpacks build otherwise.
pub fn build_spec(bucket: &str, object: &str, image: &ImageRef, has_dockerfile: bool) -> BuildSpec {
    let image_arg = image.to_string();
    let step = if has_dockerfile {
        BuildStep {
            name: DOCKER_BUILDER.to_string(),
            entrypoint: None,
            args: vec!["build".into(), "-t".into(), image_arg, ".".into()],
            dir: WORKSPACE.to_string(),
        }
    } else {
        BuildStep {
            name: PACK_BUILDER.to_string(),
            entrypoint: Some("pack".to_string()),
            args: vec![
                "build".into(),
                image_arg,
                "--builder".into(),
                BUILDPACKS_BUILDER_IMAGE.into(),
            ],
            dir: WORKSPACE.to_string(),
        }
    };

    BuildSpec {
        source: StorageSource {
            bucket: bucket.to_string(),
            object: object.to_string(),
        },
        steps: vec![step],
        images: vec![image.clone()],
    }
}

/// Log filter selecting every entry written by one build.
pub fn build_log_filter(id: &BuildId) -> String {
    format!(r#"resource.type="build" AND resource.labels.build_id="{id}""#)
}

/// Outcome of a single status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// Still queued or running.
    Pending(BuildStatus),
    /// Reached a terminal status.
    Finished(BuildRecord),
}

/// Polls one build until the backend reports a terminal status.
///
/// There is no local ceiling on the number of checks; the backend's own build
/// timeout ends every build with a terminal status.
#[derive(Debug)]
pub struct BuildPoller<'a> {
    project: &'a ProjectId,
    id: BuildId,
    checks: u32,
}

impl<'a> BuildPoller<'a> {
    pub fn new(project: &'a ProjectId, id: BuildId) -> Self {
        Self {
            project,
            id,
            checks: 0,
        }
    }

    pub fn id(&self) -> &BuildId {
        &self.id
    }

    /// Status checks performed so far.
    pub fn checks(&self) -> u32 {
        self.checks
    }

    /// Check the build once.
    pub async fn tick<B: BuildOps + ?Sized>(
        &mut self,
        builds: &B,
        clock: &dyn Clock,
    ) -> Result<PollStep, ApiError> {
        let (project, id) = (self.project, &self.id);
        let record = with_retry(clock, &format!("getBuild {id}"), move || {
            builds.get_build(project, id)
        })
        .await?;
        self.checks += 1;

        if record.status.is_terminal() {
            Ok(PollStep::Finished(record))
        } else {
            Ok(PollStep::Pending(record.status))
        }
    }

    /// Check, sleep, repeat until the build finishes. Sleeps only between checks.
    pub async fn wait<B: BuildOps + ?Sized>(
        mut self,
        builds: &B,
        clock: &dyn Clock,
        progress: Progress<'_>,
        interval: std::time::Duration,
    ) -> Result<BuildRecord, ApiError> {
        loop {
            match self.tick(builds, clock).await? {
                PollStep::Finished(record) => return Ok(record),
                PollStep::Pending(status) => {
                    progress.debug(format!("Build status: {status}. Waiting..."));
                    clock.sleep(interval).await;
                }
            }
        }
    }
}

/// Submit `spec`, wait for it, and return the successful build.
///
/// # Errors
///
/// Returns `DeployError::BuildFailed` when the build ends in any status other
/// than success; the message carries the build ID and either the last log
/// lines or the log URL.
pub async fn run_build<B: BuildOps + LogOps + ?Sized>(
    backend: &B,
    clock: &dyn Clock,
    progress: Progress<'_>,
    timings: &Timings,
    project: &ProjectId,
    spec: &BuildSpec,
) -> Result<BuildRecord, DeployError> {
    progress.info(format!(
        "Initiating Cloud Build for gs://{}/{} in project {project}...",
        spec.source.bucket, spec.source.object
    ));

    let id = with_retry(clock, "createBuild", move || backend.create_build(project, spec))
        .await
        .map_err(|source| {
            progress.error(format!("Failed to start build: {source}"));
            DeployError::api("failed to submit build", source)
        })?;
    progress.info(format!(
        "Cloud Build job started with ID {id}. Waiting for completion..."
    ));

    let record = BuildPoller::new(project, id.clone())
        .wait(backend, clock, progress, timings.poll_interval)
        .await
        .map_err(|source| {
            progress.error(format!("Failed to read status of build {id}: {source}"));
            DeployError::api(format!("failed to poll build {id}"), source)
        })?;

    if record.status == BuildStatus::Success {
        progress.info(format!("Build {id} completed successfully."));
        return Ok(record);
    }

    Err(build_failure(backend, clock, progress, timings, project, record).await)
}

async fn build_failure<L: LogOps + ?Sized>(
    logs: &L,
    clock: &dyn Clock,
    progress: Progress<'_>,
    timings: &Timings,
    project: &ProjectId,
    record: BuildRecord,
) -> DeployError {
    let id = record.id;
    let headline = format!("Build {id} failed with status: {}", record.status);
    let log_url = record
        .log_url
        .unwrap_or_else(|| "(no log URL reported)".to_string());
    progress.error(headline.as_str());
    progress.error(format!("Build logs: {log_url}"));

    progress.info(format!(
        "Attempting to fetch the last {FAILURE_LOG_LINES} log lines for build {id}..."
    ));
    clock.sleep(timings.log_propagation_delay).await;

    let query = LogQuery {
        resource_names: vec![format!("projects/{project}")],
        filter: build_log_filter(&id),
        order_by: "timestamp desc".to_string(),
        page_size: FAILURE_LOG_LINES,
    };

    let detail = match logs.list_entries(&query).await {
        Ok(mut entries) if !entries.is_empty() => {
            entries.reverse();
            let lines = entries
                .iter()
                .map(|entry| entry.payload.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            progress.error(format!("Last log lines from build {id}:\n{lines}"));
            format!("Last log lines:\n{lines}")
        }
        Ok(_) => {
            progress.warn(format!("No log entries found for build {id}."));
            format!("Build logs: {log_url}")
        }
        Err(e) => {
            progress.error(format!("Failed to fetch logs for build {id}: {e}"));
            format!("Build logs: {log_url}")
        }
    };

    DeployError::BuildFailed {
        message: format!("{headline}.\n{detail}"),
        build_id: id,
        status: record.status,
    }
}
