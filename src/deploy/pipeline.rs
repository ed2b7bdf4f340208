// ABOUTME: Pipeline orchestrator for source deploys and image-only deploys.
// ABOUTME: Sequences activation, provisioning, packaging, upload, build and rollout.

use nonempty::NonEmpty;

use crate::backend::{
    CloudBackend, ComputeOps, RepositoryFormat, ServiceDefinition, ServiceRecord, ServiceUsageOps,
};
use crate::clock::{Clock, SystemClock};
use crate::naming::{self, REPOSITORY_NAME, SOURCE_OBJECT};
use crate::progress::{Progress, ProgressSink};
use crate::types::{ImageRef, ProjectId, Region, ServiceName};

use super::activation::{IMAGE_ONLY_APIS, REQUIRED_APIS, enable_apis};
use super::build::{build_spec, run_build};
use super::error::DeployError;
use super::package::{FileItem, detect_dockerfile, package_files};
use super::provision::{ensure_bucket, ensure_repository};
use super::retry::with_retry;
use super::rollout::Rollout;
use super::timings::Timings;

/// Deploy local source: package, build remotely, roll out.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub project: ProjectId,
    pub service: ServiceName,
    pub region: Region,
    pub files: NonEmpty<FileItem>,
    /// Disable the invoker IAM check so the service is publicly reachable.
    pub skip_iam_check: bool,
}

impl DeployRequest {
    /// Validate raw inputs into a request.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::InvalidRequest` naming the first missing or malformed field.
    pub fn new(
        project: &str,
        service: &str,
        region: &str,
        files: Vec<FileItem>,
    ) -> Result<Self, DeployError> {
        let (project, service, region) = validate_target(project, service, region)?;
        let files = NonEmpty::from_vec(files).ok_or_else(|| {
            DeployError::InvalidRequest("no files specified for deployment".to_string())
        })?;

        Ok(Self {
            project,
            service,
            region,
            files,
            skip_iam_check: true,
        })
    }

    pub fn skip_iam_check(mut self, skip: bool) -> Self {
        self.skip_iam_check = skip;
        self
    }
}

/// Deploy an already-built container image.
#[derive(Debug, Clone)]
pub struct DeployImageRequest {
    pub project: ProjectId,
    pub service: ServiceName,
    pub region: Region,
    pub image: ImageRef,
    pub skip_iam_check: bool,
}

impl DeployImageRequest {
    /// Validate raw inputs into a request.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::InvalidRequest` naming the first missing or malformed field.
    pub fn new(project: &str, service: &str, region: &str, image: &str) -> Result<Self, DeployError> {
        let (project, service, region) = validate_target(project, service, region)?;
        if image.trim().is_empty() {
            return Err(DeployError::InvalidRequest("image reference is required".to_string()));
        }
        let image = ImageRef::parse(image)
            .map_err(|e| DeployError::InvalidRequest(format!("image reference: {e}")))?;

        Ok(Self {
            project,
            service,
            region,
            image,
            skip_iam_check: true,
        })
    }

    pub fn skip_iam_check(mut self, skip: bool) -> Self {
        self.skip_iam_check = skip;
        self
    }
}

fn validate_target(
    project: &str,
    service: &str,
    region: &str,
) -> Result<(ProjectId, ServiceName, Region), DeployError> {
    let invalid = |field: &str, e: &dyn std::fmt::Display| {
        DeployError::InvalidRequest(format!("{field}: {e}"))
    };

    let project = ProjectId::new(project).map_err(|e| invalid("project", &e))?;
    let service = ServiceName::new(service).map_err(|e| invalid("service", &e))?;
    let region = Region::new(region).map_err(|e| invalid("region", &e))?;
    Ok((project, service, region))
}

/// Everything one deploy call needs from the outside world.
///
/// Nothing here survives between calls; resources are found again by their
/// deterministic names each time.
pub struct Pipeline<'a, B: ?Sized> {
    backend: &'a B,
    clock: &'a dyn Clock,
    progress: Progress<'a>,
    timings: Timings,
}

impl<'a, B: ?Sized> Pipeline<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            clock: &SystemClock,
            progress: Progress::silent(),
            timings: Timings::default(),
        }
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.progress = Progress::new(Some(sink));
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Report a failed run before handing the error back unchanged.
    fn report<T>(&self, result: Result<T, DeployError>) -> Result<T, DeployError> {
        if let Err(e) = &result {
            self.progress.error(format!("Deployment Failed: {e}"));
        }
        result
    }
}

impl<B: CloudBackend + ?Sized> Pipeline<'_, B> {
    /// Package `request.files`, build them into an image and deploy it.
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that fails; later stages do not run.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<ServiceRecord, DeployError> {
        let result = self.deploy_source(request).await;
        self.report(result)
    }

    async fn deploy_source(&self, request: &DeployRequest) -> Result<ServiceRecord, DeployError> {
        let (backend, clock, progress) = (self.backend, self.clock, self.progress);
        let DeployRequest {
            project,
            service,
            region,
            files,
            skip_iam_check,
        } = request;

        progress.info(format!(
            "Starting deployment of {service} to project {project} in {region}..."
        ));

        enable_apis(
            backend,
            clock,
            progress,
            project,
            &REQUIRED_APIS,
            self.timings.activation_retry_delay,
        )
        .await?;

        let items: Vec<FileItem> = files.iter().cloned().collect();
        let has_dockerfile = detect_dockerfile(&items);
        if has_dockerfile {
            progress.info("Dockerfile found. Building with Docker.");
        } else {
            progress.info("No Dockerfile found. Building with buildpacks.");
        }

        let bucket = naming::bucket_name(project);
        let image = naming::image_url(project, region, service)
            .map_err(|e| DeployError::InvalidRequest(format!("target image: {e}")))?;

        ensure_bucket(backend, clock, progress, &bucket, region.as_str()).await?;
        ensure_repository(
            backend,
            clock,
            progress,
            project,
            region,
            REPOSITORY_NAME,
            RepositoryFormat::Docker,
        )
        .await?;

        progress.info(format!("Packaging {} source item(s)...", items.len()));
        let packaged = package_files(items).await.inspect_err(|e| {
            progress.error(format!("Failed to package source: {e}"));
        })?;
        for warning in packaged.diagnostics.warnings() {
            progress.warn(warning.message.as_str());
        }

        progress.info(format!(
            "Uploading {} file(s) ({} bytes) to gs://{bucket}/{SOURCE_OBJECT}...",
            packaged.files,
            packaged.archive.len()
        ));
        let archive = packaged.archive;
        let bucket_ref = bucket.as_str();
        with_retry(clock, &format!("upload {SOURCE_OBJECT}"), move || {
            backend.upload_object(bucket_ref, SOURCE_OBJECT, archive.clone())
        })
        .await
        .map_err(|source| {
            progress.error(format!("Failed to upload source: {source}"));
            DeployError::Upload {
                bucket: bucket.clone(),
                object: SOURCE_OBJECT.to_string(),
                source,
            }
        })?;
        progress.info(format!("Source uploaded to gs://{bucket}/{SOURCE_OBJECT}."));

        let spec = build_spec(&bucket, SOURCE_OBJECT, &image, has_dockerfile);
        run_build(backend, clock, progress, &self.timings, project, &spec).await?;

        self.roll_out(project, region, service, image, *skip_iam_check)
            .await
    }
}

impl<B: ComputeOps + ServiceUsageOps + ?Sized> Pipeline<'_, B> {
    /// Deploy `request.image` directly, skipping every source stage.
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that fails.
    pub async fn deploy_image(
        &self,
        request: &DeployImageRequest,
    ) -> Result<ServiceRecord, DeployError> {
        let result = self.deploy_prebuilt(request).await;
        self.report(result)
    }

    async fn deploy_prebuilt(
        &self,
        request: &DeployImageRequest,
    ) -> Result<ServiceRecord, DeployError> {
        self.progress.info(format!(
            "Starting deployment of image {} as {} to project {} in {}...",
            request.image, request.service, request.project, request.region
        ));
        enable_apis(
            self.backend,
            self.clock,
            self.progress,
            &request.project,
            &IMAGE_ONLY_APIS,
            self.timings.activation_retry_delay,
        )
        .await?;

        self.roll_out(
            &request.project,
            &request.region,
            &request.service,
            request.image.clone(),
            request.skip_iam_check,
        )
        .await
    }

    async fn roll_out(
        &self,
        project: &ProjectId,
        region: &Region,
        service: &ServiceName,
        image: ImageRef,
        skip_iam_check: bool,
    ) -> Result<ServiceRecord, DeployError> {
        let (compute, clock, progress) = (self.backend, self.clock, self.progress);
        let definition = ServiceDefinition::new(service, image, skip_iam_check, clock.now());

        let rollout = Rollout::new(project.clone(), region.clone(), service.clone(), definition)
            .check_existing(compute, clock, progress)
            .await?
            .validate(compute, clock, progress)
            .await?
            .apply(compute, clock, progress)
            .await?;

        Ok(rollout.into_record())
    }
}
