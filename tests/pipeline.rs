// ABOUTME: End-to-end tests for the deploy pipeline against the in-memory backend.
// ABOUTME: Verifies stage ordering, abort-on-failure, idempotent re-deploys and image-only deploys.

mod support;

use std::fs;
use std::io::Cursor;

use cloudrun_deploy::backend::{ApiError, BuildStatus};
use cloudrun_deploy::deploy::{
    DeployError, DeployErrorKind, DeployImageRequest, DeployRequest, FileItem, Pipeline,
};
use cloudrun_deploy::progress::{CollectingSink, Level};
use support::{FakeCloud, ManualClock};

const BUCKET: &str = "demo-project-source-bucket";
const IMAGE: &str = "europe-west1-docker.pkg.dev/demo-project/mcp-cloud-run-deployments/api:latest";
const SERVICE_PATH: &str = "projects/demo-project/locations/europe-west1/services/api";
const SERVICE_URL: &str = "https://api-abc123-ew.a.run.app";
const REPOSITORY_PATH: &str =
    "projects/demo-project/locations/europe-west1/repositories/mcp-cloud-run-deployments";

fn source_dir(with_dockerfile: bool) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.py"), "print('hello')\n").unwrap();
    if with_dockerfile {
        fs::write(dir.path().join("Dockerfile"), "FROM python:3.12-slim\n").unwrap();
    }
    dir
}

fn request(dir: &tempfile::TempDir) -> DeployRequest {
    DeployRequest::new(
        "demo-project",
        "api",
        "europe-west1",
        vec![FileItem::path(dir.path())],
    )
    .unwrap()
}

fn archive_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

// =============================================================================
// Request validation
// =============================================================================

/// Test: Every required field is checked before anything runs.
#[test]
fn requests_reject_missing_fields() {
    let files = || vec![FileItem::inline("main.py", "print(1)")];

    for (project, service, region) in [
        ("", "api", "europe-west1"),
        ("demo-project", "", "europe-west1"),
        ("demo-project", "api", ""),
        ("demo-project", "Bad_Service", "europe-west1"),
    ] {
        let err = DeployRequest::new(project, service, region, files()).unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::InvalidRequest, "{project}/{service}/{region}");
    }

    let err = DeployRequest::new("demo-project", "api", "europe-west1", vec![]).unwrap_err();
    assert!(err.to_string().contains("no files specified"));

    let err = DeployImageRequest::new("demo-project", "api", "europe-west1", " ").unwrap_err();
    assert_eq!(err.kind(), DeployErrorKind::InvalidRequest);
}

/// Test: The invoker bypass is requested unless turned off.
#[test]
fn invoker_bypass_defaults_on() {
    let dir = source_dir(false);
    assert!(request(&dir).skip_iam_check);
    assert!(!request(&dir).skip_iam_check(false).skip_iam_check);
}

// =============================================================================
// Source deploys
// =============================================================================

/// Test: A fresh project goes through every stage in order and ends with a created service.
#[tokio::test]
async fn source_deploy_runs_every_stage() {
    support::init_tracing();
    let cloud = FakeCloud::new();
    let clock = ManualClock::new();
    let sink = CollectingSink::default();
    let dir = source_dir(true);

    let record = Pipeline::new(&cloud)
        .with_clock(&clock)
        .with_progress(&sink)
        .deploy(&request(&dir))
        .await
        .unwrap();

    assert_eq!(record.name, SERVICE_PATH);
    assert_eq!(record.uri.as_deref(), Some(SERVICE_URL));
    assert!(record.invoker_iam_disabled);
    assert_eq!(cloud.service(SERVICE_PATH), Some(record.clone()));

    assert_eq!(cloud.bucket_location(BUCKET).as_deref(), Some("europe-west1"));
    assert!(cloud.has_repository(REPOSITORY_PATH));

    let uploads = cloud.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!((uploads[0].0.as_str(), uploads[0].1.as_str()), (BUCKET, "source.zip"));
    assert_eq!(archive_names(&uploads[0].2), vec!["Dockerfile", "main.py"]);

    let builds = cloud.builds();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].steps[0].name, "gcr.io/cloud-builders/docker");
    assert_eq!(builds[0].images[0].to_string(), IMAGE);

    // One dry-run create, then one real create of the same definition.
    let submissions = cloud.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(
        submissions
            .iter()
            .map(|s| (s.create, s.validate_only, s.path.as_str()))
            .collect::<Vec<_>>(),
        vec![(true, true, SERVICE_PATH), (true, false, SERVICE_PATH)]
    );
    assert_eq!(submissions[0].definition, submissions[1].definition);
    assert_eq!(submissions[1].definition.image.to_string(), IMAGE);
    assert_eq!(cloud.count("create_service"), 2);
    assert_eq!(cloud.count("update_service"), 0);
    assert_eq!(cloud.count("create_build"), 1);

    // Stage order as seen by the backend.
    let first_call_index = |method: &str| {
        cloud
            .calls()
            .iter()
            .position(|call| call.starts_with(method))
            .unwrap()
    };
    let order = [
        "get_api_state",
        "bucket_exists",
        "get_repository",
        "upload_object",
        "create_build",
        "get_build",
        "get_service",
        "create_service",
        "wait_service",
    ]
    .map(first_call_index);
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{order:?}");

    let info = sink.messages_at(Level::Info);
    assert!(info[0].starts_with("Starting deployment of api"));
    assert!(info.iter().any(|m| m == "Dockerfile found. Building with Docker."));
    assert!(sink.messages_at(Level::Error).is_empty());
}

/// Test: Without a Dockerfile the build uses buildpacks.
#[tokio::test]
async fn source_without_dockerfile_uses_buildpacks() {
    let cloud = FakeCloud::new();
    let clock = ManualClock::new();
    let dir = source_dir(false);

    Pipeline::new(&cloud)
        .with_clock(&clock)
        .deploy(&request(&dir))
        .await
        .unwrap();

    assert_eq!(cloud.builds()[0].steps[0].name, "gcr.io/k8s-skaffold/pack");
}

/// Test: A second deploy reuses every resource and updates the service.
#[tokio::test]
async fn redeploy_is_idempotent() {
    let cloud = FakeCloud::new();
    let clock = ManualClock::new();
    let dir = source_dir(true);
    let pipeline = Pipeline::new(&cloud).with_clock(&clock);

    pipeline.deploy(&request(&dir)).await.unwrap();
    pipeline.deploy(&request(&dir)).await.unwrap();

    assert_eq!(cloud.count("create_bucket"), 1);
    assert_eq!(cloud.count("create_repository"), 1);
    assert_eq!(cloud.count("upload_object"), 2);
    assert_eq!(cloud.count("create_service"), 2, "dry run and create, first deploy only");
    assert_eq!(cloud.count("update_service"), 2, "dry run and update");
}

/// Test: An activation failure stops the pipeline before provisioning.
#[tokio::test]
async fn activation_failure_aborts_pipeline() {
    let cloud = FakeCloud::new();
    cloud.fail_times("get_api_state", ApiError::internal("service usage down"), 2);
    let clock = ManualClock::new();
    let sink = CollectingSink::default();
    let dir = source_dir(true);

    let err = Pipeline::new(&cloud)
        .with_clock(&clock)
        .with_progress(&sink)
        .deploy(&request(&dir))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::ApiActivation);
    assert_eq!(cloud.count("bucket_exists"), 0);
    assert_eq!(cloud.count("create_build"), 0);
    let errors = sink.messages_at(Level::Error);
    assert_eq!(errors.last().unwrap(), &format!("Deployment Failed: {err}"));
}

/// Test: A failed build never reaches the service stage.
#[tokio::test]
async fn build_failure_skips_rollout() {
    let cloud = FakeCloud::new();
    cloud
        .build_statuses(&[BuildStatus::Working, BuildStatus::Failure])
        .log_entries(&["Step #1: npm ERR! missing script: start"]);
    let clock = ManualClock::new();
    let dir = source_dir(false);

    let err = Pipeline::new(&cloud)
        .with_clock(&clock)
        .deploy(&request(&dir))
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::BuildFailed { status: BuildStatus::Failure, .. }));
    assert!(err.to_string().contains("npm ERR! missing script: start"));
    assert_eq!(cloud.count("get_service"), 0);
    assert_eq!(cloud.count("create_service"), 0);
}

/// Test: A missing source path aborts after provisioning and before upload.
#[tokio::test]
async fn missing_source_aborts_before_upload() {
    let cloud = FakeCloud::new();
    let clock = ManualClock::new();
    let dir = tempfile::tempdir().unwrap();
    let request = DeployRequest::new(
        "demo-project",
        "api",
        "europe-west1",
        vec![FileItem::path(dir.path().join("absent"))],
    )
    .unwrap();

    let err = Pipeline::new(&cloud)
        .with_clock(&clock)
        .deploy(&request)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Packaging);
    assert!(err.to_string().contains("File or directory not found"));
    assert_eq!(cloud.count("upload_object"), 0);
}

/// Test: Upload failures from permission propagation are retried; others abort.
#[tokio::test]
async fn upload_failures() {
    let cloud = FakeCloud::new();
    cloud.fail("upload_object", ApiError::permission_denied("storage.objects.create denied"));
    let clock = ManualClock::new();
    let dir = source_dir(true);

    Pipeline::new(&cloud)
        .with_clock(&clock)
        .deploy(&request(&dir))
        .await
        .unwrap();
    assert_eq!(cloud.count("upload_object"), 2);

    let cloud = FakeCloud::new();
    cloud.fail("upload_object", ApiError::internal("connection reset"));
    let err = Pipeline::new(&cloud)
        .with_clock(&clock)
        .deploy(&request(&dir))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Upload { ref object, .. } if object == "source.zip"));
    assert_eq!(cloud.count("create_build"), 0);
}

/// Test: Turning the bypass off deploys with the invoker check enabled.
#[tokio::test]
async fn bypass_can_be_turned_off() {
    let cloud = FakeCloud::new();
    let clock = ManualClock::new();
    let dir = source_dir(true);

    let record = Pipeline::new(&cloud)
        .with_clock(&clock)
        .deploy(&request(&dir).skip_iam_check(false))
        .await
        .unwrap();

    assert!(!record.invoker_iam_disabled);
    assert!(cloud.submissions().iter().all(|s| !s.definition.invoker_iam_disabled));
}

/// Test: Entries skipped while packaging are surfaced as warnings, not failures.
#[cfg(unix)]
#[tokio::test]
async fn packaging_warnings_are_reported() {
    let cloud = FakeCloud::new();
    let clock = ManualClock::new();
    let sink = CollectingSink::default();
    let dir = source_dir(true);
    std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling")).unwrap();

    Pipeline::new(&cloud)
        .with_clock(&clock)
        .with_progress(&sink)
        .deploy(&request(&dir))
        .await
        .unwrap();

    let warnings = sink.messages_at(Level::Warn);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("dangling"));
}

// =============================================================================
// Image deploys
// =============================================================================

/// Test: An image deploy only needs the run API and skips every source stage.
#[tokio::test]
async fn image_deploy_skips_source_stages() {
    let cloud = FakeCloud::new();
    let clock = ManualClock::new();
    let request = DeployImageRequest::new(
        "demo-project",
        "api",
        "europe-west1",
        "us-docker.pkg.dev/cloudrun/container/hello",
    )
    .unwrap();

    let record = Pipeline::new(&cloud)
        .with_clock(&clock)
        .deploy_image(&request)
        .await
        .unwrap();

    assert_eq!(record.name, SERVICE_PATH);
    assert_eq!(
        cloud.calls()[0],
        "get_api_state projects/demo-project/services/run.googleapis.com"
    );
    assert_eq!(cloud.count("get_api_state"), 1);
    assert_eq!(cloud.count("bucket_exists"), 0);
    assert_eq!(cloud.count("create_build"), 0);

    let applied = cloud
        .submissions()
        .into_iter()
        .find(|s| !s.validate_only)
        .unwrap();
    assert_eq!(
        applied.definition.image.to_string(),
        "us-docker.pkg.dev/cloudrun/container/hello:latest"
    );
}
