// ABOUTME: Tests for the remote build trigger and status poller.
// ABOUTME: Covers step selection, sleep-between-checks polling and failure log retrieval.

mod support;

use std::time::Duration;

use cloudrun_deploy::backend::{ApiError, BuildStatus};
use cloudrun_deploy::deploy::{
    BuildPoller, DeployError, PollStep, Timings, build_log_filter, build_spec, run_build,
};
use cloudrun_deploy::progress::{CollectingSink, Level, Progress};
use cloudrun_deploy::types::{BuildId, ImageRef, ProjectId};
use support::{FakeCloud, ManualClock};

const BUCKET: &str = "demo-project-source-bucket";

fn project() -> ProjectId {
    ProjectId::new("demo-project").unwrap()
}

fn image() -> ImageRef {
    ImageRef::parse("europe-west1-docker.pkg.dev/demo-project/mcp-cloud-run-deployments/api:latest")
        .unwrap()
}

fn timings() -> Timings {
    Timings::default()
}

// =============================================================================
// Build definition
// =============================================================================

/// Test: A Dockerfile selects the docker builder tagging the target image.
#[test]
fn dockerfile_selects_docker_build() {
    let spec = build_spec(BUCKET, "source.zip", &image(), true);
    let image_arg = image().to_string();

    assert_eq!(spec.source.bucket, BUCKET);
    assert_eq!(spec.source.object, "source.zip");
    assert_eq!(spec.steps.len(), 1);
    let step = &spec.steps[0];
    assert_eq!(step.name, "gcr.io/cloud-builders/docker");
    assert_eq!(step.entrypoint, None);
    assert_eq!(step.args, vec!["build", "-t", image_arg.as_str(), "."]);
    assert_eq!(step.dir, "/workspace");
    assert_eq!(spec.images, vec![image()]);
}

/// Test: No Dockerfile selects the buildpacks pack step.
#[test]
fn no_dockerfile_selects_buildpacks() {
    let spec = build_spec(BUCKET, "source.zip", &image(), false);
    let image_arg = image().to_string();

    let step = &spec.steps[0];
    assert_eq!(step.name, "gcr.io/k8s-skaffold/pack");
    assert_eq!(step.entrypoint.as_deref(), Some("pack"));
    assert_eq!(
        step.args,
        vec![
            "build",
            image_arg.as_str(),
            "--builder",
            "gcr.io/buildpacks/builder:latest"
        ]
    );
    assert_eq!(spec.images, vec![image()]);
}

/// Test: The log filter selects entries of one build.
#[test]
fn log_filter_names_the_build() {
    assert_eq!(
        build_log_filter(&BuildId::new("b-42")),
        r#"resource.type="build" AND resource.labels.build_id="b-42""#
    );
}

// =============================================================================
// Polling
// =============================================================================

/// Test: A single tick reports pending or finished.
#[tokio::test]
async fn tick_reports_one_check() {
    let cloud = FakeCloud::new();
    cloud.build_statuses(&[BuildStatus::Working, BuildStatus::Success]);
    let clock = ManualClock::new();
    let project = project();
    let mut poller = BuildPoller::new(&project, BuildId::new("build-1"));

    assert_eq!(
        poller.tick(&cloud, &clock).await.unwrap(),
        PollStep::Pending(BuildStatus::Working)
    );
    assert!(matches!(
        poller.tick(&cloud, &clock).await.unwrap(),
        PollStep::Finished(ref record) if record.status == BuildStatus::Success
    ));
    assert_eq!(poller.checks(), 2);
    assert!(clock.sleeps().is_empty());
}

/// Test: Waiting sleeps the poll interval only between checks.
#[tokio::test]
async fn wait_sleeps_between_checks_only() {
    let cloud = FakeCloud::new();
    cloud.build_statuses(&[
        BuildStatus::Queued,
        BuildStatus::Working,
        BuildStatus::Working,
        BuildStatus::Success,
    ]);
    let clock = ManualClock::new();
    let project = project();

    let record = BuildPoller::new(&project, BuildId::new("build-1"))
        .wait(&cloud, &clock, Progress::silent(), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(record.status, BuildStatus::Success);
    assert_eq!(cloud.count("get_build"), 4);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 3]);
}

/// Test: An immediately finished build is checked once with no sleep.
#[tokio::test]
async fn finished_build_needs_no_sleep() {
    let cloud = FakeCloud::new();
    cloud.build_statuses(&[BuildStatus::Failure]);
    let clock = ManualClock::new();
    let project = project();

    let record = BuildPoller::new(&project, BuildId::new("build-1"))
        .wait(&cloud, &clock, Progress::silent(), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(record.status, BuildStatus::Failure);
    assert!(clock.sleeps().is_empty());
}

// =============================================================================
// run_build
// =============================================================================

/// Test: A successful build is submitted once and returns its record.
#[tokio::test]
async fn successful_build_returns_record() {
    let cloud = FakeCloud::new();
    cloud.build_statuses(&[BuildStatus::Working, BuildStatus::Success]);
    let clock = ManualClock::new();
    let spec = build_spec(BUCKET, "source.zip", &image(), true);

    let record = run_build(&cloud, &clock, Progress::silent(), &timings(), &project(), &spec)
        .await
        .unwrap();

    assert_eq!(record.id, BuildId::new("build-1"));
    assert_eq!(record.images, vec![image().to_string()]);
    assert_eq!(cloud.builds(), vec![spec]);
    assert_eq!(cloud.count("list_entries"), 0);
}

/// Test: A failed build waits for log propagation and reports the last lines oldest first.
#[tokio::test]
async fn failed_build_reports_log_tail() {
    let cloud = FakeCloud::new();
    cloud
        .build_statuses(&[BuildStatus::Failure])
        .log_entries(&["Step #0: error: exit 1", "Step #0: compiling", "Step #0: starting"]);
    let clock = ManualClock::new();
    let sink = CollectingSink::default();
    let spec = build_spec(BUCKET, "source.zip", &image(), false);

    let err = run_build(&cloud, &clock, Progress::new(Some(&sink)), &timings(), &project(), &spec)
        .await
        .unwrap_err();

    let DeployError::BuildFailed {
        build_id,
        status,
        message,
    } = err
    else {
        panic!("expected BuildFailed");
    };
    assert_eq!(build_id, BuildId::new("build-1"));
    assert_eq!(status, BuildStatus::Failure);
    assert_eq!(
        message,
        "Build build-1 failed with status: FAILURE.\nLast log lines:\n\
         Step #0: starting\nStep #0: compiling\nStep #0: error: exit 1"
    );
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(10_000)]);

    let queries = cloud.log_queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].resource_names, vec!["projects/demo-project".to_string()]);
    assert_eq!(queries[0].order_by, "timestamp desc");
    assert_eq!(queries[0].page_size, 100);
    assert_eq!(queries[0].filter, build_log_filter(&BuildId::new("build-1")));
    assert!(!sink.messages_at(Level::Error).is_empty());
}

/// Test: With no log entries the error carries the log URL instead.
#[tokio::test]
async fn failed_build_without_logs_points_at_log_url() {
    let cloud = FakeCloud::new();
    cloud.build_statuses(&[BuildStatus::Timeout]);
    let clock = ManualClock::new();
    let spec = build_spec(BUCKET, "source.zip", &image(), true);

    let err = run_build(&cloud, &clock, Progress::silent(), &timings(), &project(), &spec)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Build build-1 failed with status: TIMEOUT.\n\
         Build logs: https://console.cloud.google.com/cloud-build/builds/build-1"
    );
}

/// Test: A log read failure is not retried and still yields the log URL.
#[tokio::test]
async fn log_read_failure_falls_back_to_url() {
    let cloud = FakeCloud::new();
    cloud
        .build_statuses(&[BuildStatus::Cancelled])
        .fail("list_entries", ApiError::permission_denied("logging denied"));
    let clock = ManualClock::new();
    let spec = build_spec(BUCKET, "source.zip", &image(), true);

    let err = run_build(&cloud, &clock, Progress::silent(), &timings(), &project(), &spec)
        .await
        .unwrap_err();

    assert_eq!(cloud.count("list_entries"), 1);
    assert!(err.to_string().contains("Build logs: https://"));
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(10_000)]);
}

/// Test: A failure to submit the build is a backend error.
#[tokio::test]
async fn submit_failure_is_reported() {
    let cloud = FakeCloud::new();
    cloud.fail("create_build", ApiError::internal("cloud build unavailable"));
    let clock = ManualClock::new();
    let spec = build_spec(BUCKET, "source.zip", &image(), true);

    let err = run_build(&cloud, &clock, Progress::silent(), &timings(), &project(), &spec)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Api { .. }));
    assert_eq!(cloud.count("get_build"), 0);
}
