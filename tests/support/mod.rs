// ABOUTME: Test support utilities.
// ABOUTME: In-memory cloud backend, recording clock and tracing setup for integration tests.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use cloudrun_deploy::backend::{
    ApiError, ApiState, ArtifactOps, BuildOps, BuildRecord, BuildSpec, BuildStatus, ComputeOps,
    LogEntry, LogOps, LogQuery, Operation, Repository, RepositoryFormat, ServiceDefinition,
    ServiceRecord, ServiceUsageOps, StorageOps,
};
use cloudrun_deploy::clock::Clock;
use cloudrun_deploy::types::{BuildId, ProjectId, ServiceName};
use parking_lot::Mutex;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("cloudrun_deploy=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Fixed instant used by `ManualClock`: 2023-11-14T22:13:20Z.
pub const FIXED_MILLIS: i64 = 1_700_000_000_000;

/// Clock that never sleeps, records every requested wait, and reports a fixed time.
#[derive(Debug, Default)]
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
    }

    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(FIXED_MILLIS).unwrap()
    }
}

/// One service mutation as the fake backend saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub create: bool,
    pub validate_only: bool,
    pub path: String,
    pub definition: ServiceDefinition,
}

#[derive(Default)]
struct State {
    calls: Vec<String>,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
    disabled_apis: HashSet<String>,
    enabled: Vec<String>,
    buckets: HashMap<String, String>,
    repositories: HashMap<String, Repository>,
    uploads: Vec<(String, String, Bytes)>,
    builds: Vec<BuildSpec>,
    build_statuses: VecDeque<BuildStatus>,
    build_log_url: Option<String>,
    log_entries: Vec<LogEntry>,
    log_queries: Vec<LogQuery>,
    services: HashMap<String, ServiceRecord>,
    pending: HashMap<String, ServiceRecord>,
    submissions: Vec<Submission>,
    reject_invoker_bypass: Option<ApiError>,
    next_op: u32,
}

/// In-memory backend implementing every capability trait.
///
/// Resources live in maps keyed by their full path. Failures are scripted per
/// method name with [`FakeCloud::fail`] and are consumed one call at a time.
#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state.lock().build_log_url =
            Some("https://console.cloud.google.com/cloud-build/builds/build-1".to_string());
        fake
    }

    /// Make the next call to `method` fail with `error`. Queued failures stack.
    pub fn fail(&self, method: &'static str, error: ApiError) -> &Self {
        self.state
            .lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(error);
        self
    }

    /// Make the next `times` calls to `method` fail with clones of `error`.
    pub fn fail_times(&self, method: &'static str, error: ApiError, times: usize) -> &Self {
        for _ in 0..times {
            self.fail(method, error.clone());
        }
        self
    }

    pub fn disable_api(&self, api_path: &str) -> &Self {
        self.state.lock().disabled_apis.insert(api_path.to_string());
        self
    }

    pub fn with_bucket(&self, bucket: &str) -> &Self {
        self.state
            .lock()
            .buckets
            .insert(bucket.to_string(), "existing".to_string());
        self
    }

    pub fn with_repository(&self, path: &str) -> &Self {
        self.state.lock().repositories.insert(
            path.to_string(),
            Repository {
                name: path.to_string(),
                format: "DOCKER".to_string(),
            },
        );
        self
    }

    pub fn with_service(&self, path: &str, record: ServiceRecord) -> &Self {
        self.state.lock().services.insert(path.to_string(), record);
        self
    }

    /// Statuses returned by successive `get_build` calls; the last one repeats.
    pub fn build_statuses(&self, statuses: &[BuildStatus]) -> &Self {
        self.state.lock().build_statuses = statuses.iter().copied().collect();
        self
    }

    pub fn without_build_log_url(&self) -> &Self {
        self.state.lock().build_log_url = None;
        self
    }

    /// Entries returned newest first, as the logging API does for `timestamp desc`.
    pub fn log_entries(&self, payloads: &[&str]) -> &Self {
        self.state.lock().log_entries = payloads
            .iter()
            .map(|payload| LogEntry {
                timestamp: None,
                payload: payload.to_string(),
            })
            .collect();
        self
    }

    /// Reject every dry run that asks for the invoker IAM bypass.
    pub fn reject_invoker_bypass(&self, error: ApiError) -> &Self {
        self.state.lock().reject_invoker_bypass = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.split(' ').next() == Some(method))
            .count()
    }

    pub fn enabled_apis(&self) -> Vec<String> {
        self.state.lock().enabled.clone()
    }

    pub fn bucket_location(&self, bucket: &str) -> Option<String> {
        self.state.lock().buckets.get(bucket).cloned()
    }

    pub fn has_repository(&self, path: &str) -> bool {
        self.state.lock().repositories.contains_key(path)
    }

    pub fn uploads(&self) -> Vec<(String, String, Bytes)> {
        self.state.lock().uploads.clone()
    }

    pub fn builds(&self) -> Vec<BuildSpec> {
        self.state.lock().builds.clone()
    }

    pub fn log_queries(&self) -> Vec<LogQuery> {
        self.state.lock().log_queries.clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    pub fn service(&self, path: &str) -> Option<ServiceRecord> {
        self.state.lock().services.get(path).cloned()
    }

    fn record(&self, method: &'static str, detail: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.calls.push(format!("{method} {detail}"));
        match state.failures.get_mut(method).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn next_operation(&self, prefix: &str) -> String {
        let mut state = self.state.lock();
        state.next_op += 1;
        format!("operations/{prefix}-{}", state.next_op)
    }

    fn submit(
        &self,
        create: bool,
        path: String,
        definition: &ServiceDefinition,
        validate_only: bool,
    ) -> Result<Operation, ApiError> {
        let mut state = self.state.lock();
        state.submissions.push(Submission {
            create,
            validate_only,
            path: path.clone(),
            definition: definition.clone(),
        });
        if validate_only && definition.invoker_iam_disabled {
            if let Some(error) = state.reject_invoker_bypass.clone() {
                return Err(error);
            }
        }
        drop(state);

        let name = self.next_operation(if create { "create" } else { "update" });
        if validate_only {
            return Ok(Operation::pending(name));
        }

        let service = path.rsplit('/').next().unwrap_or_default().to_string();
        let record = ServiceRecord {
            name: path,
            uri: Some(format!("https://{service}-abc123-ew.a.run.app")),
            latest_ready_revision: Some(definition.revision.clone()),
            invoker_iam_disabled: definition.invoker_iam_disabled,
        };
        self.state.lock().pending.insert(name.clone(), record);
        Ok(Operation::pending(name))
    }
}

#[async_trait]
impl ServiceUsageOps for FakeCloud {
    async fn get_api_state(&self, api_path: &str) -> Result<ApiState, ApiError> {
        self.record("get_api_state", api_path)?;
        if self.state.lock().disabled_apis.contains(api_path) {
            Ok(ApiState::Disabled)
        } else {
            Ok(ApiState::Enabled)
        }
    }

    async fn enable_api(&self, api_path: &str) -> Result<Operation, ApiError> {
        self.record("enable_api", api_path)?;
        let mut state = self.state.lock();
        state.disabled_apis.remove(api_path);
        state.enabled.push(api_path.to_string());
        Ok(Operation::pending(format!("operations/enable-{api_path}")))
    }

    async fn wait_enable(&self, operation: Operation) -> Result<(), ApiError> {
        self.record("wait_enable", operation.name.as_str())
    }
}

#[async_trait]
impl StorageOps for FakeCloud {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ApiError> {
        self.record("bucket_exists", bucket)?;
        Ok(self.state.lock().buckets.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str, location: &str) -> Result<(), ApiError> {
        self.record("create_bucket", bucket)?;
        self.state
            .lock()
            .buckets
            .insert(bucket.to_string(), location.to_string());
        Ok(())
    }

    async fn upload_object(&self, bucket: &str, object: &str, data: Bytes) -> Result<(), ApiError> {
        self.record("upload_object", &format!("{bucket}/{object}"))?;
        self.state
            .lock()
            .uploads
            .push((bucket.to_string(), object.to_string(), data));
        Ok(())
    }
}

#[async_trait]
impl ArtifactOps for FakeCloud {
    async fn get_repository(&self, repository_path: &str) -> Result<Repository, ApiError> {
        self.record("get_repository", repository_path)?;
        self.state
            .lock()
            .repositories
            .get(repository_path)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("Repository {repository_path} not found")))
    }

    async fn create_repository(
        &self,
        parent: &str,
        repository_id: &str,
        format: RepositoryFormat,
    ) -> Result<Operation, ApiError> {
        let path = format!("{parent}/repositories/{repository_id}");
        self.record("create_repository", &path)?;
        let repository = Repository {
            name: path.clone(),
            format: format.to_string(),
        };
        self.state.lock().repositories.insert(path.clone(), repository);
        Ok(Operation::completed(
            format!("operations/repository-{repository_id}"),
            serde_json::json!({ "name": path, "format": format.as_str() }),
        ))
    }

    async fn wait_repository(&self, operation: Operation) -> Result<Repository, ApiError> {
        self.record("wait_repository", operation.name.as_str())?;
        let name = operation
            .response
            .as_ref()
            .and_then(|r| r.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(Repository {
            name,
            format: "DOCKER".to_string(),
        })
    }
}

#[async_trait]
impl BuildOps for FakeCloud {
    async fn create_build(&self, project: &ProjectId, spec: &BuildSpec) -> Result<BuildId, ApiError> {
        self.record("create_build", project.as_str())?;
        self.state.lock().builds.push(spec.clone());
        Ok(BuildId::new("build-1"))
    }

    async fn get_build(&self, project: &ProjectId, id: &BuildId) -> Result<BuildRecord, ApiError> {
        self.record("get_build", &format!("{project}/{id}"))?;
        let mut state = self.state.lock();
        let status = if state.build_statuses.len() > 1 {
            state.build_statuses.pop_front().unwrap_or(BuildStatus::Success)
        } else {
            state.build_statuses.front().copied().unwrap_or(BuildStatus::Success)
        };
        let images = match (status, state.builds.last()) {
            (BuildStatus::Success, Some(spec)) => {
                spec.images.iter().map(ToString::to_string).collect()
            }
            _ => Vec::new(),
        };
        Ok(BuildRecord {
            id: id.clone(),
            status,
            images,
            log_url: state.build_log_url.clone(),
        })
    }
}

#[async_trait]
impl LogOps for FakeCloud {
    async fn list_entries(&self, query: &LogQuery) -> Result<Vec<LogEntry>, ApiError> {
        self.record("list_entries", &query.filter)?;
        let mut state = self.state.lock();
        state.log_queries.push(query.clone());
        Ok(state.log_entries.clone())
    }
}

#[async_trait]
impl ComputeOps for FakeCloud {
    async fn get_service(&self, service_path: &str) -> Result<ServiceRecord, ApiError> {
        self.record("get_service", service_path)?;
        self.state
            .lock()
            .services
            .get(service_path)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("Service {service_path} not found")))
    }

    async fn create_service(
        &self,
        parent: &str,
        service_id: &ServiceName,
        definition: &ServiceDefinition,
        validate_only: bool,
    ) -> Result<Operation, ApiError> {
        let path = format!("{parent}/services/{service_id}");
        self.record("create_service", &format!("{path} validate_only={validate_only}"))?;
        self.submit(true, path, definition, validate_only)
    }

    async fn update_service(
        &self,
        service_path: &str,
        definition: &ServiceDefinition,
        validate_only: bool,
    ) -> Result<Operation, ApiError> {
        self.record(
            "update_service",
            &format!("{service_path} validate_only={validate_only}"),
        )?;
        self.submit(false, service_path.to_string(), definition, validate_only)
    }

    async fn wait_service(&self, operation: Operation) -> Result<ServiceRecord, ApiError> {
        self.record("wait_service", operation.name.as_str())?;
        let mut state = self.state.lock();
        let record = state
            .pending
            .remove(operation.name.as_str())
            .ok_or_else(|| ApiError::internal(format!("unknown operation {}", operation.name)))?;
        state.services.insert(record.name.clone(), record.clone());
        Ok(record)
    }
}
