// ABOUTME: Deployment pipeline: retry, API activation, provisioning, packaging, build, rollout.
// ABOUTME: Exports the orchestrator entry points and the Rollout typestate used for service mutation.

mod activation;
mod build;
mod error;
mod package;
mod pipeline;
mod provision;
mod retry;
mod rollout;
mod state;
mod timings;
mod transitions;

pub use activation::{IMAGE_ONLY_APIS, REQUIRED_APIS, enable_apis};
pub use build::{BuildPoller, PollStep, build_log_filter, build_spec, run_build};
pub use error::{DeployError, DeployErrorKind, PackageError};
pub use package::{FileItem, PackagedSource, detect_dockerfile, normalize_path, package_files};
pub use pipeline::{DeployImageRequest, DeployRequest, Pipeline};
pub use provision::{ensure_bucket, ensure_repository};
pub use retry::{MAX_RETRIES, backoff_delay, with_retry};
pub use rollout::Rollout;
pub use state::{Checked, Deployed, Initialized, RolloutMode, Validated};
pub use timings::Timings;
