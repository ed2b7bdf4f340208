// ABOUTME: API activation gate run before any other backend call.
// ABOUTME: Checks each API, enables the disabled ones, and gives each API one second chance.

use std::time::Duration;

use crate::backend::{ApiError, ApiState, ServiceUsageOps};
use crate::clock::Clock;
use crate::naming;
use crate::progress::Progress;
use crate::types::ProjectId;

use super::error::DeployError;
use super::retry::with_retry;

/// APIs the source pipeline touches.
pub const REQUIRED_APIS: [&str; 5] = [
    "iam.googleapis.com",
    "storage.googleapis.com",
    "cloudbuild.googleapis.com",
    "artifactregistry.googleapis.com",
    "run.googleapis.com",
];

/// APIs needed to deploy a prebuilt image.
pub const IMAGE_ONLY_APIS: [&str; 1] = ["run.googleapis.com"];

/// Make sure every API in `apis` is enabled for `project`, in order.
///
/// # Errors
///
/// Returns `DeployError::ApiActivation` naming the first API that still could
/// not be checked or enabled after the retry.
pub async fn enable_apis<U: ServiceUsageOps + ?Sized>(
    usage: &U,
    clock: &dyn Clock,
    progress: Progress<'_>,
    project: &ProjectId,
    apis: &[&str],
    retry_delay: Duration,
) -> Result<(), DeployError> {
    progress.info("Checking and enabling required APIs...");

    for &api in apis {
        let path = naming::api_path(project, api);

        if let Err(first) = ensure_enabled(usage, clock, progress, api, &path).await {
            progress.warn(format!(
                "Failed to check or enable {api}: {first}. Retrying in {}ms...",
                retry_delay.as_millis()
            ));
            clock.sleep(retry_delay).await;

            if let Err(source) = ensure_enabled(usage, clock, progress, api, &path).await {
                let err = DeployError::ApiActivation {
                    api: api.to_string(),
                    source,
                };
                progress.error(err.to_string());
                return Err(err);
            }
        }
    }

    progress.info("All required APIs are enabled.");
    Ok(())
}

async fn ensure_enabled<U: ServiceUsageOps + ?Sized>(
    usage: &U,
    clock: &dyn Clock,
    progress: Progress<'_>,
    api: &str,
    path: &str,
) -> Result<(), ApiError> {
    let state = with_retry(clock, &format!("getService {api}"), move || {
        usage.get_api_state(path)
    })
    .await?;

    if state == ApiState::Enabled {
        progress.debug(format!("{api} is already enabled."));
        return Ok(());
    }

    progress.info(format!("Enabling {api}..."));
    let operation = with_retry(clock, &format!("enableService {api}"), move || {
        usage.enable_api(path)
    })
    .await?;
    usage.wait_enable(operation).await?;
    progress.info(format!("{api} enabled."));
    Ok(())
}
