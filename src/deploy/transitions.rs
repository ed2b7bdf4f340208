// ABOUTME: State transition methods for service rollouts.
// ABOUTME: Each method consumes self and returns the next state on success.

use crate::backend::{
    ApiError, ComputeOps, DryRunRejection, Operation, ServiceDefinition,
    classify_dry_run_rejection,
};
use crate::clock::Clock;
use crate::progress::Progress;

use super::error::DeployError;
use super::retry::with_retry;
use super::rollout::Rollout;
use super::state::{Checked, Deployed, Initialized, RolloutMode, Validated};

impl<S> Rollout<S> {
    /// Submit `definition` through the branch chosen by `mode`.
    async fn submit<C: ComputeOps + ?Sized>(
        &self,
        compute: &C,
        clock: &dyn Clock,
        mode: RolloutMode,
        definition: &ServiceDefinition,
        validate_only: bool,
    ) -> Result<Operation, ApiError> {
        let service = &self.service;
        match mode {
            RolloutMode::Create => {
                let parent = self.location_path();
                let parent = parent.as_str();
                with_retry(clock, &format!("createService {service}"), move || {
                    compute.create_service(parent, service, definition, validate_only)
                })
                .await
            }
            RolloutMode::Update => {
                let path = self.service_path();
                let path = path.as_str();
                with_retry(clock, &format!("updateService {service}"), move || {
                    compute.update_service(path, definition, validate_only)
                })
                .await
            }
        }
    }
}

// =============================================================================
// Initialized -> Checked
// =============================================================================

impl Rollout<Initialized> {
    /// Look the service up to decide between create and update.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Api` if the lookup fails with anything other than not-found.
    #[must_use = "rollout state must be used"]
    pub async fn check_existing<C: ComputeOps + ?Sized>(
        self,
        compute: &C,
        clock: &dyn Clock,
        progress: Progress<'_>,
    ) -> Result<Rollout<Checked>, DeployError> {
        let path = self.service_path();
        let path_ref = path.as_str();
        let lookup = with_retry(clock, &format!("getService {}", self.service), move || {
            compute.get_service(path_ref)
        })
        .await;

        let mode = match lookup {
            Ok(_) => {
                progress.info(format!(
                    "Service {} exists. It will be updated.",
                    self.service
                ));
                RolloutMode::Update
            }
            Err(err) if err.is_not_found() => {
                progress.info(format!(
                    "Service {} does not exist. It will be created.",
                    self.service
                ));
                RolloutMode::Create
            }
            Err(source) => {
                progress.error(format!(
                    "Error checking service {}: {source}",
                    self.service
                ));
                return Err(DeployError::api(
                    format!("failed to look up service {}", self.service),
                    source,
                ));
            }
        };

        Ok(self.transition(Checked { mode }))
    }
}

// =============================================================================
// Checked -> Validated
// =============================================================================

impl Rollout<Checked> {
    /// Dry-run the mutation without persisting anything.
    ///
    /// If the backend rejects the invoker IAM bypass, the rollout continues with
    /// the bypass removed. Any other rejection stops the rollout before the
    /// real mutation.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Validation` for dry-run failures that are not the
    /// invoker flag rejection.
    #[must_use = "rollout state must be used"]
    pub async fn validate<C: ComputeOps + ?Sized>(
        self,
        compute: &C,
        clock: &dyn Clock,
        progress: Progress<'_>,
    ) -> Result<Rollout<Validated>, DeployError> {
        let mode = self.state.mode;
        let dry_run = self.requested.clone();

        progress.info(format!(
            "Validating configuration for service {} (dry run)...",
            self.service
        ));

        let outcome = self.submit(compute, clock, mode, &dry_run, true).await;
        let definition = match outcome {
            Ok(_) => {
                progress.info("Dry run validation passed.");
                dry_run
            }
            Err(err)
                if dry_run.invoker_iam_disabled
                    && classify_dry_run_rejection(&err) == DryRunRejection::InvokerFlagRejected =>
            {
                progress.warn(format!(
                    "Dry run rejected disabling the invoker IAM check for {} ({err}). \
                     Deploying with the invoker IAM check enabled.",
                    self.service
                ));
                self.requested.without_invoker_bypass()
            }
            Err(source) => {
                progress.error(format!(
                    "Dry run validation failed for service {}: {source}",
                    self.service
                ));
                return Err(DeployError::Validation {
                    service: self.service.clone(),
                    source,
                });
            }
        };

        Ok(self.transition(Validated { mode, definition }))
    }
}

// =============================================================================
// Validated -> Deployed
// =============================================================================

impl Rollout<Validated> {
    /// Perform the real create or update and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Api` if the mutation or the wait fails.
    #[must_use = "rollout state must be used"]
    pub async fn apply<C: ComputeOps + ?Sized>(
        self,
        compute: &C,
        clock: &dyn Clock,
        progress: Progress<'_>,
    ) -> Result<Rollout<Deployed>, DeployError> {
        let mode = self.state.mode;
        let verb = match mode {
            RolloutMode::Create => "Creating",
            RolloutMode::Update => "Updating",
        };
        progress.info(format!(
            "{verb} service {} with image {}...",
            self.service, self.state.definition.image
        ));

        let failed = |source: ApiError| {
            progress.error(format!(
                "Failed to deploy service {}: {source}",
                self.service
            ));
            DeployError::api(format!("failed to deploy service {}", self.service), source)
        };

        let operation = self
            .submit(compute, clock, mode, &self.state.definition, false)
            .await
            .map_err(failed)?;
        progress.info(format!(
            "Waiting for deployment of {} to complete...",
            self.service
        ));
        let record = compute.wait_service(operation).await.map_err(failed)?;

        progress.info(format!(
            "Service {} deployed. URL: {}",
            self.service,
            record.uri.as_deref().unwrap_or("(not yet assigned)")
        ));

        Ok(self.transition(Deployed { mode, record }))
    }
}
