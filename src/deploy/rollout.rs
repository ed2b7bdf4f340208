// ABOUTME: Generic rollout struct parameterized by state marker.
// ABOUTME: Holds the target service identity and the definition requested by the caller.

use crate::backend::{ServiceDefinition, ServiceRecord};
use crate::naming;
use crate::types::{ProjectId, Region, ServiceName};

use super::state::{Checked, Deployed, Initialized, RolloutMode, Validated};

/// One create-or-update of a service, parameterized by its current state.
///
/// The requested definition is kept unchanged for the whole rollout. The dry run
/// submits its own copy, and the definition actually applied lives in the
/// `Validated` state, so an adjustment after the dry run never touches the
/// caller's value.
#[derive(Debug)]
pub struct Rollout<S> {
    pub(crate) project: ProjectId,
    pub(crate) region: Region,
    pub(crate) service: ServiceName,
    pub(crate) requested: ServiceDefinition,
    pub(crate) state: S,
}

impl Rollout<Initialized> {
    pub fn new(
        project: ProjectId,
        region: Region,
        service: ServiceName,
        definition: ServiceDefinition,
    ) -> Self {
        Rollout {
            project,
            region,
            service,
            requested: definition,
            state: Initialized,
        }
    }
}

impl<S> Rollout<S> {
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Definition as requested, before any fallback.
    pub fn requested(&self) -> &ServiceDefinition {
        &self.requested
    }

    pub fn service_path(&self) -> String {
        naming::service_path(&self.project, &self.region, &self.service)
    }

    pub fn location_path(&self) -> String {
        naming::location_path(&self.project, &self.region)
    }

    pub(crate) fn transition<T>(self, state: T) -> Rollout<T> {
        Rollout {
            project: self.project,
            region: self.region,
            service: self.service,
            requested: self.requested,
            state,
        }
    }
}

impl Rollout<Checked> {
    pub fn mode(&self) -> RolloutMode {
        self.state.mode
    }
}

impl Rollout<Validated> {
    pub fn mode(&self) -> RolloutMode {
        self.state.mode
    }

    /// Definition the real mutation will submit.
    pub fn definition(&self) -> &ServiceDefinition {
        &self.state.definition
    }
}

impl Rollout<Deployed> {
    pub fn mode(&self) -> RolloutMode {
        self.state.mode
    }

    pub fn record(&self) -> &ServiceRecord {
        &self.state.record
    }

    pub fn into_record(self) -> ServiceRecord {
        self.state.record
    }
}
