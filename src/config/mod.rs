// ABOUTME: Settings for cloudrun-deploy loaded from YAML, environment and flags.
// ABOUTME: Later sources win: file, then environment, then command-line overrides.

mod init;

pub use init::init_config;

use crate::deploy::Timings;
use crate::error::{Error, Result};
use crate::gcp::GcpOptions;
use crate::types::{ProjectId, Region};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "cloudrun-deploy.yml";
pub const CONFIG_FILENAME_ALT: &str = "cloudrun-deploy.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".cloudrun-deploy/config.yml";

pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";
pub const REGION_ENV: &str = "GOOGLE_CLOUD_REGION";
pub const SKIP_IAM_CHECK_ENV: &str = "SKIP_IAM_CHECK";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub project: Option<ProjectId>,

    #[serde(default)]
    pub region: Region,

    /// Deploy services with invoker IAM checks disabled (publicly reachable).
    #[serde(default = "default_skip_iam_check")]
    pub skip_iam_check: bool,

    #[serde(default)]
    pub timings: Timings,

    #[serde(default)]
    pub gcp: GcpOptions,
}

fn default_skip_iam_check() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: None,
            region: Region::default(),
            skip_iam_check: default_skip_iam_check(),
            timings: Timings::default(),
            gcp: GcpOptions::default(),
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading settings");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like `discover`, but a missing file just means defaults.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply `GOOGLE_CLOUD_PROJECT`, `GOOGLE_CLOUD_REGION` and `SKIP_IAM_CHECK`.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let set = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(project) = set(PROJECT_ENV) {
            self.project = Some(parse_project(&project)?);
        }
        if let Some(region) = set(REGION_ENV) {
            self.region = parse_region(&region)?;
        }
        if let Some(flag) = set(SKIP_IAM_CHECK_ENV) {
            // Only an explicit opt-out turns the bypass off.
            self.skip_iam_check = !matches!(flag.trim().to_ascii_lowercase().as_str(), "false" | "0");
        }
        Ok(self)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, project: Option<&str>, region: Option<&str>) -> Result<Self> {
        if let Some(project) = project {
            self.project = Some(parse_project(project)?);
        }
        if let Some(region) = region {
            self.region = parse_region(region)?;
        }
        Ok(self)
    }

    pub fn project(&self) -> Result<&ProjectId> {
        self.project.as_ref().ok_or(Error::MissingProject)
    }

    pub fn template() -> Self {
        Self::default()
    }
}

fn parse_project(value: &str) -> Result<ProjectId> {
    ProjectId::new(value).map_err(|e| Error::InvalidConfig(e.to_string()))
}

fn parse_region(value: &str) -> Result<Region> {
    Region::new(value).map_err(|e| Error::InvalidConfig(e.to_string()))
}
