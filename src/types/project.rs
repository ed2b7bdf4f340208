// ABOUTME: Project and region identifiers.
// ABOUTME: Both feed deterministic resource paths, so they are validated up front.

use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectIdError {
    #[error("project ID cannot be empty")]
    Empty,

    #[error("invalid character in project ID: '{0}'")]
    InvalidChar(char),
}

/// A Google Cloud project ID such as `my-project-123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(value: &str) -> Result<Self, ProjectIdError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ProjectIdError::Empty);
        }

        // Domain-scoped projects look like `example.com:my-project`.
        for c in value.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && !matches!(c, '-' | '.' | ':') {
                return Err(ProjectIdError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ProjectId::new(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("region cannot be empty")]
    Empty,

    #[error("invalid character in region: '{0}'")]
    InvalidChar(char),
}

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "europe-west1";

/// A compute region such as `europe-west1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region(String);

impl Default for Region {
    fn default() -> Self {
        Self(DEFAULT_REGION.to_string())
    }
}

impl Region {
    pub fn new(value: &str) -> Result<Self, RegionError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RegionError::Empty);
        }
        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-')
        {
            return Err(RegionError::InvalidChar(c));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Region::new(&s).map_err(serde::de::Error::custom)
    }
}
