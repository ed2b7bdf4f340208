// ABOUTME: Cloud Run service name validation.
// ABOUTME: Lowercase letter first, then lowercase alphanumerics and hyphens.

use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

/// Longest service name Cloud Run accepts.
pub const MAX_SERVICE_NAME_LEN: usize = 49;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceNameError {
    #[error("service name cannot be empty")]
    Empty,

    #[error("service name exceeds maximum length of {MAX_SERVICE_NAME_LEN} characters")]
    TooLong,

    #[error("service name must start with a lowercase letter")]
    BadStart,

    #[error("service name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("service name must be lowercase")]
    NotLowercase,

    #[error("invalid character in service name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(value: &str) -> Result<Self, ServiceNameError> {
        let Some(first) = value.chars().next() else {
            return Err(ServiceNameError::Empty);
        };

        if value.len() > MAX_SERVICE_NAME_LEN {
            return Err(ServiceNameError::TooLong);
        }

        if !first.is_ascii_lowercase() {
            return Err(if first.is_ascii_uppercase() {
                ServiceNameError::NotLowercase
            } else {
                ServiceNameError::BadStart
            });
        }

        if value.ends_with('-') {
            return Err(ServiceNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(ServiceNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(ServiceNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ServiceName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ServiceName::new(&s).map_err(serde::de::Error::custom)
    }
}
