// ABOUTME: Log query operations trait.
// ABOUTME: Filtered, ordered, page-sized reads of log entries.

use super::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Log entry query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// Parents to search, e.g. `projects/my-project`.
    pub resource_names: Vec<String>,
    pub filter: String,
    pub order_by: String,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: Option<DateTime<Utc>>,
    /// Text payload, or the JSON payload rendered as a string.
    pub payload: String,
}

/// Log reading operations.
#[async_trait]
pub trait LogOps: Send + Sync {
    /// Return one page of entries in the order requested by the query.
    async fn list_entries(&self, query: &LogQuery) -> Result<Vec<LogEntry>, ApiError>;
}
