// ABOUTME: Object storage operations trait.
// ABOUTME: Bucket existence, bucket creation and single-shot object upload.

use super::error::ApiError;
use async_trait::async_trait;
use bytes::Bytes;

/// Object storage operations.
#[async_trait]
pub trait StorageOps: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ApiError>;

    /// Create a bucket in `location` (a region or multi-region).
    async fn create_bucket(&self, bucket: &str, location: &str) -> Result<(), ApiError>;

    /// Write `data` to `bucket/object`, replacing any previous object.
    async fn upload_object(&self, bucket: &str, object: &str, data: Bytes)
    -> Result<(), ApiError>;
}
