//! The bucket/object API the object storage store is written against.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use picforge_common::Result;

/// Canned access control applied to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    Private,
    PublicRead,
}

/// Outcome of a successful bucket creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketCreation {
    Created,
    /// The bucket already existed and belongs to the caller.
    AlreadyOwnedByYou,
}

/// Object listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Minimal S3-style client.
///
/// Missing objects are reported as `None`/empty rather than errors. A bucket
/// that exists but belongs to someone else is an error from `create_bucket`.
#[async_trait]
pub trait ObjectStorageClient: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
        acl: ObjectAcl,
    ) -> Result<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectInfo>>;

    /// Every object whose key starts with `prefix` (a plain string prefix).
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Delete an object; deleting a missing object succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    async fn copy_object(&self, bucket: &str, from: &str, to: &str, acl: ObjectAcl) -> Result<()>;
}

/// Content type for an object key, from its extension.
pub fn content_type_for(key: &str) -> Option<&'static str> {
    let extension = key.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "ico" => Some("image/x-icon"),
        "svg" => Some("image/svg+xml"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}
