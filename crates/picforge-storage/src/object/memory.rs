//! Process-local object storage client.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use picforge_common::{Error, Result};

use super::client::{BucketCreation, ObjectAcl, ObjectInfo, ObjectStorageClient};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    acl: ObjectAcl,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Bucket {
    /// Buckets created by someone else reject our create requests.
    foreign: bool,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<String, Bucket>,
    create_attempts: usize,
}

/// [`ObjectStorageClient`] that keeps buckets in memory.
///
/// Writes to a bucket that was never created fail with a storage error, like
/// the real service, so bucket provisioning is exercised.
#[derive(Debug, Default)]
pub struct InMemoryObjectClient {
    state: Mutex<State>,
}

impl InMemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client with an already existing bucket owned by the caller.
    pub fn with_bucket(bucket: &str) -> Self {
        let client = Self::new();
        client
            .state
            .lock()
            .buckets
            .insert(bucket.to_string(), Bucket::default());
        client
    }

    /// Client where `bucket` exists but belongs to another account.
    pub fn with_foreign_bucket(bucket: &str) -> Self {
        let client = Self::new();
        client.state.lock().buckets.insert(
            bucket.to_string(),
            Bucket {
                foreign: true,
                ..Bucket::default()
            },
        );
        client
    }

    /// Number of `create_bucket` calls received.
    pub fn create_attempts(&self) -> usize {
        self.state.lock().create_attempts
    }

    /// ACL an object was stored with.
    pub fn object_acl(&self, bucket: &str, key: &str) -> Option<ObjectAcl> {
        let state = self.state.lock();
        state.buckets.get(bucket)?.objects.get(key).map(|o| o.acl)
    }

    /// Number of objects stored in a bucket.
    pub fn object_count(&self, bucket: &str) -> usize {
        let state = self.state.lock();
        state.buckets.get(bucket).map(|b| b.objects.len()).unwrap_or(0)
    }
}

fn no_such_bucket(bucket: &str) -> Error {
    Error::storage(format!("NoSuchBucket: {}", bucket))
}

fn info(key: &str, object: &StoredObject) -> ObjectInfo {
    ObjectInfo {
        key: key.to_string(),
        size: object.body.len() as u64,
        last_modified: Some(object.last_modified),
    }
}

#[async_trait]
impl ObjectStorageClient for InMemoryObjectClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.state.lock().buckets.get(bucket) {
            Some(existing) if existing.foreign => Err(Error::storage(format!(
                "403 Forbidden: bucket {} belongs to another account",
                bucket
            ))),
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation> {
        let mut state = self.state.lock();
        state.create_attempts += 1;
        match state.buckets.get(bucket) {
            Some(existing) if existing.foreign => Err(Error::storage(format!(
                "BucketAlreadyExists: {} is owned by another account",
                bucket
            ))),
            Some(_) => Ok(BucketCreation::AlreadyOwnedByYou),
            None => {
                state.buckets.insert(bucket.to_string(), Bucket::default());
                Ok(BucketCreation::Created)
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: Option<&str>,
        acl: ObjectAcl,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let bucket_state = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        bucket_state.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                acl,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>> {
        let state = self.state.lock();
        Ok(state
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.body.clone()))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectInfo>> {
        let state = self.state.lock();
        Ok(state
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| info(key, o)))
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let state = self.state.lock();
        let Some(bucket_state) = state.buckets.get(bucket) else {
            return Ok(Vec::new());
        };
        Ok(bucket_state
            .objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| info(key, object))
            .collect())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(bucket_state) = state.buckets.get_mut(bucket) {
            bucket_state.objects.remove(key);
        }
        Ok(())
    }

    async fn copy_object(&self, bucket: &str, from: &str, to: &str, acl: ObjectAcl) -> Result<()> {
        let mut state = self.state.lock();
        let bucket_state = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        let source = bucket_state
            .objects
            .get(from)
            .cloned()
            .ok_or_else(|| Error::not_found(from))?;
        bucket_state.objects.insert(
            to.to_string(),
            StoredObject {
                acl,
                last_modified: Utc::now(),
                ..source
            },
        );
        Ok(())
    }
}
