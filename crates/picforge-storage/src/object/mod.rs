//! S3-style object storage byte store.
//!
//! The bucket is provisioned lazily before the first write: the store probes
//! it, creates it when missing, and accepts a creation that reports the bucket
//! as already owned by us. Every object is uploaded publicly readable.

pub mod client;
pub mod memory;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use picforge_common::{paths, Error, Result};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::ObjectStorageOptions;
use crate::store::{collect_stream, entries_from_files, ByteStore, ByteStream, ListOptions, StoreEntry};

pub use client::{content_type_for, BucketCreation, ObjectAcl, ObjectInfo, ObjectStorageClient};
pub use memory::InMemoryObjectClient;
pub use s3::S3Client;

/// Byte store over a single bucket of an [`ObjectStorageClient`].
pub struct ObjectStorageStore {
    client: Arc<dyn ObjectStorageClient>,
    bucket: String,
    /// Key prefix inside the bucket, without surrounding slashes.
    prefix: String,
    public_base: String,
    object_base: String,
    bucket_ready: OnceCell<()>,
}

impl std::fmt::Debug for ObjectStorageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorageStore")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("public_base", &self.public_base)
            .finish()
    }
}

impl ObjectStorageStore {
    /// Connect to the configured bucket over the S3 REST API.
    ///
    /// Fails with [`Error::Config`] when the bucket name or credentials are missing.
    pub fn new(options: &ObjectStorageOptions) -> Result<Self> {
        options.validate()?;
        let client = S3Client::new(options)?;
        Ok(Self::with_client(options, Arc::new(client)))
    }

    /// Use an existing client (tests inject [`InMemoryObjectClient`]).
    pub fn with_client(options: &ObjectStorageOptions, client: Arc<dyn ObjectStorageClient>) -> Self {
        let object_base = match &options.endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), options.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", options.bucket, options.region),
        };
        let public_base = match &options.cdn_domain {
            Some(domain) => {
                let domain = domain.trim_end_matches('/');
                if domain.starts_with("http://") || domain.starts_with("https://") {
                    domain.to_string()
                } else {
                    format!("https://{}", domain)
                }
            }
            None => object_base.clone(),
        };

        Self {
            client,
            bucket: options.bucket.clone(),
            prefix: paths::combine(&[options.prefix.as_deref().unwrap_or("")]),
            public_base,
            object_base,
            bucket_ready: OnceCell::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn key(&self, virtual_path: &str) -> String {
        paths::combine(&[&self.prefix, virtual_path])
    }

    /// Key prefix that selects everything below a virtual directory.
    fn directory_prefix(&self, virtual_dir: &str) -> String {
        let key = self.key(virtual_dir);
        if key.is_empty() {
            key
        } else {
            format!("{}/", key)
        }
    }

    fn virtual_path_of(&self, key: &str) -> Option<String> {
        if self.prefix.is_empty() {
            return Some(key.to_string());
        }
        key.strip_prefix(&self.prefix)?
            .strip_prefix('/')
            .map(str::to_string)
    }

    fn entry_of(&self, info: &ObjectInfo) -> Option<StoreEntry> {
        let virtual_path = self.virtual_path_of(&info.key)?;
        Some(StoreEntry::file(virtual_path, info.size, info.last_modified))
    }

    /// Make sure the bucket exists; runs once per store.
    async fn ensure_bucket(&self) -> Result<()> {
        self.bucket_ready
            .get_or_try_init(|| async {
                if self.client.bucket_exists(&self.bucket).await? {
                    debug!("Bucket {} exists", self.bucket);
                    return Ok::<(), Error>(());
                }
                match self.client.create_bucket(&self.bucket).await? {
                    BucketCreation::Created => info!("Created bucket {}", self.bucket),
                    BucketCreation::AlreadyOwnedByYou => {
                        debug!("Bucket {} was created concurrently", self.bucket)
                    }
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn list_below(&self, virtual_dir: &str) -> Result<Vec<ObjectInfo>> {
        self.client
            .list_objects(&self.bucket, &self.directory_prefix(virtual_dir))
            .await
    }

    async fn copy_new(&self, from: &str, to: &str) -> Result<()> {
        if from.is_empty() || to.is_empty() {
            return Err(Error::invalid_input("cannot copy the bucket root"));
        }
        if self.client.head_object(&self.bucket, &self.key(from)).await?.is_none() {
            return Err(Error::not_found(from));
        }
        if self.client.head_object(&self.bucket, &self.key(to)).await?.is_some() {
            return Err(Error::already_exists(to));
        }
        self.ensure_bucket().await?;
        self.client
            .copy_object(&self.bucket, &self.key(from), &self.key(to), ObjectAcl::PublicRead)
            .await
    }
}

#[async_trait]
impl ByteStore for ObjectStorageStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn file_info(&self, path: &str) -> Result<Option<StoreEntry>> {
        let virtual_path = paths::normalize(path)?;
        if virtual_path.is_empty() {
            return Ok(None);
        }
        let info = self
            .client
            .head_object(&self.bucket, &self.key(&virtual_path))
            .await?;
        Ok(info.map(|info| StoreEntry::file(virtual_path, info.size, info.last_modified)))
    }

    async fn directory_info(&self, path: &str) -> Result<Option<StoreEntry>> {
        let virtual_dir = paths::normalize(path)?;
        if virtual_dir.is_empty() || !self.list_below(&virtual_dir).await?.is_empty() {
            Ok(Some(StoreEntry::directory(virtual_dir, None)))
        } else {
            Ok(None)
        }
    }

    async fn directory_content(&self, path: &str, options: ListOptions) -> Result<Vec<StoreEntry>> {
        let virtual_dir = paths::normalize(path)?;
        let files = self
            .list_below(&virtual_dir)
            .await?
            .iter()
            .filter_map(|info| self.entry_of(info))
            .collect();
        Ok(entries_from_files(&virtual_dir, files, options))
    }

    async fn files_with_prefix(&self, directory: &str, name_prefix: &str) -> Result<Vec<StoreEntry>> {
        let virtual_dir = paths::normalize(directory)?;
        let key_prefix = format!("{}{}", self.directory_prefix(&virtual_dir), name_prefix);
        let objects = self.client.list_objects(&self.bucket, &key_prefix).await?;

        Ok(objects
            .iter()
            .filter(|info| !info.key[key_prefix.len()..].contains('/'))
            .filter_map(|info| self.entry_of(info))
            .collect())
    }

    async fn try_create_directory(&self, path: &str) -> Result<bool> {
        let virtual_dir = paths::normalize(path)?;
        Ok(self.directory_info(&virtual_dir).await?.is_none())
    }

    async fn try_rename_directory(&self, from: &str, to: &str) -> Result<bool> {
        let from_dir = paths::normalize(from)?;
        let to_dir = paths::normalize(to)?;
        if from_dir.is_empty() || to_dir.is_empty() {
            return Err(Error::invalid_input("cannot rename the bucket root"));
        }
        if paths::is_within(&to_dir, &from_dir) {
            return Err(Error::invalid_input(format!("cannot move {} into itself", from_dir)));
        }

        let objects = self.list_below(&from_dir).await?;
        if objects.is_empty() {
            return Ok(false);
        }
        if !self.list_below(&to_dir).await?.is_empty() {
            return Err(Error::already_exists(to_dir));
        }

        for info in objects {
            let Some(source) = self.virtual_path_of(&info.key) else {
                continue;
            };
            let target = paths::combine(&[&to_dir, &source[from_dir.len()..]]);
            self.copy_new(&source, &target).await?;
            self.client.delete_object(&self.bucket, &info.key).await?;
        }
        Ok(true)
    }

    async fn try_delete_file(&self, path: &str) -> Result<bool> {
        let virtual_path = paths::normalize(path)?;
        if virtual_path.is_empty() {
            return Ok(false);
        }
        let key = self.key(&virtual_path);
        if self.client.head_object(&self.bucket, &key).await?.is_none() {
            return Ok(false);
        }
        self.client.delete_object(&self.bucket, &key).await?;
        Ok(true)
    }

    async fn try_delete_directory(&self, path: &str) -> Result<bool> {
        let virtual_dir = paths::normalize(path)?;
        if virtual_dir.is_empty() {
            return Err(Error::invalid_input("cannot delete the bucket root"));
        }
        let objects = self.list_below(&virtual_dir).await?;
        if objects.is_empty() {
            return Ok(false);
        }
        for info in objects {
            self.client.delete_object(&self.bucket, &info.key).await?;
        }
        Ok(true)
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let from = paths::normalize(from)?;
        let to = paths::normalize(to)?;
        self.copy_new(&from, &to).await?;
        self.client.delete_object(&self.bucket, &self.key(&from)).await
    }

    async fn copy_file(&self, from: &str, to: &str) -> Result<()> {
        let from = paths::normalize(from)?;
        let to = paths::normalize(to)?;
        self.copy_new(&from, &to).await
    }

    async fn file_stream(&self, path: &str) -> Result<ByteStream> {
        let virtual_path = paths::normalize(path)?;
        if virtual_path.is_empty() {
            return Err(Error::not_found(virtual_path));
        }
        let body = self
            .client
            .get_object(&self.bucket, &self.key(&virtual_path))
            .await?
            .ok_or_else(|| Error::not_found(virtual_path.clone()))?;
        Ok(stream::once(async move { Ok::<_, std::io::Error>(body) }).boxed())
    }

    async fn create_file_from_stream(&self, path: &str, data: ByteStream, overwrite: bool) -> Result<String> {
        let virtual_path = paths::normalize(path)?;
        if virtual_path.is_empty() {
            return Err(Error::invalid_input("cannot write to the bucket root"));
        }
        let key = self.key(&virtual_path);
        if !overwrite && self.client.head_object(&self.bucket, &key).await?.is_some() {
            return Err(Error::already_exists(virtual_path));
        }

        self.ensure_bucket().await?;
        let body = collect_stream(data).await?;
        let size = body.len();
        self.client
            .put_object(&self.bucket, &key, body, content_type_for(&key), ObjectAcl::PublicRead)
            .await?;
        debug!("Uploaded s3://{}/{} ({} bytes)", self.bucket, key, size);
        Ok(virtual_path)
    }

    fn public_url(&self, path: &str, _store_location: Option<&str>) -> Result<String> {
        let virtual_path = paths::normalize(path)?;
        Ok(format!("{}/{}", self.public_base, self.key(&virtual_path)))
    }

    fn physical_path(&self, path: &str) -> Result<String> {
        let virtual_path = paths::normalize(path)?;
        Ok(format!("{}/{}", self.object_base, self.key(&virtual_path)))
    }
}
