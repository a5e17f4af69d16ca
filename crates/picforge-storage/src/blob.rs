//! Azure Blob Storage byte store.
//!
//! Blob containers are flat: directories are virtual and exist only while at
//! least one blob lives under their prefix. The [`ObjectStore`] handle is
//! built once from [`CloudBlobOptions`] and shared by every call.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use picforge_common::{paths, Error, Result};
use tracing::debug;

use crate::config::CloudBlobOptions;
use crate::store::{collect_stream, entries_from_files, ByteStore, ByteStream, ListOptions, StoreEntry};

/// Byte store over an Azure Blob Storage container.
pub struct CloudBlobStore {
    store: Arc<dyn ObjectStore>,
    /// Key prefix inside the container, without surrounding slashes.
    prefix: String,
    container_url: String,
    public_base_url: String,
}

impl std::fmt::Debug for CloudBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudBlobStore")
            .field("prefix", &self.prefix)
            .field("container_url", &self.container_url)
            .finish()
    }
}

impl CloudBlobStore {
    /// Connect to the configured container.
    ///
    /// Fails with [`Error::Config`] when the account, key, or container is missing.
    pub fn new(options: &CloudBlobOptions) -> Result<Self> {
        options.validate()?;

        let store = MicrosoftAzureBuilder::new()
            .with_account(&options.account)
            .with_access_key(&options.access_key)
            .with_container_name(&options.container)
            .build()
            .map_err(|e| Error::config(format!("Failed to build Azure blob client: {}", e)))?;

        debug!(
            "Azure blob store for container {} in account {}",
            options.container, options.account
        );
        Ok(Self::with_object_store(options, Arc::new(store)))
    }

    /// Wrap an existing object store handle (tests use `InMemory`).
    pub fn with_object_store(options: &CloudBlobOptions, store: Arc<dyn ObjectStore>) -> Self {
        let container_url = format!(
            "https://{}.blob.core.windows.net/{}",
            options.account, options.container
        );
        let public_base_url = options
            .public_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| container_url.clone());

        Self {
            store,
            prefix: paths::combine(&[options.prefix.as_deref().unwrap_or("")]),
            container_url,
            public_base_url,
        }
    }

    fn key(&self, virtual_path: &str) -> String {
        paths::combine(&[&self.prefix, virtual_path])
    }

    fn location(&self, virtual_path: &str) -> Option<ObjectPath> {
        let key = self.key(virtual_path);
        (!key.is_empty()).then(|| ObjectPath::from(key.as_str()))
    }

    fn virtual_path_of(&self, location: &ObjectPath) -> Option<String> {
        let key: &str = location.as_ref();
        if self.prefix.is_empty() {
            return Some(key.to_string());
        }
        key.strip_prefix(&self.prefix)?
            .strip_prefix('/')
            .map(str::to_string)
    }

    fn entry_of(&self, meta: &ObjectMeta) -> Option<StoreEntry> {
        let virtual_path = self.virtual_path_of(&meta.location)?;
        Some(StoreEntry::file(
            virtual_path,
            meta.size as u64,
            Some(meta.last_modified),
        ))
    }

    async fn head(&self, virtual_path: &str) -> Result<Option<ObjectMeta>> {
        let Some(location) = self.location(virtual_path) else {
            return Ok(None);
        };
        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(meta)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(map_error(e, virtual_path)),
        }
    }

    /// Every blob below a virtual directory.
    async fn list_below(&self, virtual_dir: &str) -> Result<Vec<ObjectMeta>> {
        let prefix = self.location(virtual_dir);
        self.store
            .list(prefix.as_ref())
            .try_collect()
            .await
            .map_err(|e| map_error(e, virtual_dir))
    }

    async fn directory_exists(&self, virtual_dir: &str) -> Result<bool> {
        if virtual_dir.is_empty() {
            return Ok(true);
        }
        let prefix = self.location(virtual_dir);
        let mut listing = self.store.list(prefix.as_ref());
        match listing.next().await {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(map_error(e, virtual_dir)),
            None => Ok(false),
        }
    }

    async fn copy_new(&self, from: &str, to: &str) -> Result<()> {
        let (Some(source), Some(target)) = (self.location(from), self.location(to)) else {
            return Err(Error::invalid_input("cannot copy the container root"));
        };
        if self.head(from).await?.is_none() {
            return Err(Error::not_found(from));
        }
        if self.head(to).await?.is_some() {
            return Err(Error::already_exists(to));
        }
        self.store
            .copy_if_not_exists(&source, &target)
            .await
            .map_err(|e| map_error(e, to))
    }
}

fn map_error(error: object_store::Error, virtual_path: &str) -> Error {
    match error {
        object_store::Error::NotFound { .. } => Error::not_found(virtual_path),
        object_store::Error::AlreadyExists { .. } => Error::already_exists(virtual_path),
        other => Error::storage(format!("blob {}: {}", virtual_path, other)),
    }
}

#[async_trait]
impl ByteStore for CloudBlobStore {
    fn name(&self) -> &'static str {
        "azure_blob"
    }

    async fn file_info(&self, path: &str) -> Result<Option<StoreEntry>> {
        let virtual_path = paths::normalize(path)?;
        Ok(self
            .head(&virtual_path)
            .await?
            .and_then(|meta| self.entry_of(&meta)))
    }

    async fn directory_info(&self, path: &str) -> Result<Option<StoreEntry>> {
        let virtual_path = paths::normalize(path)?;
        if self.directory_exists(&virtual_path).await? {
            Ok(Some(StoreEntry::directory(virtual_path, None)))
        } else {
            Ok(None)
        }
    }

    async fn directory_content(&self, path: &str, options: ListOptions) -> Result<Vec<StoreEntry>> {
        let virtual_dir = paths::normalize(path)?;

        if options.recurse {
            let files = self
                .list_below(&virtual_dir)
                .await?
                .iter()
                .filter_map(|meta| self.entry_of(meta))
                .collect();
            return Ok(entries_from_files(&virtual_dir, files, options));
        }

        let prefix = self.location(&virtual_dir);
        let listing = self
            .store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| map_error(e, &virtual_dir))?;

        let mut entries = Vec::new();
        if options.include_directories {
            entries.extend(
                listing
                    .common_prefixes
                    .iter()
                    .filter_map(|p| self.virtual_path_of(p))
                    .map(|p| StoreEntry::directory(p, None)),
            );
        }
        if options.include_files {
            entries.extend(listing.objects.iter().filter_map(|meta| self.entry_of(meta)));
        }
        Ok(entries)
    }

    async fn files_with_prefix(&self, directory: &str, name_prefix: &str) -> Result<Vec<StoreEntry>> {
        let virtual_dir = paths::normalize(directory)?;
        let prefix = self.location(&virtual_dir);
        let listing = self
            .store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| map_error(e, &virtual_dir))?;

        Ok(listing
            .objects
            .iter()
            .filter(|meta| {
                meta.location
                    .filename()
                    .is_some_and(|name| name.starts_with(name_prefix))
            })
            .filter_map(|meta| self.entry_of(meta))
            .collect())
    }

    async fn try_create_directory(&self, path: &str) -> Result<bool> {
        let virtual_dir = paths::normalize(path)?;
        Ok(!self.directory_exists(&virtual_dir).await?)
    }

    async fn try_rename_directory(&self, from: &str, to: &str) -> Result<bool> {
        let from_dir = paths::normalize(from)?;
        let to_dir = paths::normalize(to)?;
        if from_dir.is_empty() || to_dir.is_empty() {
            return Err(Error::invalid_input("cannot rename the container root"));
        }
        if paths::is_within(&to_dir, &from_dir) {
            return Err(Error::invalid_input(format!("cannot move {} into itself", from_dir)));
        }

        let blobs = self.list_below(&from_dir).await?;
        if blobs.is_empty() {
            return Ok(false);
        }
        if self.directory_exists(&to_dir).await? {
            return Err(Error::already_exists(to_dir));
        }

        for meta in blobs {
            let Some(source) = self.virtual_path_of(&meta.location) else {
                continue;
            };
            let target = paths::combine(&[&to_dir, &source[from_dir.len()..]]);
            self.copy_new(&source, &target).await?;
            self.store
                .delete(&meta.location)
                .await
                .map_err(|e| map_error(e, &source))?;
        }
        Ok(true)
    }

    async fn try_delete_file(&self, path: &str) -> Result<bool> {
        let virtual_path = paths::normalize(path)?;
        let Some(meta) = self.head(&virtual_path).await? else {
            return Ok(false);
        };
        match self.store.delete(&meta.location).await {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(map_error(e, &virtual_path)),
        }
    }

    async fn try_delete_directory(&self, path: &str) -> Result<bool> {
        let virtual_dir = paths::normalize(path)?;
        if virtual_dir.is_empty() {
            return Err(Error::invalid_input("cannot delete the container root"));
        }

        let blobs = self.list_below(&virtual_dir).await?;
        if blobs.is_empty() {
            return Ok(false);
        }
        for meta in blobs {
            match self.store.delete(&meta.location).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(map_error(e, &virtual_dir)),
            }
        }
        Ok(true)
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let from = paths::normalize(from)?;
        let to = paths::normalize(to)?;
        self.copy_new(&from, &to).await?;
        if let Some(source) = self.location(&from) {
            self.store
                .delete(&source)
                .await
                .map_err(|e| map_error(e, &from))?;
        }
        Ok(())
    }

    async fn copy_file(&self, from: &str, to: &str) -> Result<()> {
        let from = paths::normalize(from)?;
        let to = paths::normalize(to)?;
        self.copy_new(&from, &to).await
    }

    async fn file_stream(&self, path: &str) -> Result<ByteStream> {
        let virtual_path = paths::normalize(path)?;
        let Some(location) = self.location(&virtual_path) else {
            return Err(Error::not_found(virtual_path));
        };
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_error(e, &virtual_path))?;
        Ok(result.into_stream().map_err(std::io::Error::other).boxed())
    }

    async fn create_file_from_stream(&self, path: &str, data: ByteStream, overwrite: bool) -> Result<String> {
        let virtual_path = paths::normalize(path)?;
        let Some(location) = self.location(&virtual_path) else {
            return Err(Error::invalid_input("cannot write to the container root"));
        };
        if !overwrite && self.head(&virtual_path).await?.is_some() {
            return Err(Error::already_exists(virtual_path));
        }

        let bytes = collect_stream(data).await?;
        let size = bytes.len();
        self.store
            .put(&location, PutPayload::from(bytes))
            .await
            .map_err(|e| map_error(e, &virtual_path))?;
        debug!("Uploaded blob {} ({} bytes)", location, size);
        Ok(virtual_path)
    }

    fn public_url(&self, path: &str, _store_location: Option<&str>) -> Result<String> {
        let virtual_path = paths::normalize(path)?;
        Ok(format!("{}/{}", self.public_base_url, self.key(&virtual_path)))
    }

    fn physical_path(&self, path: &str) -> Result<String> {
        let virtual_path = paths::normalize(path)?;
        Ok(format!("{}/{}", self.container_url, self.key(&virtual_path)))
    }
}
