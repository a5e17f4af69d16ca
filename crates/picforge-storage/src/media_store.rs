//! Facade over the configured byte store used by the picture service.

use std::sync::Arc;

use bytes::Bytes;
use picforge_common::{paths, Result};
use tracing::{debug, warn};

use crate::store::{ByteStore, ByteStream, ListOptions, StoreEntry};

/// Outcome of a bulk delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failed: usize,
}

/// Shared handle to the active byte store.
///
/// Cheap to clone. Adds batch helpers on top of [`ByteStore`]; bulk deletes
/// keep going past individual failures.
#[derive(Clone)]
pub struct MediaStore {
    store: Arc<dyn ByteStore>,
}

impl std::fmt::Debug for MediaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStore")
            .field("backend", &self.store.name())
            .finish()
    }
}

impl MediaStore {
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self { store }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Arc<dyn ByteStore> {
        &self.store
    }

    /// Join path parts with `/`.
    pub fn combine(&self, parts: &[&str]) -> String {
        paths::combine(parts)
    }

    pub async fn ensure_directory(&self, path: &str) -> Result<()> {
        if self.store.try_create_directory(path).await? {
            debug!("Created directory {}", path);
        }
        Ok(())
    }

    pub async fn file_exists(&self, path: &str) -> Result<bool> {
        Ok(self.store.file_info(path).await?.is_some())
    }

    pub async fn file_info(&self, path: &str) -> Result<Option<StoreEntry>> {
        self.store.file_info(path).await
    }

    pub async fn directory_info(&self, path: &str) -> Result<Option<StoreEntry>> {
        self.store.directory_info(path).await
    }

    pub async fn directory_content(&self, path: &str, options: ListOptions) -> Result<Vec<StoreEntry>> {
        self.store.directory_content(path, options).await
    }

    pub async fn files_with_prefix(&self, directory: &str, name_prefix: &str) -> Result<Vec<StoreEntry>> {
        self.store.files_with_prefix(directory, name_prefix).await
    }

    pub async fn try_delete_file(&self, path: &str) -> Result<bool> {
        self.store.try_delete_file(path).await
    }

    pub async fn try_delete_directory(&self, path: &str) -> Result<bool> {
        self.store.try_delete_directory(path).await
    }

    pub async fn try_rename_directory(&self, from: &str, to: &str) -> Result<bool> {
        self.store.try_rename_directory(from, to).await
    }

    pub async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        self.store.move_file(from, to).await
    }

    pub async fn copy_file(&self, from: &str, to: &str) -> Result<()> {
        self.store.copy_file(from, to).await
    }

    pub async fn rename_file(&self, path: &str, new_name: &str) -> Result<String> {
        self.store.rename_file(path, new_name).await
    }

    pub async fn file_stream(&self, path: &str) -> Result<ByteStream> {
        self.store.file_stream(path).await
    }

    pub async fn read_file(&self, path: &str) -> Result<Bytes> {
        self.store.read_file(path).await
    }

    pub async fn read_all_text(&self, path: &str) -> Result<String> {
        self.store.read_all_text(path).await
    }

    pub async fn write_all_text(&self, path: &str, text: &str) -> Result<()> {
        self.store.write_all_text(path, text).await
    }

    pub async fn create_file_from_stream(&self, path: &str, data: ByteStream, overwrite: bool) -> Result<String> {
        self.store.create_file_from_stream(path, data, overwrite).await
    }

    pub async fn write_file(&self, path: &str, data: Bytes, overwrite: bool) -> Result<String> {
        self.store.write_file(path, data, overwrite).await
    }

    pub fn public_url(&self, path: &str, store_location: Option<&str>) -> Result<String> {
        self.store.public_url(path, store_location)
    }

    pub fn physical_path(&self, path: &str) -> Result<String> {
        self.store.physical_path(path)
    }

    /// Delete every file directly in `directory` whose name starts with `name_prefix`.
    ///
    /// Per-file failures are logged and counted. Path confinement violations
    /// and listing failures are returned.
    pub async fn delete_files_with_prefix(&self, directory: &str, name_prefix: &str) -> Result<DeleteReport> {
        let files = self.store.files_with_prefix(directory, name_prefix).await?;
        self.delete_entries(files).await
    }

    /// Delete every file below `directory`, keeping the directories themselves.
    pub async fn delete_all_files(&self, directory: &str) -> Result<DeleteReport> {
        let files = self
            .store
            .directory_content(directory, ListOptions::all_files())
            .await?;
        self.delete_entries(files).await
    }

    async fn delete_entries(&self, entries: Vec<StoreEntry>) -> Result<DeleteReport> {
        let mut report = DeleteReport::default();
        for entry in entries.iter().filter(|e| !e.is_directory) {
            match self.store.try_delete_file(&entry.path).await {
                Ok(true) => report.deleted += 1,
                // Already gone, e.g. removed by a concurrent purge.
                Ok(false) => {}
                Err(e) if e.is_path_escape() => return Err(e),
                Err(e) => {
                    warn!("Failed to delete {}: {}", entry.path, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}
