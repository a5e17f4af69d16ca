//! Local filesystem byte store.
//!
//! Virtual paths map onto a directory tree below a canonicalized root. Every
//! resolved location is checked against the root after canonicalizing its
//! deepest existing ancestor, so `..` sequences and symlinks pointing outside
//! the root are both rejected with [`Error::PathEscape`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use picforge_common::{paths, Error, Result};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::LocalStoreOptions;
use crate::store::{ByteStore, ByteStream, ListOptions, StoreEntry};

/// Byte store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    base_url: String,
}

impl LocalFileStore {
    /// Open a store rooted at `options.root`, creating the directory if needed.
    pub fn new(options: &LocalStoreOptions) -> Result<Self> {
        Self::with_root(&options.root, &options.base_url)
    }

    /// Open a store rooted at `root` that serves files under `base_url`.
    pub fn with_root(root: impl AsRef<Path>, base_url: &str) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| {
            Error::storage(format!("Failed to create store root {}: {}", root.display(), e))
        })?;
        let root = std::fs::canonicalize(root)?;
        debug!("Local store rooted at {}", root.display());

        Ok(Self {
            root,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalize a virtual path and map it to a confined physical location.
    fn resolve(&self, path: &str) -> Result<(String, PathBuf)> {
        let virtual_path = paths::normalize(path)?;
        let physical = if virtual_path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&virtual_path)
        };
        self.ensure_confined(&physical, path)?;
        Ok((virtual_path, physical))
    }

    fn ensure_confined(&self, physical: &Path, requested: &str) -> Result<()> {
        let mut candidate = Some(physical);
        while let Some(current) = candidate {
            match std::fs::canonicalize(current) {
                Ok(canonical) if canonical.starts_with(&self.root) => return Ok(()),
                Ok(_) => break,
                Err(_) => candidate = current.parent(),
            }
        }
        Err(Error::path_escape(requested))
    }

    /// Virtual path of a physical location below the root.
    fn virtual_path_of(&self, physical: &Path) -> Option<String> {
        let relative = physical.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    async fn create_parent(&self, physical: &Path) -> Result<()> {
        if let Some(parent) = physical.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Move a finished temp file onto `target`.
    ///
    /// Without `overwrite` the file is hard-linked into place, which fails
    /// atomically when the target already exists.
    async fn place(&self, temp: &Path, target: &Path, virtual_path: &str, overwrite: bool) -> Result<()> {
        if overwrite {
            if let Err(e) = tokio::fs::rename(temp, target).await {
                let _ = tokio::fs::remove_file(temp).await;
                return Err(e.into());
            }
            return Ok(());
        }

        let linked = tokio::fs::hard_link(temp, target).await;
        let _ = tokio::fs::remove_file(temp).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::already_exists(virtual_path)),
            Err(e) => Err(e.into()),
        }
    }
}

fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// In-flight writes are invisible to listings.
fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}

fn modified_time(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

async fn metadata_if_exists(physical: &Path) -> Result<Option<std::fs::Metadata>> {
    match tokio::fs::metadata(physical).await {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ByteStore for LocalFileStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn file_info(&self, path: &str) -> Result<Option<StoreEntry>> {
        let (virtual_path, physical) = self.resolve(path)?;
        Ok(metadata_if_exists(&physical)
            .await?
            .filter(|m| m.is_file())
            .map(|m| StoreEntry::file(virtual_path, m.len(), modified_time(&m))))
    }

    async fn directory_info(&self, path: &str) -> Result<Option<StoreEntry>> {
        let (virtual_path, physical) = self.resolve(path)?;
        Ok(metadata_if_exists(&physical)
            .await?
            .filter(|m| m.is_dir())
            .map(|m| StoreEntry::directory(virtual_path, modified_time(&m))))
    }

    async fn directory_content(&self, path: &str, options: ListOptions) -> Result<Vec<StoreEntry>> {
        let (_, physical) = self.resolve(path)?;
        if !tokio::fs::metadata(&physical).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Ok(Vec::new());
        }

        let store = self.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<StoreEntry>> {
            let max_depth = if options.recurse { usize::MAX } else { 1 };
            let mut entries = Vec::new();

            for entry in WalkDir::new(&physical).min_depth(1).max_depth(max_depth) {
                let entry = entry.map_err(std::io::Error::from)?;
                let file_type = entry.file_type();
                let wanted = (file_type.is_dir() && options.include_directories)
                    || (file_type.is_file() && options.include_files);
                if !wanted || is_temp_name(&entry.file_name().to_string_lossy()) {
                    continue;
                }

                let Some(virtual_path) = store.virtual_path_of(entry.path()) else {
                    continue;
                };
                let metadata = entry.metadata().map_err(std::io::Error::from)?;
                if file_type.is_dir() {
                    entries.push(StoreEntry::directory(virtual_path, modified_time(&metadata)));
                } else {
                    entries.push(StoreEntry::file(
                        virtual_path,
                        metadata.len(),
                        modified_time(&metadata),
                    ));
                }
            }

            Ok(entries)
        })
        .await
        .map_err(|e| Error::internal(format!("directory listing task failed: {}", e)))?
    }

    async fn try_create_directory(&self, path: &str) -> Result<bool> {
        let (virtual_path, physical) = self.resolve(path)?;
        if let Some(metadata) = metadata_if_exists(&physical).await? {
            if metadata.is_dir() {
                return Ok(false);
            }
            return Err(Error::already_exists(virtual_path));
        }

        self.create_parent(&physical).await?;
        match tokio::fs::create_dir(&physical).await {
            Ok(()) => Ok(true),
            // Lost a race with another creator.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn try_rename_directory(&self, from: &str, to: &str) -> Result<bool> {
        let (from_virtual, from_physical) = self.resolve(from)?;
        let (to_virtual, to_physical) = self.resolve(to)?;
        if from_virtual.is_empty() || to_virtual.is_empty() {
            return Err(Error::invalid_input("cannot rename the store root"));
        }
        if paths::is_within(&to_virtual, &from_virtual) {
            return Err(Error::invalid_input(format!(
                "cannot move {} into itself",
                from_virtual
            )));
        }

        match metadata_if_exists(&from_physical).await? {
            Some(m) if m.is_dir() => {}
            _ => return Ok(false),
        }
        if metadata_if_exists(&to_physical).await?.is_some() {
            return Err(Error::already_exists(to_virtual));
        }

        self.create_parent(&to_physical).await?;
        tokio::fs::rename(&from_physical, &to_physical).await?;
        Ok(true)
    }

    async fn try_delete_file(&self, path: &str) -> Result<bool> {
        let (_, physical) = self.resolve(path)?;
        match metadata_if_exists(&physical).await? {
            Some(m) if m.is_file() => {}
            _ => return Ok(false),
        }
        match tokio::fs::remove_file(&physical).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn try_delete_directory(&self, path: &str) -> Result<bool> {
        let (virtual_path, physical) = self.resolve(path)?;
        if virtual_path.is_empty() {
            return Err(Error::invalid_input("cannot delete the store root"));
        }
        match metadata_if_exists(&physical).await? {
            Some(m) if m.is_dir() => {}
            _ => return Ok(false),
        }
        match tokio::fs::remove_dir_all(&physical).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let (from_virtual, from_physical) = self.resolve(from)?;
        let (to_virtual, to_physical) = self.resolve(to)?;

        match metadata_if_exists(&from_physical).await? {
            Some(m) if m.is_file() => {}
            _ => return Err(Error::not_found(from_virtual)),
        }
        if metadata_if_exists(&to_physical).await?.is_some() {
            return Err(Error::already_exists(to_virtual));
        }

        self.create_parent(&to_physical).await?;
        match tokio::fs::hard_link(&from_physical, &to_physical).await {
            Ok(()) => {
                tokio::fs::remove_file(&from_physical).await?;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::already_exists(to_virtual)),
            // Filesystems without hard links fall back to a plain rename.
            Err(_) => {
                tokio::fs::rename(&from_physical, &to_physical).await?;
                Ok(())
            }
        }
    }

    async fn copy_file(&self, from: &str, to: &str) -> Result<()> {
        let (from_virtual, from_physical) = self.resolve(from)?;
        let (to_virtual, to_physical) = self.resolve(to)?;

        match metadata_if_exists(&from_physical).await? {
            Some(m) if m.is_file() => {}
            _ => return Err(Error::not_found(from_virtual)),
        }
        if metadata_if_exists(&to_physical).await?.is_some() {
            return Err(Error::already_exists(to_virtual));
        }

        self.create_parent(&to_physical).await?;
        let temp = temp_path_for(&to_physical);
        if let Err(e) = tokio::fs::copy(&from_physical, &temp).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        self.place(&temp, &to_physical, &to_virtual, false).await
    }

    async fn file_stream(&self, path: &str) -> Result<ByteStream> {
        let (virtual_path, physical) = self.resolve(path)?;
        match metadata_if_exists(&physical).await? {
            Some(m) if m.is_file() => {}
            _ => return Err(Error::not_found(virtual_path)),
        }

        let file = match tokio::fs::File::open(&physical).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::not_found(virtual_path)),
            Err(e) => return Err(e.into()),
        };
        Ok(ReaderStream::with_capacity(file, 64 * 1024).boxed())
    }

    async fn create_file_from_stream(&self, path: &str, data: ByteStream, overwrite: bool) -> Result<String> {
        let (virtual_path, physical) = self.resolve(path)?;
        if virtual_path.is_empty() {
            return Err(Error::invalid_input("cannot write to the store root"));
        }

        if let Some(metadata) = metadata_if_exists(&physical).await? {
            if metadata.is_dir() || !overwrite {
                return Err(Error::already_exists(virtual_path));
            }
        }

        self.create_parent(&physical).await?;
        // Parent creation may have followed a symlink planted since resolve.
        self.ensure_confined(&physical, path)?;

        let temp = temp_path_for(&physical);
        let written = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            let mut data = data;
            while let Some(chunk) = data.try_next().await? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        if let Err(e) = written {
            warn!("Failed writing {}: {}", virtual_path, e);
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        self.place(&temp, &physical, &virtual_path, overwrite).await?;
        debug!("Wrote {}", virtual_path);
        Ok(virtual_path)
    }

    fn public_url(&self, path: &str, store_location: Option<&str>) -> Result<String> {
        let (virtual_path, _) = self.resolve(path)?;
        let base = store_location
            .map(|location| location.trim_end_matches('/'))
            .unwrap_or(&self.base_url);
        Ok(format!("{}/{}", base, virtual_path))
    }

    fn physical_path(&self, path: &str) -> Result<String> {
        let (_, physical) = self.resolve(path)?;
        Ok(physical.to_string_lossy().into_owned())
    }
}
