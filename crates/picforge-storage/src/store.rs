//! The path-addressed byte store contract shared by every backend.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream};
use futures::TryStreamExt;
use picforge_common::{paths, Error, Result};
use serde::Serialize;

/// Stream of file chunks read from, or written to, a byte store.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// A file or directory reported by a byte store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreEntry {
    /// Normalized store-relative path.
    pub path: String,
    /// Last path segment.
    pub name: String,
    pub is_directory: bool,
    /// Size in bytes, zero for directories.
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl StoreEntry {
    /// Entry for a file at a normalized path.
    pub fn file(path: impl Into<String>, size: u64, last_modified: Option<DateTime<Utc>>) -> Self {
        let path = path.into();
        Self {
            name: paths::file_name(&path).to_string(),
            path,
            is_directory: false,
            size,
            last_modified,
        }
    }

    /// Entry for a directory at a normalized path.
    pub fn directory(path: impl Into<String>, last_modified: Option<DateTime<Utc>>) -> Self {
        let path = path.into();
        Self {
            name: paths::file_name(&path).to_string(),
            path,
            is_directory: true,
            size: 0,
            last_modified,
        }
    }
}

/// What [`ByteStore::directory_content`] should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    /// Descend into subdirectories.
    pub recurse: bool,
    pub include_directories: bool,
    pub include_files: bool,
}

impl ListOptions {
    /// Direct child files only.
    pub fn files() -> Self {
        Self {
            recurse: false,
            include_directories: false,
            include_files: true,
        }
    }

    /// Every file below the directory.
    pub fn all_files() -> Self {
        Self {
            recurse: true,
            include_directories: false,
            include_files: true,
        }
    }
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            recurse: false,
            include_directories: true,
            include_files: true,
        }
    }
}

/// A path-addressed store of files confined to a root.
///
/// Paths are store-relative and `/`-separated. Implementations normalize them
/// with [`picforge_common::paths::normalize`] and fail with
/// [`Error::PathEscape`] for any path that would resolve outside the root.
/// Listing order is unspecified.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Look up a file. Directories are not reported.
    async fn file_info(&self, path: &str) -> Result<Option<StoreEntry>>;

    /// Look up a directory. The root always exists.
    async fn directory_info(&self, path: &str) -> Result<Option<StoreEntry>>;

    /// List the content of a directory. A missing directory lists as empty.
    async fn directory_content(&self, path: &str, options: ListOptions) -> Result<Vec<StoreEntry>>;

    /// Files directly inside `directory` whose name starts with `name_prefix`.
    async fn files_with_prefix(&self, directory: &str, name_prefix: &str) -> Result<Vec<StoreEntry>> {
        let entries = self.directory_content(directory, ListOptions::files()).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.name.starts_with(name_prefix))
            .collect())
    }

    /// Create a directory (and its parents). Returns false if it already existed.
    async fn try_create_directory(&self, path: &str) -> Result<bool>;

    /// Rename a directory. Returns false if the source does not exist.
    async fn try_rename_directory(&self, from: &str, to: &str) -> Result<bool>;

    /// Delete a file. Returns false if it does not exist.
    async fn try_delete_file(&self, path: &str) -> Result<bool>;

    /// Delete a directory and everything below it. Returns false if it does not exist.
    async fn try_delete_directory(&self, path: &str) -> Result<bool>;

    /// Move a file; fails with [`Error::AlreadyExists`] if `to` exists.
    async fn move_file(&self, from: &str, to: &str) -> Result<()>;

    /// Copy a file; fails with [`Error::AlreadyExists`] if `to` exists.
    async fn copy_file(&self, from: &str, to: &str) -> Result<()>;

    /// Rename a file within its directory and return the new path.
    async fn rename_file(&self, path: &str, new_name: &str) -> Result<String> {
        if new_name.is_empty() || new_name.contains(['/', '\\']) || new_name == ".." {
            return Err(Error::invalid_input(format!("invalid file name: {}", new_name)));
        }
        let source = paths::normalize(path)?;
        let target = paths::normalize(&paths::combine(&[paths::parent(&source), new_name]))?;
        self.move_file(&source, &target).await?;
        Ok(target)
    }

    /// Open a file for streaming reads; fails with [`Error::NotFound`] if missing.
    async fn file_stream(&self, path: &str) -> Result<ByteStream>;

    /// Read a whole file.
    async fn read_file(&self, path: &str) -> Result<Bytes> {
        let chunks = self.file_stream(path).await?;
        let buffer = chunks
            .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
                buffer.extend_from_slice(&chunk);
                Ok(buffer)
            })
            .await?;
        Ok(buffer.freeze())
    }

    /// Read a whole file as UTF-8 text.
    async fn read_all_text(&self, path: &str) -> Result<String> {
        let bytes = self.read_file(path).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::invalid_input(format!("{} is not UTF-8: {}", path, e)))
    }

    /// Write UTF-8 text, replacing any existing file.
    async fn write_all_text(&self, path: &str, text: &str) -> Result<()> {
        self.write_file(path, Bytes::copy_from_slice(text.as_bytes()), true)
            .await
            .map(|_| ())
    }

    /// Write a file from a stream and return its normalized path.
    ///
    /// Fails with [`Error::AlreadyExists`] when the file exists and `overwrite`
    /// is not set. Missing parent directories are created.
    async fn create_file_from_stream(&self, path: &str, data: ByteStream, overwrite: bool) -> Result<String>;

    /// Write a file from a buffer and return its normalized path.
    async fn write_file(&self, path: &str, data: Bytes, overwrite: bool) -> Result<String> {
        let data: ByteStream = Box::pin(stream::once(async move { Ok(data) }));
        self.create_file_from_stream(path, data, overwrite).await
    }

    /// URL under which a file is served.
    ///
    /// `store_location` overrides the base URL of stores that serve files
    /// themselves; cloud stores ignore it.
    fn public_url(&self, path: &str, store_location: Option<&str>) -> Result<String>;

    /// Absolute location of a file: a filesystem path or a fully-qualified object URL.
    fn physical_path(&self, path: &str) -> Result<String>;
}

/// Collect a write stream into a single buffer for backends that upload whole objects.
pub(crate) async fn collect_stream(data: ByteStream) -> Result<Bytes> {
    let buffer = data
        .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
            buffer.extend_from_slice(&chunk);
            Ok(buffer)
        })
        .await?;
    Ok(buffer.freeze())
}

/// Direct children of `directory` derived from a flat list of file paths.
///
/// Object stores have no real directories; intermediate path segments are
/// reported as directories so listings look the same on every backend.
pub(crate) fn entries_from_files(
    directory: &str,
    files: Vec<StoreEntry>,
    options: ListOptions,
) -> Vec<StoreEntry> {
    let mut entries = Vec::new();
    let mut seen_dirs = std::collections::BTreeSet::new();

    for file in files {
        if !paths::is_within(&file.path, directory) || file.path == directory {
            continue;
        }
        let relative = if directory.is_empty() {
            file.path.as_str()
        } else {
            &file.path[directory.len() + 1..]
        };

        let mut segments: Vec<&str> = relative.split('/').collect();
        segments.pop();

        if options.include_directories {
            let depth = if options.recurse { segments.len() } else { segments.len().min(1) };
            for end in 1..=depth {
                let dir_path = paths::combine(&[directory, &segments[..end].join("/")]);
                if seen_dirs.insert(dir_path.clone()) {
                    entries.push(StoreEntry::directory(dir_path, None));
                }
            }
        }

        if options.include_files && (options.recurse || segments.is_empty()) {
            entries.push(file);
        }
    }

    entries
}
