//! Picforge-Storage: path-addressed byte stores.
//!
//! Pictures and their renditions are kept in a [`ByteStore`], selected once
//! at startup from a [`BackendConfig`]:
//!
//! - **local**: [`LocalFileStore`], a directory tree on disk
//! - **azure_blob**: [`CloudBlobStore`], an Azure Blob Storage container
//! - **s3**: [`ObjectStorageStore`], an S3-style bucket behind an
//!   [`ObjectStorageClient`]
//!
//! Every backend confines paths to its root and reports conflicts with the
//! shared [`picforge_common::Error`] taxonomy, so callers never branch on the
//! backend in use. [`MediaStore`] wraps the chosen store with batch helpers.
//!
//! # Examples
//!
//! ```no_run
//! use picforge_storage::{build_byte_store, BackendConfig, MediaStore};
//!
//! # async fn example() -> picforge_common::Result<()> {
//! let store = build_byte_store(&BackendConfig::default())?;
//! let media = MediaStore::new(store);
//!
//! media.write_file("images/hello.txt", "hi".into(), true).await?;
//! assert!(media.file_exists("images/hello.txt").await?);
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod config;
pub mod local;
pub mod media_store;
pub mod object;
pub mod store;

pub use blob::CloudBlobStore;
pub use config::{
    build_byte_store, BackendConfig, CloudBlobOptions, LocalStoreOptions, ObjectStorageOptions,
};
pub use local::LocalFileStore;
pub use media_store::{DeleteReport, MediaStore};
pub use object::{
    BucketCreation, InMemoryObjectClient, ObjectAcl, ObjectInfo, ObjectStorageClient,
    ObjectStorageStore, S3Client,
};
pub use store::{ByteStore, ByteStream, ListOptions, StoreEntry};
