//! Backend selection and connection settings.

use std::path::PathBuf;
use std::sync::Arc;

use picforge_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::blob::CloudBlobStore;
use crate::local::LocalFileStore;
use crate::object::ObjectStorageStore;
use crate::store::ByteStore;

/// Which byte store backs picture storage, with its connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Local(LocalStoreOptions),
    AzureBlob(CloudBlobOptions),
    S3(ObjectStorageOptions),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Local(LocalStoreOptions::default())
    }
}

impl BackendConfig {
    /// Reject settings that could never connect.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Local(options) => options.validate(),
            Self::AzureBlob(options) => options.validate(),
            Self::S3(options) => options.validate(),
        }
    }

    /// Root directory of the local backend, if that is the one configured.
    pub fn local_root(&self) -> Option<&PathBuf> {
        match self {
            Self::Local(options) => Some(&options.root),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LocalStoreOptions {
    /// Directory holding every stored file.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// URL prefix the root is served under.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_root() -> PathBuf {
    PathBuf::from("wwwroot")
}

fn default_base_url() -> String {
    "/".to_string()
}

impl Default for LocalStoreOptions {
    fn default() -> Self {
        Self {
            root: default_root(),
            base_url: default_base_url(),
        }
    }
}

impl LocalStoreOptions {
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::config("local store root must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CloudBlobOptions {
    /// Storage account name.
    #[serde(default)]
    pub account: String,

    /// Shared access key of the account.
    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub container: String,

    /// Key prefix inside the container.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Base URL used instead of the container endpoint (e.g. a CDN).
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl CloudBlobOptions {
    pub fn validate(&self) -> Result<()> {
        if self.account.trim().is_empty() {
            return Err(Error::config("azure_blob backend requires an account"));
        }
        if self.access_key.trim().is_empty() {
            return Err(Error::config("azure_blob backend requires an access_key"));
        }
        if self.container.trim().is_empty() {
            return Err(Error::config("azure_blob backend requires a container"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ObjectStorageOptions {
    #[serde(default)]
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub secret_access_key: String,

    #[serde(default)]
    pub session_token: Option<String>,

    /// S3-compatible endpoint (MinIO etc.), AWS when unset.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// CDN or distribution domain that public URLs point at.
    #[serde(default)]
    pub cdn_domain: Option<String>,

    /// Key prefix inside the bucket.
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for ObjectStorageOptions {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: None,
            endpoint: None,
            cdn_domain: None,
            prefix: None,
        }
    }
}

impl ObjectStorageOptions {
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::config("s3 backend requires a bucket"));
        }
        if self.region.trim().is_empty() {
            return Err(Error::config("s3 backend requires a region"));
        }
        if self.access_key_id.trim().is_empty() || self.secret_access_key.trim().is_empty() {
            return Err(Error::config(
                "s3 backend requires access_key_id and secret_access_key",
            ));
        }
        Ok(())
    }
}

/// Construct the configured backend. Called once at startup.
pub fn build_byte_store(config: &BackendConfig) -> Result<Arc<dyn ByteStore>> {
    config.validate()?;
    let store: Arc<dyn ByteStore> = match config {
        BackendConfig::Local(options) => Arc::new(LocalFileStore::new(options)?),
        BackendConfig::AzureBlob(options) => Arc::new(CloudBlobStore::new(options)?),
        BackendConfig::S3(options) => Arc::new(ObjectStorageStore::new(options)?),
    };
    info!("Using {} byte store", store.name());
    Ok(store)
}
