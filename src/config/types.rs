use picforge_storage::BackendConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file holding picture records
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("picforge.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Longest side an upload is shrunk to when validated (default: 1980)
    #[serde(default = "default_maximum_image_size")]
    pub maximum_image_size: u32,

    /// JPEG encode quality, 1-100 (default: 90)
    #[serde(default = "default_image_quality")]
    pub default_image_quality: u8,

    /// Rendition size used when a caller asks for none (0 = original dimensions)
    #[serde(default)]
    pub default_thumb_size: u32,
}

fn default_maximum_image_size() -> u32 {
    1980
}

fn default_image_quality() -> u8 {
    90
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            maximum_image_size: default_maximum_image_size(),
            default_image_quality: default_image_quality(),
            default_thumb_size: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Store-relative directory holding originals and the placeholder
    #[serde(default = "default_images_path")]
    pub images_path: String,

    /// Store-relative directory holding generated renditions
    #[serde(default = "default_thumbs_path")]
    pub thumbs_path: String,

    /// Placeholder served for missing pictures, inside `images_path`
    #[serde(default = "default_image_name")]
    pub default_image_name: String,

    /// Keep original bytes in the database instead of the byte store
    #[serde(default)]
    pub store_pictures_in_db: bool,

    #[serde(default)]
    pub backend: BackendConfig,
}

fn default_images_path() -> String {
    "images".to_string()
}

fn default_thumbs_path() -> String {
    "images/thumbs".to_string()
}

fn default_image_name() -> String {
    "default-image.png".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            images_path: default_images_path(),
            thumbs_path: default_thumbs_path(),
            default_image_name: default_image_name(),
            store_pictures_in_db: false,
            backend: BackendConfig::default(),
        }
    }
}
