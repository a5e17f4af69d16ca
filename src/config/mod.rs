mod types;

pub use types::*;

use anyhow::{Context, Result};
use picforge_common::paths;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {:?}", path))
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./picforge.toml",
        "./config.toml",
        "~/.config/picforge/config.toml",
        "/etc/picforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    let quality = config.media.default_image_quality;
    if !(1..=100).contains(&quality) {
        anyhow::bail!("default_image_quality must be between 1 and 100, got {}", quality);
    }

    let images = paths::normalize(&config.storage.images_path)
        .context("storage.images_path is not a valid store path")?;
    let thumbs = paths::normalize(&config.storage.thumbs_path)
        .context("storage.thumbs_path is not a valid store path")?;
    // Clearing thumbs deletes everything below thumbs_path.
    if paths::is_within(&images, &thumbs) {
        anyhow::bail!("storage.images_path must not lie inside storage.thumbs_path");
    }

    if config.storage.default_image_name.trim().is_empty() {
        anyhow::bail!("storage.default_image_name cannot be empty");
    }

    config
        .storage
        .backend
        .validate()
        .context("Invalid storage backend")?;

    Ok(())
}
