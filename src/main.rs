mod cli;

use picforge::{
    config::{self, Config},
    events::EventBus,
    pictures::{picture_not_found, PictureService, PictureSettings, PictureUpload},
    server,
};
use picforge_common::PictureId;
use picforge_db::pool::init_pool;
use picforge_storage::{build_byte_store, MediaStore};

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

/// Wire the record store, the configured backend and the event bus together.
async fn open_service(config: &Config) -> Result<Arc<PictureService>> {
    let db_path = config.database.path.to_string_lossy();
    tracing::info!("Initializing database at {}", db_path);
    let pool = init_pool(&db_path)?;

    let store = build_byte_store(&config.storage.backend).context("Failed to set up byte store")?;
    let media = MediaStore::new(store);
    let settings = PictureSettings::from_config(config)?;
    media.ensure_directory(&settings.images_path).await?;
    media.ensure_directory(&settings.thumbs_path).await?;

    Ok(Arc::new(PictureService::new(
        settings,
        media,
        pool,
        Arc::new(EventBus::default()),
    )))
}

async fn start_server(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting Picforge server");
    let pictures = open_service(&config).await?;
    server::start_server(config, pictures).await
}

fn guess_mime(file: &Path) -> String {
    image::ImageFormat::from_path(file)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "image/jpeg".to_string())
}

async fn insert(
    config_path: Option<&Path>,
    file: &Path,
    mime: Option<String>,
    seo_name: String,
    alt: Option<String>,
    title: Option<String>,
    validate: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let service = open_service(&config).await?;

    let binary = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
    let upload = PictureUpload {
        binary: Bytes::from(binary),
        mime_type: mime.unwrap_or_else(|| guess_mime(file)),
        seo_filename: seo_name,
        alt_attribute: alt,
        title_attribute: title,
        is_new: true,
        ..PictureUpload::default()
    };

    let picture = service.insert_picture(upload, validate).await?;
    println!("{}", picture.id);
    Ok(())
}

fn parse_id(id: &str) -> Result<PictureId> {
    id.parse()
        .with_context(|| format!("Invalid picture ID: {}", id))
}

async fn url(config_path: Option<&Path>, id: &str, size: Option<u32>, show_default: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let service = open_service(&config).await?;

    let size = size.unwrap_or(config.media.default_thumb_size);
    match service
        .ensure_picture_url(parse_id(id)?, size, show_default, None)
        .await?
    {
        Some(url) => println!("{}", url),
        None => anyhow::bail!("No picture {} and no default picture", id),
    }
    Ok(())
}

async fn delete(config_path: Option<&Path>, id: &str) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let service = open_service(&config).await?;

    let id = parse_id(id)?;
    let picture = service.get_picture(id)?.ok_or_else(|| picture_not_found(id))?;
    service.delete_picture(&picture).await?;
    println!("Deleted {}", id);
    Ok(())
}

async fn clear_thumbs(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let service = open_service(&config).await?;

    let removed = service.clear_thumbs().await?;
    println!("Removed {} renditions", removed);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {:?}", config.database.path);
    println!("  Images: {}", config.storage.images_path);
    println!("  Thumbs: {}", config.storage.thumbs_path);
    println!("  Pictures in database: {}", config.storage.store_pictures_in_db);
    println!("  Maximum image size: {}", config.media.maximum_image_size);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "picforge=trace,picforge_storage=trace,picforge_db=debug,picforge_common=debug,tower_http=debug".to_string()
        } else {
            "picforge=debug,picforge_storage=debug,picforge_db=info,tower_http=info".to_string()
        }
    });

    // Logs go to stderr so command output stays scriptable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, config_path))
        }
        Commands::Insert {
            file,
            mime,
            seo_name,
            alt,
            title,
            validate,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(insert(config_path, &file, mime, seo_name, alt, title, validate))
        }
        Commands::Url {
            id,
            size,
            show_default,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(url(config_path, &id, size, show_default))
        }
        Commands::Delete { id } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(delete(config_path, &id))
        }
        Commands::ClearThumbs => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(clear_thumbs(config_path))
        }
        Commands::Validate {
            config: validate_path,
        } => {
            validate_config(validate_path.as_deref().or(config_path))
        }
        Commands::Version => {
            println!("picforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
