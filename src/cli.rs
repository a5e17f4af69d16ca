use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "picforge")]
#[command(author, version, about = "Picture storage with on-demand thumbnails")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Store an image file as a new picture
    Insert {
        /// Image file to store
        #[arg(required = true)]
        file: PathBuf,

        /// Mime type (guessed from the extension if omitted)
        #[arg(long)]
        mime: Option<String>,

        /// Seo-friendly name used in rendition file names
        #[arg(long, default_value = "")]
        seo_name: String,

        /// Alt text
        #[arg(long)]
        alt: Option<String>,

        /// Title text
        #[arg(long)]
        title: Option<String>,

        /// Shrink images larger than the configured maximum size
        #[arg(long)]
        validate: bool,
    },

    /// Print the URL of a picture rendition, generating it if needed
    Url {
        /// Picture ID
        id: String,

        /// Longest side in pixels (0 = original dimensions)
        #[arg(short, long)]
        size: Option<u32>,

        /// Fall back to the default picture when the ID is unknown
        #[arg(long)]
        show_default: bool,
    },

    /// Delete a picture with its renditions
    Delete {
        /// Picture ID
        id: String,
    },

    /// Delete every cached rendition
    ClearThumbs,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
