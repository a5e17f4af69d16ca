//! Common error types used throughout picforge.
//!
//! One error type covers the whole picture pipeline: record lookups, byte store
//! conflicts, path confinement, backend failures, and image decoding.

/// Common error type for picforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested record or file was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The destination of a write, copy, or move already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A store-relative path resolved outside the configured root.
    #[error("Path escapes store root: {0}")]
    PathEscape(String),

    /// A storage backend (disk, network, credentials, bucket) failed.
    #[error("Storage backend error: {0}")]
    Storage(String),

    /// Image bytes could not be decoded or encoded.
    #[error("Image decode error: {0}")]
    Decode(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A component was misconfigured.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new AlreadyExists error.
    pub fn already_exists<S: Into<String>>(msg: S) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a new PathEscape error.
    pub fn path_escape<S: Into<String>>(msg: S) -> Self {
        Self::PathEscape(msg.into())
    }

    /// Create a new Storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new Decode error.
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this is a path confinement violation. These are never swallowed.
    pub fn is_path_escape(&self) -> bool {
        matches!(self, Self::PathEscape(_))
    }

    /// Whether this error reports a missing record or file.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
