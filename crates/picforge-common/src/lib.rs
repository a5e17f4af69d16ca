//! Picforge-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across picforge:
//!
//! - **Typed IDs**: Type-safe UUID wrapper for pictures
//! - **Core Types**: The [`PictureReference`] tag naming the owning domain type
//! - **Path Utilities**: Store-relative path normalization and traversal rejection
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use picforge_common::{PictureId, PictureReference, Error, Result};
//! use picforge_common::paths;
//!
//! let id = PictureId::new();
//! let reference = PictureReference::Product;
//!
//! assert_eq!(paths::normalize("images/./thumbs/").unwrap(), "images/thumbs");
//! assert!(paths::normalize("../etc/passwd").is_err());
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("picture"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
