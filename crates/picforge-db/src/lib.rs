//! Picforge-DB: Picture record store
//!
//! This crate persists picture metadata (and, in database storage mode, the
//! picture binary) in SQLite using rusqlite and r2d2 connection pooling. It
//! knows nothing about renditions or byte stores.
//!
//! # Modules
//!
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//! - `schema` - Picture table schema and version check
//!
//! # Example
//!
//! ```no_run
//! use picforge_db::pool::{init_pool, get_conn};
//! use picforge_db::queries::pictures;
//! use picforge_common::PictureId;
//!
//! let pool = init_pool("/var/lib/picforge/picforge.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let picture = pictures::get_picture(&conn, PictureId::new()).unwrap();
//! assert!(picture.is_none());
//! ```

pub mod models;
pub mod pool;
pub mod queries;
pub mod schema;
