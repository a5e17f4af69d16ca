//! Picture storage and on-demand rendition generation.
//!
//! This module persists pictures through `picforge_db` and the configured
//! byte store from `picforge_storage`, derives resized renditions lazily and
//! keeps them consistent with the picture record.

pub mod codec;
pub mod locks;
pub mod naming;
mod service;
mod url_cache;

pub use locks::{GenerationGuard, GenerationLocks, PictureGuard, PictureLocks};
pub use naming::ImageKind;
pub use service::{
    picture_not_found, PictureLookup, PictureService, PictureSettings, PictureUpdate, PictureUpload,
};
pub use url_cache::RenditionUrlCache;
