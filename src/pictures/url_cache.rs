//! In-memory cache of rendition URLs.
//!
//! Lets repeated URL lookups for a materialized picture skip the backend
//! existence probe. The service drops entries whenever it removes renditions.

use dashmap::DashMap;
use picforge_common::PictureId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct UrlKey {
    id: PictureId,
    size: u32,
    location: Option<String>,
}

/// Thread-safe `(picture, size, store location) -> url` map.
#[derive(Debug, Default)]
pub struct RenditionUrlCache {
    entries: DashMap<UrlKey, String>,
}

impl RenditionUrlCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(id: PictureId, size: u32, location: Option<&str>) -> UrlKey {
        UrlKey {
            id,
            size,
            location: location.map(str::to_string),
        }
    }

    pub fn get(&self, id: PictureId, size: u32, location: Option<&str>) -> Option<String> {
        self.entries
            .get(&Self::key(id, size, location))
            .map(|entry| entry.value().clone())
    }

    pub fn insert(&self, id: PictureId, size: u32, location: Option<&str>, url: String) {
        self.entries.insert(Self::key(id, size, location), url);
    }

    /// Drop every entry of one picture.
    pub fn invalidate(&self, id: PictureId) {
        self.entries.retain(|key, _| key.id != id);
    }

    /// Drop everything, returning how many entries there were.
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
