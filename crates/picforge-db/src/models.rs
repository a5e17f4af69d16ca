//! Internal Rust models matching the database schema.

use chrono::{DateTime, Utc};
use picforge_common::{PictureId, PictureReference};
use serde::{Deserialize, Serialize};

/// Picture metadata record.
///
/// The binary column is deliberately not part of this model; it is read and
/// written through the dedicated binary queries so listing pictures never
/// drags image bytes along.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Picture {
    pub id: PictureId,
    pub mime_type: String,
    /// URL-safe slug, empty when the picture has no seo name.
    pub seo_filename: String,
    pub alt_attribute: Option<String>,
    pub title_attribute: Option<String>,
    pub reference: PictureReference,
    /// Id of the owning entity, empty when unattached.
    pub object_id: String,
    /// Set until the first URL request materializes the picture.
    pub is_new: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing pictures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PictureFilter {
    pub reference: Option<PictureReference>,
    pub object_id: Option<String>,
    pub is_new: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
