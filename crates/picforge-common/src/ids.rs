//! Typed ID wrappers for type safety across picforge.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a picture record.
///
/// The hyphenated form is used verbatim as the leading component of original
/// and rendition file names, so it never contains `_`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PictureId(Uuid);

impl PictureId {
    /// Generate a new random picture ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PictureId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PictureId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<PictureId> for Uuid {
    fn from(id: PictureId) -> Self {
        id.0
    }
}

impl FromStr for PictureId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for PictureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
