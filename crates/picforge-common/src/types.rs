//! Core type definitions shared by the record store and the picture service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain type that owns a picture.
///
/// Stored in lowercase so the record store stays readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PictureReference {
    /// Not attached to any entity.
    #[default]
    None,
    /// Catalog product.
    Product,
    /// Catalog category.
    Category,
    /// Brand.
    Brand,
    /// Product collection.
    Collection,
    /// Vendor.
    Vendor,
    /// Customer avatar.
    Customer,
    /// Blog post.
    Blog,
    /// News item.
    News,
}

impl PictureReference {
    /// Stable lowercase name used in storage and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Product => "product",
            Self::Category => "category",
            Self::Brand => "brand",
            Self::Collection => "collection",
            Self::Vendor => "vendor",
            Self::Customer => "customer",
            Self::Blog => "blog",
            Self::News => "news",
        }
    }
}

impl fmt::Display for PictureReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PictureReference {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "product" => Ok(Self::Product),
            "category" => Ok(Self::Category),
            "brand" => Ok(Self::Brand),
            "collection" => Ok(Self::Collection),
            "vendor" => Ok(Self::Vendor),
            "customer" => Ok(Self::Customer),
            "blog" => Ok(Self::Blog),
            "news" => Ok(Self::News),
            other => Err(crate::Error::invalid_input(format!(
                "unknown picture reference: {}",
                other
            ))),
        }
    }
}
