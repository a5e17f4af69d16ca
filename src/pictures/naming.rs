//! Deterministic file names for originals and renditions.
//!
//! Renditions are found again purely by name, across restarts, so everything
//! here must stay stable: `{id}[_{seo}][_{size}].{ext}`.

use image::ImageFormat;
use picforge_common::PictureId;

/// Longest mime type kept on a picture record.
pub const MIME_TYPE_MAX_LEN: usize = 20;

/// Longest seo slug kept on a picture record.
pub const SEO_FILENAME_MAX_LEN: usize = 100;

/// Output format of a rendition, derived from the picture's mime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
    Gif,
    Ico,
}

impl ImageKind {
    /// Map a mime type onto the rendition format.
    ///
    /// Bitmaps are converted to png. Anything unrecognized is re-encoded as jpeg.
    pub fn from_mime(mime_type: &str) -> Self {
        let subtype = mime_type
            .trim()
            .to_ascii_lowercase()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        match subtype.as_str() {
            "jpeg" | "jpg" | "pjpeg" => Self::Jpeg,
            "png" | "x-png" | "bmp" => Self::Png,
            "webp" => Self::WebP,
            "gif" => Self::Gif,
            "ico" | "x-icon" => Self::Ico,
            _ => Self::Jpeg,
        }
    }

    /// Map a file extension (without the dot) onto the rendition format.
    pub fn from_extension(extension: &str) -> Self {
        Self::from_mime(extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Ico => "ico",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
            Self::Ico => ImageFormat::Ico,
        }
    }
}

/// Cut `value` to at most `max` characters, on a character boundary.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.trim().chars().take(max).collect()
}

/// Normalize a display name into a URL-safe slug.
///
/// Lowercase ASCII alphanumerics survive; every other run of characters
/// becomes a single `-`. The result never contains `_`, which separates the
/// parts of a rendition name.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Slug stored on the record: slugified, then bounded.
pub fn seo_filename(value: &str) -> String {
    let slug = slugify(value);
    truncate_chars(&slug, SEO_FILENAME_MAX_LEN)
        .trim_end_matches('-')
        .to_string()
}

/// File name of a picture's original bytes in the image root.
pub fn original_file_name(id: PictureId, kind: ImageKind) -> String {
    format!("{}_0.{}", id, kind.extension())
}

/// Prefix shared by every rendition of a picture.
pub fn rendition_prefix(id: PictureId) -> String {
    id.to_string()
}

/// `{id}[_{seo}][_{size}].{ext}`; a zero size means original dimensions.
pub fn rendition_file_name(id: PictureId, seo_filename: &str, target_size: u32, kind: ImageKind) -> String {
    let mut name = id.to_string();
    if !seo_filename.is_empty() {
        name.push('_');
        name.push_str(seo_filename);
    }
    if target_size > 0 {
        name.push('_');
        name.push_str(&target_size.to_string());
    }
    name.push('.');
    name.push_str(kind.extension());
    name
}

/// Split the configured placeholder name into its stem and rendition format.
pub fn placeholder_parts(default_image_name: &str) -> (&str, ImageKind) {
    match default_image_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, ImageKind::from_extension(extension)),
        _ => (default_image_name, ImageKind::Jpeg),
    }
}

/// `{stem}[_{size}].{ext}` for the placeholder picture.
pub fn placeholder_file_name(default_image_name: &str, target_size: u32) -> String {
    let (stem, kind) = placeholder_parts(default_image_name);
    if target_size > 0 {
        format!("{}_{}.{}", stem, target_size, kind.extension())
    } else {
        format!("{}.{}", stem, kind.extension())
    }
}
