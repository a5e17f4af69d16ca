//! Decode, resize and re-encode picture bytes with the `image` crate.
//!
//! Everything here is CPU bound and synchronous; the async wrappers move the
//! work onto the blocking pool.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use picforge_common::{Error, Result};

use super::naming::ImageKind;

/// Longest side used when a non-positive target size is requested.
pub const DEFAULT_RESIZE_TARGET: u32 = 800;

/// Dimensions fitting `width` x `height` into `target` on the longest side.
///
/// Never upscales. A side that would round to zero keeps the original
/// dimensions.
pub fn fit_dimensions(width: u32, height: u32, target: u32) -> (u32, u32) {
    let target = if target == 0 { DEFAULT_RESIZE_TARGET } else { target };
    let longest = width.max(height);
    if longest <= target {
        return (width, height);
    }

    let scale = f64::from(target) / f64::from(longest);
    let new_width = (f64::from(width) * scale).round() as u32;
    let new_height = (f64::from(height) * scale).round() as u32;
    if new_width == 0 || new_height == 0 {
        return (width, height);
    }
    (new_width, new_height)
}

fn decode(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data).map_err(|e| Error::decode(e.to_string()))
}

fn resize(img: DynamicImage, target: u32) -> DynamicImage {
    let (width, height) = fit_dimensions(img.width(), img.height(), target);
    if (width, height) == (img.width(), img.height()) {
        return img;
    }
    img.resize_exact(width, height, FilterType::Lanczos3)
}

/// Encode `img` in the rendition format. `quality` only affects jpeg.
pub fn encode(img: &DynamicImage, kind: ImageKind, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let result = match kind {
        ImageKind::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        ImageKind::WebP => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buf, kind.image_format())
        }
        _ => img.write_to(&mut buf, kind.image_format()),
    };
    result.map_err(|e| Error::decode(format!("failed to encode {:?}: {}", kind, e)))?;
    Ok(buf.into_inner())
}

/// Produce a rendition: decode, fit into `target_size` (zero keeps the
/// original dimensions), re-encode.
pub fn render(data: &[u8], target_size: u32, kind: ImageKind, quality: u8) -> Result<Vec<u8>> {
    let img = decode(data)?;
    let img = if target_size > 0 { resize(img, target_size) } else { img };
    encode(&img, kind, quality)
}

/// Shrink an upload whose longest side exceeds `maximum_size`.
///
/// Returns `None` when the image already fits, so the caller keeps the bytes
/// exactly as uploaded.
pub fn shrink_to_maximum(data: &[u8], maximum_size: u32, kind: ImageKind, quality: u8) -> Result<Option<Vec<u8>>> {
    let img = decode(data)?;
    let maximum_size = if maximum_size == 0 { DEFAULT_RESIZE_TARGET } else { maximum_size };
    if img.width().max(img.height()) <= maximum_size {
        return Ok(None);
    }
    let img = resize(img, maximum_size);
    encode(&img, kind, quality).map(Some)
}

/// [`render`] on the blocking pool.
pub async fn render_blocking(data: Bytes, target_size: u32, kind: ImageKind, quality: u8) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || render(&data, target_size, kind, quality))
        .await
        .map_err(|e| Error::internal(format!("render task failed: {}", e)))?
}

/// [`shrink_to_maximum`] on the blocking pool.
pub async fn shrink_blocking(data: Bytes, maximum_size: u32, kind: ImageKind, quality: u8) -> Result<Option<Vec<u8>>> {
    tokio::task::spawn_blocking(move || shrink_to_maximum(&data, maximum_size, kind, quality))
        .await
        .map_err(|e| Error::internal(format!("validation task failed: {}", e)))?
}
