//! Store-relative path utilities.
//!
//! Every byte store addresses files with `/`-separated paths relative to its
//! root. These helpers normalize such paths and reject any that would climb
//! above the root, so backends can map them onto disk locations or object
//! keys without re-checking traversal sequences.

use crate::{Error, Result};

/// Normalize a store-relative path.
///
/// Backslashes are treated as separators, empty and `.` segments are dropped,
/// and `..` removes the previous segment. A `..` with nothing left to remove
/// fails with [`Error::PathEscape`]. The root itself normalizes to `""`.
///
/// # Examples
///
/// ```
/// use picforge_common::paths::normalize;
///
/// assert_eq!(normalize("/images//thumbs/").unwrap(), "images/thumbs");
/// assert_eq!(normalize("images/tmp/../a.png").unwrap(), "images/a.png");
/// assert_eq!(normalize("").unwrap(), "");
/// assert!(normalize("images/../../etc").is_err());
/// ```
pub fn normalize(path: &str) -> Result<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::path_escape(path));
                }
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// Join path parts with `/`, skipping empty parts.
///
/// The result is not normalized; pass it through [`normalize`] before use.
///
/// # Examples
///
/// ```
/// use picforge_common::paths::combine;
///
/// assert_eq!(combine(&["images", "thumbs", "a.jpg"]), "images/thumbs/a.jpg");
/// assert_eq!(combine(&["", "a.jpg"]), "a.jpg");
/// ```
pub fn combine(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches(['/', '\\']))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Last segment of a normalized path.
///
/// # Examples
///
/// ```
/// use picforge_common::paths::file_name;
///
/// assert_eq!(file_name("images/thumbs/a.jpg"), "a.jpg");
/// assert_eq!(file_name("a.jpg"), "a.jpg");
/// ```
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Everything before the last segment of a normalized path (`""` at the root).
///
/// # Examples
///
/// ```
/// use picforge_common::paths::parent;
///
/// assert_eq!(parent("images/thumbs/a.jpg"), "images/thumbs");
/// assert_eq!(parent("a.jpg"), "");
/// ```
pub fn parent(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[..idx]).unwrap_or("")
}

/// Whether `path` lies at or below `directory` (both normalized).
pub fn is_within(path: &str, directory: &str) -> bool {
    directory.is_empty()
        || path == directory
        || (path.starts_with(directory) && path[directory.len()..].starts_with('/'))
}
