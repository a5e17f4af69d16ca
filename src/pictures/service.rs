//! Picture service: persistence, rendition generation and invalidation.
//!
//! Metadata lives in the record store; original bytes live either in the
//! record or in the byte store, chosen once by configuration. Renditions are
//! derived lazily and found again purely by file name.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use picforge_common::{paths, Error, PictureId, PictureReference, Result};
use picforge_db::models::{Picture, PictureFilter};
use picforge_db::pool::{get_conn, DbPool, PooledConnection};
use picforge_db::queries::pictures;
use picforge_storage::MediaStore;
use tracing::{debug, error, info, warn};

use super::codec;
use super::locks::{GenerationLocks, PictureLocks};
use super::naming::{self, ImageKind};
use super::url_cache::RenditionUrlCache;
use crate::config::Config;
use crate::events::{EventBus, PicturePayload};

/// Settings the service needs from the application config.
#[derive(Debug, Clone)]
pub struct PictureSettings {
    pub images_path: String,
    pub thumbs_path: String,
    pub default_image_name: String,
    pub store_pictures_in_db: bool,
    pub maximum_image_size: u32,
    pub image_quality: u8,
}

impl PictureSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            images_path: paths::normalize(&config.storage.images_path)?,
            thumbs_path: paths::normalize(&config.storage.thumbs_path)?,
            default_image_name: config.storage.default_image_name.clone(),
            store_pictures_in_db: config.storage.store_pictures_in_db,
            maximum_image_size: config.media.maximum_image_size,
            image_quality: config.media.default_image_quality,
        })
    }
}

impl Default for PictureSettings {
    fn default() -> Self {
        Self {
            images_path: "images".to_string(),
            thumbs_path: "images/thumbs".to_string(),
            default_image_name: "default-image.png".to_string(),
            store_pictures_in_db: false,
            maximum_image_size: 1980,
            image_quality: 90,
        }
    }
}

/// A new picture to insert.
#[derive(Debug, Clone, Default)]
pub struct PictureUpload {
    pub binary: Bytes,
    pub mime_type: String,
    pub seo_filename: String,
    pub alt_attribute: Option<String>,
    pub title_attribute: Option<String>,
    pub is_new: bool,
    pub reference: PictureReference,
    pub object_id: String,
}

/// Replacement values for an existing picture.
///
/// `binary: None` keeps the current bytes.
#[derive(Debug, Clone, Default)]
pub struct PictureUpdate {
    pub binary: Option<Bytes>,
    pub mime_type: String,
    pub seo_filename: String,
    pub alt_attribute: Option<String>,
    pub title_attribute: Option<String>,
    pub is_new: bool,
}

/// Picture to resolve a URL for: an id still to be looked up, or a loaded record.
#[derive(Debug, Clone)]
pub enum PictureLookup {
    Id(PictureId),
    Picture(Picture),
    None,
}

impl From<PictureId> for PictureLookup {
    fn from(id: PictureId) -> Self {
        Self::Id(id)
    }
}

impl From<Picture> for PictureLookup {
    fn from(picture: Picture) -> Self {
        Self::Picture(picture)
    }
}

impl From<Option<Picture>> for PictureLookup {
    fn from(picture: Option<Picture>) -> Self {
        picture.map_or(Self::None, Self::Picture)
    }
}

/// Orchestrates picture records, original bytes and cached renditions.
pub struct PictureService {
    settings: PictureSettings,
    media: MediaStore,
    pool: DbPool,
    events: Arc<EventBus>,
    locks: GenerationLocks,
    picture_locks: PictureLocks,
    urls: RenditionUrlCache,
}

impl PictureService {
    pub fn new(settings: PictureSettings, media: MediaStore, pool: DbPool, events: Arc<EventBus>) -> Self {
        Self {
            settings,
            media,
            pool,
            events,
            locks: GenerationLocks::new(),
            picture_locks: PictureLocks::new(),
            urls: RenditionUrlCache::new(),
        }
    }

    pub fn settings(&self) -> &PictureSettings {
        &self.settings
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Number of rendition names currently being generated.
    pub fn generations_in_flight(&self) -> usize {
        self.locks.len()
    }

    // -- record store -------------------------------------------------------

    /// Run `f` on a pooled connection that is returned before the next await.
    fn with_conn<T>(&self, f: impl FnOnce(&PooledConnection) -> Result<T>) -> Result<T> {
        let conn = get_conn(&self.pool)?;
        f(&conn)
    }

    pub fn get_picture(&self, id: PictureId) -> Result<Option<Picture>> {
        self.with_conn(|conn| pictures::get_picture(conn, id))
    }

    pub fn list_pictures(&self, filter: &PictureFilter) -> Result<Vec<Picture>> {
        self.with_conn(|conn| pictures::list_pictures(conn, filter))
    }

    // -- paths --------------------------------------------------------------

    fn original_path(&self, id: PictureId, mime_type: &str) -> String {
        paths::combine(&[
            &self.settings.images_path,
            &naming::original_file_name(id, ImageKind::from_mime(mime_type)),
        ])
    }

    fn thumb_path(&self, file_name: &str) -> String {
        paths::combine(&[&self.settings.thumbs_path, file_name])
    }

    /// Physical location of a rendition: a disk path or an object URL.
    pub fn thumb_physical_path(&self, file_name: &str) -> Result<String> {
        self.media.physical_path(&self.thumb_path(file_name))
    }

    // -- bytes --------------------------------------------------------------

    /// Shrink an upload to the configured maximum when asked to validate.
    ///
    /// Bytes that cannot be decoded are kept unchanged.
    async fn prepare_binary(&self, binary: Bytes, mime_type: &str, validate: bool) -> Bytes {
        if !validate {
            return binary;
        }
        let kind = ImageKind::from_mime(mime_type);
        match codec::shrink_blocking(
            binary.clone(),
            self.settings.maximum_image_size,
            kind,
            self.settings.image_quality,
        )
        .await
        {
            Ok(Some(resized)) => Bytes::from(resized),
            Ok(None) => binary,
            Err(e) => {
                warn!("Storing picture unvalidated: {}", e);
                binary
            }
        }
    }

    /// Original bytes of a picture, from whichever location holds them.
    pub async fn load_picture_binary(&self, picture: &Picture) -> Result<Option<Bytes>> {
        if self.settings.store_pictures_in_db {
            let binary = self.with_conn(|conn| pictures::get_picture_binary(conn, picture.id))?;
            return Ok(binary.map(Bytes::from));
        }

        let path = self.original_path(picture.id, &picture.mime_type);
        match self.media.read_file(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write the original to the configured location and clear the other one.
    async fn save_original(&self, id: PictureId, mime_type: &str, binary: &Bytes) -> Result<()> {
        let path = self.original_path(id, mime_type);
        if self.settings.store_pictures_in_db {
            self.with_conn(|conn| pictures::update_picture_binary(conn, id, Some(&binary[..])))?;
            self.media.try_delete_file(&path).await?;
        } else {
            self.media.write_file(&path, binary.clone(), true).await?;
            self.with_conn(|conn| pictures::update_picture_binary(conn, id, None))?;
        }
        Ok(())
    }

    /// Delete every cached rendition of a picture.
    async fn purge_renditions(&self, id: PictureId) -> Result<()> {
        let report = self
            .media
            .delete_files_with_prefix(&self.settings.thumbs_path, &naming::rendition_prefix(id))
            .await?;
        if report.deleted > 0 || report.failed > 0 {
            debug!(
                "Purged renditions of {}: {} deleted, {} failed",
                id, report.deleted, report.failed
            );
        }
        self.urls.invalidate(id);
        Ok(())
    }

    // -- commands -----------------------------------------------------------

    /// Insert a picture record and persist its bytes.
    ///
    /// The record is written first; a crash before the bytes land heals on
    /// the next URL request, which regenerates from whatever is stored.
    pub async fn insert_picture(&self, upload: PictureUpload, validate: bool) -> Result<Picture> {
        let mime_type = naming::truncate_chars(&upload.mime_type, naming::MIME_TYPE_MAX_LEN);
        let binary = self.prepare_binary(upload.binary, &mime_type, validate).await;

        let now = Utc::now();
        let picture = Picture {
            id: PictureId::new(),
            mime_type,
            seo_filename: naming::seo_filename(&upload.seo_filename),
            alt_attribute: upload.alt_attribute,
            title_attribute: upload.title_attribute,
            reference: upload.reference,
            object_id: upload.object_id,
            is_new: upload.is_new,
            created_at: now,
            updated_at: now,
        };

        let in_db = self.settings.store_pictures_in_db;
        self.with_conn(|conn| {
            pictures::insert_picture(conn, &picture, in_db.then_some(&binary[..]))
        })?;

        if !in_db {
            let path = self.original_path(picture.id, &picture.mime_type);
            self.media.write_file(&path, binary, true).await?;
        }

        info!("Inserted picture {} ({})", picture.id, picture.mime_type);
        self.events.publish(PicturePayload::PictureInserted {
            picture_id: picture.id,
            reference: picture.reference,
            object_id: picture.object_id.clone(),
        });
        Ok(picture)
    }

    /// Replace a picture's metadata and optionally its bytes.
    ///
    /// Returns `None` for an unknown id. A new binary or seo name purges
    /// every cached rendition first. URL lookups for the picture wait until
    /// the new bytes and names are in place.
    pub async fn update_picture(&self, id: PictureId, update: PictureUpdate, validate: bool) -> Result<Option<Picture>> {
        let _picture_guard = self.picture_locks.write(id).await;
        let Some(current) = self.get_picture(id)? else {
            return Ok(None);
        };

        let mime_type = naming::truncate_chars(&update.mime_type, naming::MIME_TYPE_MAX_LEN);
        let seo_filename = naming::seo_filename(&update.seo_filename);

        if seo_filename != current.seo_filename || update.binary.is_some() {
            self.purge_renditions(id).await?;
        }

        let binary = match update.binary {
            Some(binary) => Some(self.prepare_binary(binary, &mime_type, validate).await),
            None => None,
        };

        let picture = Picture {
            mime_type,
            seo_filename,
            alt_attribute: update.alt_attribute,
            title_attribute: update.title_attribute,
            is_new: update.is_new,
            updated_at: Utc::now(),
            ..current.clone()
        };
        self.with_conn(|conn| pictures::update_picture(conn, &picture))?;

        let old_path = self.original_path(id, &current.mime_type);
        let new_path = self.original_path(id, &picture.mime_type);
        match binary {
            Some(binary) => {
                self.save_original(id, &picture.mime_type, &binary).await?;
                if !self.settings.store_pictures_in_db && old_path != new_path {
                    self.media.try_delete_file(&old_path).await?;
                }
            }
            None if !self.settings.store_pictures_in_db && old_path != new_path => {
                // Keep the original reachable under its new extension.
                if self.media.file_exists(&old_path).await? {
                    self.media.try_delete_file(&new_path).await?;
                    self.media.move_file(&old_path, &new_path).await?;
                }
            }
            None => {}
        }

        self.urls.invalidate(id);
        debug!("Updated picture {}", id);
        self.events
            .publish(PicturePayload::PictureUpdated { picture_id: id });
        Ok(Some(picture))
    }

    /// Change only the seo slug. Renditions named after the old slug are purged.
    pub async fn set_seo_filename(&self, picture: &Picture, seo_filename: &str) -> Result<Picture> {
        let seo_filename = naming::seo_filename(seo_filename);
        if seo_filename == picture.seo_filename {
            return Ok(picture.clone());
        }

        let _picture_guard = self.picture_locks.write(picture.id).await;
        self.purge_renditions(picture.id).await?;
        self.with_conn(|conn| pictures::set_seo_filename(conn, picture.id, &seo_filename))?;
        self.urls.invalidate(picture.id);

        self.events.publish(PicturePayload::PictureUpdated {
            picture_id: picture.id,
        });
        Ok(Picture {
            seo_filename,
            ..picture.clone()
        })
    }

    /// Remove renditions, the stored original and the record.
    ///
    /// Safe for pictures that never had a rendition generated.
    pub async fn delete_picture(&self, picture: &Picture) -> Result<()> {
        let _picture_guard = self.picture_locks.write(picture.id).await;
        self.purge_renditions(picture.id).await?;

        if !self.settings.store_pictures_in_db {
            let path = self.original_path(picture.id, &picture.mime_type);
            self.media.try_delete_file(&path).await?;
        }

        self.with_conn(|conn| pictures::delete_picture(conn, picture.id))?;
        self.urls.invalidate(picture.id);

        info!("Deleted picture {}", picture.id);
        self.events.publish(PicturePayload::PictureDeleted {
            picture_id: picture.id,
        });
        Ok(())
    }

    /// Delete every cached rendition in the store. Returns how many were removed.
    pub async fn clear_thumbs(&self) -> Result<usize> {
        let report = self.media.delete_all_files(&self.settings.thumbs_path).await?;
        self.urls.clear();
        if report.failed > 0 {
            warn!("{} renditions could not be deleted", report.failed);
        }

        info!("Cleared {} renditions", report.deleted);
        self.events.publish(PicturePayload::ThumbsCleared {
            removed: report.deleted,
        });
        Ok(report.deleted)
    }

    // -- urls ---------------------------------------------------------------

    /// Resolve the URL of a rendition, generating it on a cache miss.
    ///
    /// This is a read that may write: the first request for a new picture
    /// purges stale renditions and clears its `is_new` flag, and a missing
    /// rendition is generated and stored. Generation failures never surface;
    /// at worst the URL points at unresized bytes. Record store failures and
    /// path escapes do.
    ///
    /// Returns `None` when there is no picture and no placeholder to show.
    pub async fn ensure_picture_url(
        &self,
        lookup: impl Into<PictureLookup>,
        target_size: u32,
        show_default: bool,
        store_location: Option<&str>,
    ) -> Result<Option<String>> {
        let picture = match lookup.into() {
            PictureLookup::Picture(picture) => Some(picture),
            PictureLookup::Id(id) => self.get_picture(id)?,
            PictureLookup::None => None,
        };
        let Some(picture) = picture else {
            return self.default_url_or_none(target_size, show_default, store_location).await;
        };

        if picture.is_new {
            self.materialize(&picture).await?;
        }

        if let Some(url) = self.urls.get(picture.id, target_size, store_location) {
            debug!("Rendition url cache hit for {}", picture.id);
            return Ok(Some(url));
        }

        // Updates and deletes wait while this lookup runs, so the record read
        // here matches the bytes and names for the rest of the call.
        let _picture_guard = self.picture_locks.read(picture.id).await;
        let Some(picture) = self.get_picture(picture.id)? else {
            return self.default_url_or_none(target_size, show_default, store_location).await;
        };

        let kind = ImageKind::from_mime(&picture.mime_type);
        let file_name = naming::rendition_file_name(picture.id, &picture.seo_filename, target_size, kind);
        let path = self.thumb_path(&file_name);
        let url = self.media.public_url(&path, store_location)?;

        let mut stored = self.media.file_exists(&path).await?;
        if !stored {
            let _guard = self.locks.acquire(&file_name).await;
            // Another caller may have finished while we waited.
            stored = self.media.file_exists(&path).await?;
            if !stored {
                let Some(original) = self.load_picture_binary(&picture).await? else {
                    warn!("Picture {} has no stored bytes", picture.id);
                    return self.default_url_or_none(target_size, show_default, store_location).await;
                };
                stored = self.generate(&path, original, target_size, kind).await?;
            }
        }

        // A failed write is retried by the next lookup instead of being cached.
        if stored {
            self.urls.insert(picture.id, target_size, store_location, url.clone());
        }
        Ok(Some(url))
    }

    /// URL of the configured placeholder at `target_size`, generating it if needed.
    ///
    /// Returns `None` when the placeholder original is missing from the store.
    pub async fn default_picture_url(&self, target_size: u32, store_location: Option<&str>) -> Result<Option<String>> {
        let (_, kind) = naming::placeholder_parts(&self.settings.default_image_name);
        let file_name = naming::placeholder_file_name(&self.settings.default_image_name, target_size);
        let path = self.thumb_path(&file_name);
        let url = self.media.public_url(&path, store_location)?;

        if self.media.file_exists(&path).await? {
            return Ok(Some(url));
        }

        let _guard = self.locks.acquire(&file_name).await;
        if !self.media.file_exists(&path).await? {
            let source = paths::combine(&[&self.settings.images_path, &self.settings.default_image_name]);
            let original = match self.media.read_file(&source).await {
                Ok(bytes) => bytes,
                Err(e) if e.is_not_found() => {
                    warn!("Default picture {} is missing", source);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            self.generate(&path, original, target_size, kind).await?;
        }
        Ok(Some(url))
    }

    async fn default_url_or_none(
        &self,
        target_size: u32,
        show_default: bool,
        store_location: Option<&str>,
    ) -> Result<Option<String>> {
        if show_default {
            self.default_picture_url(target_size, store_location).await
        } else {
            Ok(None)
        }
    }

    /// First view of a new picture: drop stale renditions and clear `is_new`.
    async fn materialize(&self, picture: &Picture) -> Result<()> {
        let _picture_guard = self.picture_locks.write(picture.id).await;

        // Re-read under the lock; a concurrent first view may have done this.
        match self.get_picture(picture.id)? {
            Some(current) if current.is_new => {
                self.purge_renditions(current.id).await?;
                self.with_conn(|conn| pictures::set_is_new(conn, current.id, false))?;
                debug!("Materialized picture {}", current.id);
            }
            _ => {}
        }
        Ok(())
    }

    /// Render and store one rendition. Must be called under its generation lock.
    ///
    /// Decode and encode failures store the original bytes instead. Write
    /// failures are logged and reported as `false`, except path escapes.
    async fn generate(&self, path: &str, original: Bytes, target_size: u32, kind: ImageKind) -> Result<bool> {
        debug!("Generating rendition {}", path);
        let bytes = match codec::render_blocking(original.clone(), target_size, kind, self.settings.image_quality).await
        {
            Ok(rendered) => Bytes::from(rendered),
            Err(e) => {
                warn!("Storing {} unresized: {}", path, e);
                original
            }
        };

        match self.media.write_file(path, bytes, true).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_path_escape() => Err(e),
            Err(e) => {
                error!("Failed to store rendition {}: {}", path, e);
                Ok(false)
            }
        }
    }
}

impl std::fmt::Debug for PictureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PictureService")
            .field("settings", &self.settings)
            .field("media", &self.media)
            .finish()
    }
}

/// Error for a delete request naming an unknown picture.
pub fn picture_not_found(id: PictureId) -> Error {
    Error::not_found(format!("picture {}", id))
}
