//! Shared test harness for picture service integration tests.
//!
//! Provides [`TestHarness`], which builds a [`PictureService`] over an
//! in-memory database and one of the byte store backends, wrapped in a
//! [`CountingStore`] so tests can observe how many renditions were written.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use picforge::events::EventBus;
use picforge::pictures::{PictureService, PictureSettings, PictureUpload};
use picforge_common::{Error, Result};
use picforge_db::pool::{init_memory_pool, DbPool};
use picforge_storage::{
    ByteStore, ByteStream, CloudBlobOptions, CloudBlobStore, InMemoryObjectClient, ListOptions,
    LocalFileStore, MediaStore, ObjectStorageOptions, ObjectStorageStore, StoreEntry,
};

/// [`ByteStore`] decorator recording every write.
///
/// Writes below a chosen prefix can also be made to fail once, or be held
/// at a [`WriteGate`] until the test releases them.
pub struct CountingStore {
    inner: Arc<dyn ByteStore>,
    writes: Mutex<Vec<String>>,
    fail_next: Mutex<Option<String>>,
    gate: Mutex<Option<(String, WriteGate)>>,
}

/// Pair of signals around a held write.
#[derive(Clone, Default)]
pub struct WriteGate {
    /// Notified when a gated write has started.
    pub entered: Arc<Notify>,
    /// Notify to let the gated write continue.
    pub release: Arc<Notify>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn ByteStore>) -> Self {
        Self {
            inner,
            writes: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            gate: Mutex::new(None),
        }
    }

    /// Fail the next write whose path starts with `prefix`.
    pub fn fail_next_write(&self, prefix: &str) {
        *self.fail_next.lock() = Some(prefix.to_string());
    }

    /// Hold the next write whose path starts with `prefix` until released.
    pub fn gate_next_write(&self, prefix: &str) -> WriteGate {
        let gate = WriteGate::default();
        *self.gate.lock() = Some((prefix.to_string(), gate.clone()));
        gate
    }

    async fn before_write(&self, path: &str) -> Result<()> {
        let path = path.trim_start_matches('/');
        {
            let mut fail_next = self.fail_next.lock();
            if fail_next.as_deref().is_some_and(|prefix| path.starts_with(prefix)) {
                *fail_next = None;
                return Err(Error::storage(format!("injected write failure: {}", path)));
            }
        }

        let gate = {
            let mut gate = self.gate.lock();
            match gate.as_ref() {
                Some((prefix, _)) if path.starts_with(prefix.as_str()) => gate.take().map(|(_, g)| g),
                _ => None,
            }
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(())
    }

    /// Number of writes to paths below `directory`.
    pub fn writes_under(&self, directory: &str) -> usize {
        let prefix = format!("{}/", directory.trim_end_matches('/'));
        self.writes
            .lock()
            .iter()
            .filter(|path| path.starts_with(&prefix))
            .count()
    }

    pub fn written_paths(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    fn record(&self, path: &str) {
        self.writes.lock().push(path.trim_start_matches('/').to_string());
    }
}

#[async_trait]
impl ByteStore for CountingStore {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn file_info(&self, path: &str) -> Result<Option<StoreEntry>> {
        self.inner.file_info(path).await
    }

    async fn directory_info(&self, path: &str) -> Result<Option<StoreEntry>> {
        self.inner.directory_info(path).await
    }

    async fn directory_content(&self, path: &str, options: ListOptions) -> Result<Vec<StoreEntry>> {
        self.inner.directory_content(path, options).await
    }

    async fn files_with_prefix(&self, directory: &str, name_prefix: &str) -> Result<Vec<StoreEntry>> {
        self.inner.files_with_prefix(directory, name_prefix).await
    }

    async fn try_create_directory(&self, path: &str) -> Result<bool> {
        self.inner.try_create_directory(path).await
    }

    async fn try_rename_directory(&self, from: &str, to: &str) -> Result<bool> {
        self.inner.try_rename_directory(from, to).await
    }

    async fn try_delete_file(&self, path: &str) -> Result<bool> {
        self.inner.try_delete_file(path).await
    }

    async fn try_delete_directory(&self, path: &str) -> Result<bool> {
        self.inner.try_delete_directory(path).await
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        self.inner.move_file(from, to).await
    }

    async fn copy_file(&self, from: &str, to: &str) -> Result<()> {
        self.inner.copy_file(from, to).await
    }

    async fn file_stream(&self, path: &str) -> Result<ByteStream> {
        self.inner.file_stream(path).await
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        self.inner.read_file(path).await
    }

    async fn create_file_from_stream(&self, path: &str, data: ByteStream, overwrite: bool) -> Result<String> {
        self.record(path);
        self.before_write(path).await?;
        self.inner.create_file_from_stream(path, data, overwrite).await
    }

    async fn write_file(&self, path: &str, data: Bytes, overwrite: bool) -> Result<String> {
        self.record(path);
        self.before_write(path).await?;
        self.inner.write_file(path, data, overwrite).await
    }

    fn public_url(&self, path: &str, store_location: Option<&str>) -> Result<String> {
        self.inner.public_url(path, store_location)
    }

    fn physical_path(&self, path: &str) -> Result<String> {
        self.inner.physical_path(path)
    }
}

/// Picture service over an in-memory database and a counted byte store.
pub struct TestHarness {
    pub service: Arc<PictureService>,
    pub store: Arc<CountingStore>,
    pub db: DbPool,
    pub settings: PictureSettings,
    _dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    /// Local filesystem backend in a temp directory, default settings.
    pub fn local() -> Self {
        Self::local_with(PictureSettings::default())
    }

    pub fn local_with(settings: PictureSettings) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let store = LocalFileStore::with_root(dir.path().join("wwwroot"), "/")
            .expect("failed to create local store");
        Self::build(Arc::new(store), settings, Some(dir))
    }

    /// Cloud blob backend over an in-memory object store.
    pub fn blob() -> Self {
        let options = CloudBlobOptions {
            account: "picforge".to_string(),
            access_key: "a2V5".to_string(),
            container: "media".to_string(),
            prefix: None,
            public_base_url: None,
        };
        let store = CloudBlobStore::with_object_store(
            &options,
            Arc::new(object_store::memory::InMemory::new()),
        );
        Self::build(Arc::new(store), PictureSettings::default(), None)
    }

    /// Object storage backend over the in-memory client, bucket not yet created.
    pub fn object() -> Self {
        let options = ObjectStorageOptions {
            bucket: "media".to_string(),
            access_key_id: "AKID".to_string(),
            secret_access_key: "secret".to_string(),
            cdn_domain: Some("cdn.example.com".to_string()),
            ..ObjectStorageOptions::default()
        };
        let store = ObjectStorageStore::with_client(&options, Arc::new(InMemoryObjectClient::new()));
        Self::build(Arc::new(store), PictureSettings::default(), None)
    }

    pub fn all_backends() -> Vec<(&'static str, Self)> {
        vec![
            ("local", Self::local()),
            ("blob", Self::blob()),
            ("object", Self::object()),
        ]
    }

    fn build(store: Arc<dyn ByteStore>, settings: PictureSettings, dir: Option<tempfile::TempDir>) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let store = Arc::new(CountingStore::new(store));
        let service = Self::service_over(&store, &db, &settings);
        Self {
            service,
            store,
            db,
            settings,
            _dir: dir,
        }
    }

    fn service_over(store: &Arc<CountingStore>, db: &DbPool, settings: &PictureSettings) -> Arc<PictureService> {
        let backend: Arc<dyn ByteStore> = store.clone();
        Arc::new(PictureService::new(
            settings.clone(),
            MediaStore::new(backend),
            db.clone(),
            Arc::new(EventBus::default()),
        ))
    }

    /// A fresh service over the same store and database, as after a restart.
    pub fn restarted(&self) -> Arc<PictureService> {
        Self::service_over(&self.store, &self.db, &self.settings)
    }

    /// Renditions written so far.
    pub fn rendition_writes(&self) -> usize {
        self.store.writes_under(&self.settings.thumbs_path)
    }

    /// Names of the files currently in the thumbs directory.
    pub async fn thumb_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .service
            .media()
            .directory_content(&self.settings.thumbs_path, ListOptions::files())
            .await
            .expect("failed to list thumbs")
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        names.sort();
        names
    }

    /// Dimensions of a stored rendition.
    pub async fn rendition_dimensions(&self, file_name: &str) -> (u32, u32) {
        let path = format!("{}/{}", self.settings.thumbs_path, file_name);
        let bytes = self.service.media().read_file(&path).await.expect("rendition missing");
        let img = image::load_from_memory(&bytes).expect("rendition is not an image");
        (img.width(), img.height())
    }
}

/// Encode a generated RGB image in the given format.
pub fn image_bytes(width: u32, height: u32, format: image::ImageFormat) -> Bytes {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).expect("failed to encode test image");
    Bytes::from(buf.into_inner())
}

pub fn png(width: u32, height: u32) -> Bytes {
    image_bytes(width, height, image::ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Bytes {
    image_bytes(width, height, image::ImageFormat::Jpeg)
}

pub fn upload(binary: Bytes, mime_type: &str, seo_filename: &str) -> PictureUpload {
    PictureUpload {
        binary,
        mime_type: mime_type.to_string(),
        seo_filename: seo_filename.to_string(),
        ..PictureUpload::default()
    }
}
