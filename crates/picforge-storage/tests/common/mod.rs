//! Contract checks shared by every backend's integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use futures::stream;
use picforge_common::Error;
use picforge_storage::{
    ByteStore, ByteStream, CloudBlobOptions, CloudBlobStore, InMemoryObjectClient, ListOptions,
    LocalFileStore, ObjectStorageOptions, ObjectStorageStore,
};

/// A store under test plus whatever keeps it alive.
pub struct Backend {
    pub store: Arc<dyn ByteStore>,
    _dir: Option<tempfile::TempDir>,
}

pub fn local() -> Backend {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalFileStore::with_root(dir.path().join("wwwroot"), "/").unwrap();
    Backend {
        store: Arc::new(store),
        _dir: Some(dir),
    }
}

pub fn blob_options() -> CloudBlobOptions {
    CloudBlobOptions {
        account: "picforge".to_string(),
        access_key: "a2V5".to_string(),
        container: "media".to_string(),
        prefix: None,
        public_base_url: None,
    }
}

pub fn blob() -> Backend {
    let store = CloudBlobStore::with_object_store(
        &blob_options(),
        Arc::new(object_store::memory::InMemory::new()),
    );
    Backend {
        store: Arc::new(store),
        _dir: None,
    }
}

pub fn object_options() -> ObjectStorageOptions {
    ObjectStorageOptions {
        bucket: "media".to_string(),
        access_key_id: "AKID".to_string(),
        secret_access_key: "secret".to_string(),
        ..ObjectStorageOptions::default()
    }
}

pub fn object() -> Backend {
    let store =
        ObjectStorageStore::with_client(&object_options(), Arc::new(InMemoryObjectClient::new()));
    Backend {
        store: Arc::new(store),
        _dir: None,
    }
}

pub fn all_backends() -> Vec<(&'static str, Backend)> {
    vec![("local", local()), ("blob", blob()), ("object", object())]
}

pub fn chunks(parts: &[&'static [u8]]) -> ByteStream {
    let items: Vec<std::io::Result<Bytes>> =
        parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
    Box::pin(stream::iter(items))
}

pub fn sorted_paths(entries: &[picforge_storage::StoreEntry]) -> Vec<String> {
    let mut paths: Vec<String> = entries.iter().map(|e| e.path.clone()).collect();
    paths.sort();
    paths
}

/// Writes, reads, and conflicts behave the same on every backend.
pub async fn check_read_write(name: &str, store: &dyn ByteStore) {
    let path = store
        .create_file_from_stream("images/a.jpg", chunks(&[b"hello ", b"world"]), false)
        .await
        .unwrap();
    assert_eq!(path, "images/a.jpg", "{name}");

    let bytes = store.read_file("images/a.jpg").await.unwrap();
    assert_eq!(&bytes[..], b"hello world", "{name}");

    let info = store.file_info("images/a.jpg").await.unwrap().unwrap();
    assert_eq!(info.size, 11, "{name}");
    assert_eq!(info.name, "a.jpg", "{name}");
    assert!(!info.is_directory, "{name}");

    let err = store
        .write_file("images/a.jpg", Bytes::from_static(b"again"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)), "{name}: {err}");

    store
        .write_file("images/a.jpg", Bytes::from_static(b"again"), true)
        .await
        .unwrap();
    assert_eq!(&store.read_file("images/a.jpg").await.unwrap()[..], b"again", "{name}");

    store.write_all_text("notes/readme.txt", "text body").await.unwrap();
    assert_eq!(store.read_all_text("notes/readme.txt").await.unwrap(), "text body", "{name}");

    let err = store.read_file("images/missing.jpg").await.unwrap_err();
    assert!(err.is_not_found(), "{name}: {err}");
    assert!(store.file_info("images/missing.jpg").await.unwrap().is_none(), "{name}");
}

/// Moves, copies, and renames refuse to clobber.
pub async fn check_move_copy(name: &str, store: &dyn ByteStore) {
    store.write_file("src/a.png", Bytes::from_static(b"a"), false).await.unwrap();
    store.write_file("src/b.png", Bytes::from_static(b"b"), false).await.unwrap();

    store.copy_file("src/a.png", "dst/a.png").await.unwrap();
    assert!(store.file_info("src/a.png").await.unwrap().is_some(), "{name}");
    assert!(store.file_info("dst/a.png").await.unwrap().is_some(), "{name}");

    let err = store.copy_file("src/b.png", "dst/a.png").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)), "{name}: {err}");

    let err = store.move_file("src/b.png", "src/a.png").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)), "{name}: {err}");

    store.move_file("src/b.png", "dst/b.png").await.unwrap();
    assert!(store.file_info("src/b.png").await.unwrap().is_none(), "{name}");
    assert_eq!(&store.read_file("dst/b.png").await.unwrap()[..], b"b", "{name}");

    let renamed = store.rename_file("dst/b.png", "c.png").await.unwrap();
    assert_eq!(renamed, "dst/c.png", "{name}");
    assert!(store.file_info("dst/c.png").await.unwrap().is_some(), "{name}");

    let err = store.move_file("src/none.png", "dst/none.png").await.unwrap_err();
    assert!(err.is_not_found(), "{name}: {err}");
}

/// Listing, prefix scoping, and the try-operations.
pub async fn check_directories(name: &str, store: &dyn ByteStore) {
    for path in [
        "images/thumbs/1_100.jpg",
        "images/thumbs/1_seo_100.jpg",
        "images/thumbs/12_100.jpg",
        "images/thumbs/deep/1_x.jpg",
        "images/1_0.jpg",
    ] {
        store.write_file(path, Bytes::from_static(b"x"), false).await.unwrap();
    }

    let direct = store
        .directory_content("images", ListOptions::default())
        .await
        .unwrap();
    assert_eq!(sorted_paths(&direct), vec!["images/1_0.jpg", "images/thumbs"], "{name}");

    let all = store
        .directory_content("images", ListOptions::all_files())
        .await
        .unwrap();
    assert_eq!(all.len(), 5, "{name}");

    let scoped = store.files_with_prefix("images/thumbs", "1_").await.unwrap();
    assert_eq!(
        sorted_paths(&scoped),
        vec!["images/thumbs/1_100.jpg", "images/thumbs/1_seo_100.jpg"],
        "{name}"
    );

    assert!(store.directory_info("images/thumbs").await.unwrap().is_some(), "{name}");
    assert!(store.directory_info("").await.unwrap().is_some(), "{name}");
    assert!(store.directory_info("nothing").await.unwrap().is_none(), "{name}");
    assert!(store
        .directory_content("nothing", ListOptions::default())
        .await
        .unwrap()
        .is_empty());

    assert!(!store.try_create_directory("images").await.unwrap(), "{name}");

    assert!(store.try_delete_file("images/1_0.jpg").await.unwrap(), "{name}");
    assert!(!store.try_delete_file("images/1_0.jpg").await.unwrap(), "{name}");

    assert!(store.try_rename_directory("images/thumbs/deep", "archive").await.unwrap(), "{name}");
    assert!(store.file_info("archive/1_x.jpg").await.unwrap().is_some(), "{name}");
    assert!(!store.try_rename_directory("images/thumbs/deep", "other").await.unwrap(), "{name}");

    assert!(store.try_delete_directory("images").await.unwrap(), "{name}");
    assert!(!store.try_delete_directory("images").await.unwrap(), "{name}");
    assert!(store.file_info("images/thumbs/1_100.jpg").await.unwrap().is_none(), "{name}");
}

/// Traversal outside the root is refused by every operation.
pub async fn check_path_escape(name: &str, store: &dyn ByteStore) {
    let escapes = ["../outside.txt", "images/../../outside.txt", "..\\..\\outside.txt"];
    for path in escapes {
        let err = store
            .write_file(path, Bytes::from_static(b"x"), true)
            .await
            .unwrap_err();
        assert!(err.is_path_escape(), "{name} write {path}: {err}");

        let err = store.read_file(path).await.unwrap_err();
        assert!(err.is_path_escape(), "{name} read {path}: {err}");

        let err = store.file_info(path).await.unwrap_err();
        assert!(err.is_path_escape(), "{name} info {path}: {err}");

        let err = store.try_delete_file(path).await.unwrap_err();
        assert!(err.is_path_escape(), "{name} delete {path}: {err}");

        let err = store.public_url(path, None).unwrap_err();
        assert!(err.is_path_escape(), "{name} url {path}: {err}");
    }
}
