//! Integration tests for rendition generation, caching and invalidation.

mod common;

use common::{jpeg, png, upload, TestHarness};
use picforge::pictures::{PictureSettings, PictureUpdate};

#[tokio::test]
async fn repeated_url_requests_generate_once() {
    let h = TestHarness::local();
    let picture = h
        .service
        .insert_picture(upload(jpeg(640, 480), "image/jpeg", "Blue Vase"), false)
        .await
        .unwrap();

    let first = h
        .service
        .ensure_picture_url(picture.id, 200, false, None)
        .await
        .unwrap()
        .unwrap();
    for _ in 0..5 {
        let again = h
            .service
            .ensure_picture_url(picture.id, 200, false, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again, first);
    }
    assert_eq!(h.rendition_writes(), 1);
    assert_eq!(first, format!("/images/thumbs/{}_blue-vase_200.jpg", picture.id));

    // A restarted service finds the rendition by name alone.
    let restarted = h.restarted();
    let after_restart = restarted
        .ensure_picture_url(picture.id, 200, false, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_restart, first);
    assert_eq!(h.rendition_writes(), 1);
}

#[tokio::test]
async fn rendition_fits_target_on_longest_side() {
    let h = TestHarness::local();
    let picture = h
        .service
        .insert_picture(upload(png(300, 600), "image/png", ""), false)
        .await
        .unwrap();

    h.service
        .ensure_picture_url(picture.id, 100, false, None)
        .await
        .unwrap();

    let name = format!("{}_100.png", picture.id);
    assert_eq!(h.rendition_dimensions(&name).await, (50, 100));

    // Smaller than the target: kept as is.
    h.service
        .ensure_picture_url(picture.id, 1000, false, None)
        .await
        .unwrap();
    let name = format!("{}_1000.png", picture.id);
    assert_eq!(h.rendition_dimensions(&name).await, (300, 600));
}

#[tokio::test]
async fn bitmap_renditions_are_png() {
    let h = TestHarness::local();
    let bmp = common::image_bytes(40, 20, image::ImageFormat::Bmp);
    let picture = h
        .service
        .insert_picture(upload(bmp, "image/bmp", "icon"), false)
        .await
        .unwrap();

    let url = h
        .service
        .ensure_picture_url(picture.id, 0, false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(url.ends_with("_icon.png"));

    let name = format!("{}_icon.png", picture.id);
    let bytes = h
        .service
        .media()
        .read_file(&format!("images/thumbs/{}", name))
        .await
        .unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);
}

#[tokio::test]
async fn seo_change_invalidates_old_renditions() {
    let h = TestHarness::local();
    let picture = h
        .service
        .insert_picture(upload(jpeg(400, 400), "image/jpeg", "Old Name"), false)
        .await
        .unwrap();

    for size in [0, 100, 200] {
        h.service
            .ensure_picture_url(picture.id, size, false, None)
            .await
            .unwrap();
    }
    assert_eq!(h.thumb_names().await.len(), 3);

    let updated = h
        .service
        .update_picture(
            picture.id,
            PictureUpdate {
                mime_type: "image/jpeg".to_string(),
                seo_filename: "New Name".to_string(),
                ..PictureUpdate::default()
            },
            false,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.seo_filename, "new-name");
    assert!(h.thumb_names().await.iter().all(|name| !name.contains("old-name")));

    let url = h
        .service
        .ensure_picture_url(picture.id, 100, false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(url.ends_with(&format!("{}_new-name_100.jpg", picture.id)));
    assert_eq!(
        h.thumb_names().await,
        vec![format!("{}_new-name_100.jpg", picture.id)]
    );
}

#[tokio::test]
async fn new_binary_regenerates_renditions() {
    let h = TestHarness::local();
    let picture = h
        .service
        .insert_picture(upload(png(200, 100), "image/png", "chart"), false)
        .await
        .unwrap();
    h.service
        .ensure_picture_url(picture.id, 0, false, None)
        .await
        .unwrap();
    let name = format!("{}_chart.png", picture.id);
    assert_eq!(h.rendition_dimensions(&name).await, (200, 100));

    h.service
        .update_picture(
            picture.id,
            PictureUpdate {
                binary: Some(png(60, 90)),
                mime_type: "image/png".to_string(),
                seo_filename: "chart".to_string(),
                ..PictureUpdate::default()
            },
            false,
        )
        .await
        .unwrap()
        .unwrap();
    assert!(h.thumb_names().await.is_empty());

    h.service
        .ensure_picture_url(picture.id, 0, false, None)
        .await
        .unwrap();
    assert_eq!(h.rendition_dimensions(&name).await, (60, 90));
}

#[tokio::test]
async fn set_seo_filename_only_acts_on_change() {
    let h = TestHarness::local();
    let picture = h
        .service
        .insert_picture(upload(jpeg(100, 100), "image/jpeg", "Lamp"), false)
        .await
        .unwrap();
    h.service
        .ensure_picture_url(picture.id, 50, false, None)
        .await
        .unwrap();

    let unchanged = h.service.set_seo_filename(&picture, "lamp").await.unwrap();
    assert_eq!(unchanged.seo_filename, "lamp");
    assert_eq!(h.thumb_names().await.len(), 1);
    let events_before = h.service.events().recent_events(100).len();

    let renamed = h.service.set_seo_filename(&picture, "Desk Lamp").await.unwrap();
    assert_eq!(renamed.seo_filename, "desk-lamp");
    assert!(h.thumb_names().await.is_empty());
    assert_eq!(
        h.service.get_picture(picture.id).unwrap().unwrap().seo_filename,
        "desk-lamp"
    );
    assert_eq!(h.service.events().recent_events(100).len(), events_before + 1);
}

#[tokio::test]
async fn original_round_trips_byte_identical() {
    let h = TestHarness::local();
    let bytes = jpeg(123, 77);
    let picture = h
        .service
        .insert_picture(upload(bytes.clone(), "image/jpeg", "photo"), false)
        .await
        .unwrap();

    let loaded = h.service.load_picture_binary(&picture).await.unwrap().unwrap();
    assert_eq!(loaded, bytes);

    h.service
        .ensure_picture_url(picture.id, 0, false, None)
        .await
        .unwrap();
    let name = format!("{}_photo.jpg", picture.id);
    assert_eq!(h.rendition_dimensions(&name).await, (123, 77));
}

#[tokio::test]
async fn validated_upload_is_shrunk_to_maximum() {
    let h = TestHarness::local_with(PictureSettings {
        maximum_image_size: 800,
        ..PictureSettings::default()
    });
    let picture = h
        .service
        .insert_picture(upload(png(2000, 1000), "image/png", "panorama"), true)
        .await
        .unwrap();

    let stored = h.service.load_picture_binary(&picture).await.unwrap().unwrap();
    let img = image::load_from_memory(&stored).unwrap();
    assert_eq!((img.width(), img.height()), (800, 400));

    h.service
        .ensure_picture_url(picture.id, 0, false, None)
        .await
        .unwrap();
    let name = format!("{}_panorama.png", picture.id);
    assert_eq!(h.rendition_dimensions(&name).await, (800, 400));
}

#[tokio::test]
async fn first_view_materializes_new_picture() {
    let h = TestHarness::local();
    let mut new_upload = upload(jpeg(50, 50), "image/jpeg", "fresh");
    new_upload.is_new = true;
    let picture = h.service.insert_picture(new_upload, false).await.unwrap();

    // A stale rendition left behind under the same id.
    let stale = format!("images/thumbs/{}_fresh_999.jpg", picture.id);
    h.service
        .media()
        .write_file(&stale, bytes::Bytes::from_static(b"stale"), true)
        .await
        .unwrap();

    h.service
        .ensure_picture_url(picture.id, 20, false, None)
        .await
        .unwrap();

    assert!(!h.service.get_picture(picture.id).unwrap().unwrap().is_new);
    assert_eq!(
        h.thumb_names().await,
        vec![format!("{}_fresh_20.jpg", picture.id)]
    );
}

#[tokio::test]
async fn missing_picture_falls_back_to_placeholder() {
    let h = TestHarness::local();
    h.service
        .media()
        .write_file("images/default-image.png", png(400, 200), true)
        .await
        .unwrap();

    let url = h
        .service
        .ensure_picture_url(picture_id(), 100, true, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(url, "/images/thumbs/default-image_100.png");
    assert_eq!(h.rendition_dimensions("default-image_100.png").await, (100, 50));

    let none = h
        .service
        .ensure_picture_url(picture_id(), 100, false, None)
        .await
        .unwrap();
    assert!(none.is_none());

    let direct = h.service.default_picture_url(0, Some("https://static.example.com")).await.unwrap();
    assert_eq!(
        direct.as_deref(),
        Some("https://static.example.com/images/thumbs/default-image.png")
    );
}

fn picture_id() -> picforge_common::PictureId {
    picforge_common::PictureId::new()
}

#[tokio::test]
async fn store_location_overrides_local_base() {
    let h = TestHarness::local();
    let picture = h
        .service
        .insert_picture(upload(jpeg(30, 30), "image/jpeg", ""), false)
        .await
        .unwrap();

    let local = h
        .service
        .ensure_picture_url(picture.id, 0, false, None)
        .await
        .unwrap()
        .unwrap();
    let remote = h
        .service
        .ensure_picture_url(picture.id, 0, false, Some("https://shop.example.com/"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(local, format!("/images/thumbs/{}.jpg", picture.id));
    assert_eq!(remote, format!("https://shop.example.com/images/thumbs/{}.jpg", picture.id));
    assert_eq!(h.rendition_writes(), 1);
}

#[tokio::test]
async fn failed_rendition_write_is_retried() {
    for (backend, h) in TestHarness::all_backends() {
        let picture = h
            .service
            .insert_picture(upload(jpeg(200, 100), "image/jpeg", "x"), false)
            .await
            .unwrap();
        let path = format!("images/thumbs/{}_x_100.jpg", picture.id);

        h.store.fail_next_write("images/thumbs/");
        let first = h
            .service
            .ensure_picture_url(picture.id, 100, false, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!h.service.media().file_exists(&path).await.unwrap(), "{}", backend);

        // The url was handed out but not cached, so the next lookup writes again.
        let second = h
            .service
            .ensure_picture_url(picture.id, 100, false, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, second, "{}", backend);
        assert!(h.service.media().file_exists(&path).await.unwrap(), "{}", backend);
        assert_eq!(h.rendition_writes(), 2, "{}", backend);
    }
}
