//! The same insert, url and delete sequence behaves alike on every backend.

mod common;

use common::{png, upload, TestHarness};
use picforge::events::PicturePayload;
use picforge::pictures::PictureUpdate;

#[tokio::test]
async fn insert_url_delete_sequence() {
    for (backend, h) in TestHarness::all_backends() {
        let picture = h
            .service
            .insert_picture(upload(png(320, 160), "image/png", "Garden Chair"), false)
            .await
            .unwrap_or_else(|e| panic!("{}: insert failed: {}", backend, e));

        // Miss, then hit.
        let url = h
            .service
            .ensure_picture_url(picture.id, 80, false, None)
            .await
            .unwrap()
            .unwrap();
        assert!(
            url.ends_with(&format!("images/thumbs/{}_garden-chair_80.png", picture.id)),
            "{}: unexpected url {}",
            backend,
            url
        );
        let again = h
            .service
            .ensure_picture_url(picture.id, 80, false, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(url, again, "{}", backend);
        assert_eq!(h.rendition_writes(), 1, "{}", backend);
        assert_eq!(
            h.rendition_dimensions(&format!("{}_garden-chair_80.png", picture.id)).await,
            (80, 40),
            "{}",
            backend
        );

        // Invalidation.
        h.service
            .update_picture(
                picture.id,
                PictureUpdate {
                    mime_type: "image/png".to_string(),
                    seo_filename: "Patio Chair".to_string(),
                    ..PictureUpdate::default()
                },
                false,
            )
            .await
            .unwrap()
            .unwrap();
        assert!(h.thumb_names().await.is_empty(), "{}", backend);

        // Deletion removes renditions, original and record.
        h.service
            .ensure_picture_url(picture.id, 80, false, None)
            .await
            .unwrap();
        let current = h.service.get_picture(picture.id).unwrap().unwrap();
        h.service.delete_picture(&current).await.unwrap();

        assert!(h.thumb_names().await.is_empty(), "{}", backend);
        assert!(h.service.get_picture(picture.id).unwrap().is_none(), "{}", backend);
        assert!(
            h.service.load_picture_binary(&current).await.unwrap().is_none(),
            "{}",
            backend
        );

        let kinds: Vec<_> = h
            .service
            .events()
            .recent_events(10)
            .into_iter()
            .rev()
            .map(|event| event.payload)
            .collect();
        assert!(matches!(kinds[0], PicturePayload::PictureInserted { .. }), "{}", backend);
        assert!(matches!(kinds[1], PicturePayload::PictureUpdated { .. }), "{}", backend);
        assert!(matches!(kinds[2], PicturePayload::PictureDeleted { .. }), "{}", backend);
    }
}

#[tokio::test]
async fn object_storage_urls_use_cdn() {
    let h = TestHarness::object();
    let picture = h
        .service
        .insert_picture(upload(png(10, 10), "image/png", "dot"), false)
        .await
        .unwrap();

    let url = h
        .service
        .ensure_picture_url(picture.id, 0, false, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        url,
        format!("https://cdn.example.com/images/thumbs/{}_dot.png", picture.id)
    );
}
