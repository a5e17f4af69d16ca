//! Concurrent URL requests share one generation per rendition.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{jpeg, upload, TestHarness};
use futures::future::join_all;
use picforge::pictures::PictureUpdate;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_requests_generate_once() {
    let h = TestHarness::local();
    let picture = h
        .service
        .insert_picture(upload(jpeg(1200, 900), "image/jpeg", "Hall"), false)
        .await
        .unwrap();

    let tasks = (0..16).map(|_| {
        let service = Arc::clone(&h.service);
        tokio::spawn(async move {
            service
                .ensure_picture_url(picture.id, 300, false, None)
                .await
                .unwrap()
                .unwrap()
        })
    });
    let urls: Vec<String> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let expected = format!("/images/thumbs/{}_hall_300.jpg", picture.id);
    assert!(urls.iter().all(|url| *url == expected));
    assert_eq!(h.rendition_writes(), 1);
    assert_eq!(h.service.generations_in_flight(), 0);
    assert_eq!(
        h.rendition_dimensions(&format!("{}_hall_300.jpg", picture.id)).await,
        (300, 225)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_first_views_materialize_once() {
    let h = TestHarness::object();
    let mut new_upload = upload(jpeg(400, 200), "image/jpeg", "");
    new_upload.is_new = true;
    let picture = h.service.insert_picture(new_upload, false).await.unwrap();

    let tasks = (0..8).map(|_| {
        let service = Arc::clone(&h.service);
        tokio::spawn(async move {
            service
                .ensure_picture_url(picture.id, 100, false, None)
                .await
                .unwrap()
        })
    });
    for joined in join_all(tasks).await {
        assert!(joined.unwrap().is_some());
    }

    assert_eq!(h.rendition_writes(), 1);
    assert!(!h.service.get_picture(picture.id).unwrap().unwrap().is_new);
    assert_eq!(h.thumb_names().await, vec![format!("{}_100.jpg", picture.id)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_sizes_generate_independently() {
    let h = TestHarness::blob();
    let picture = h
        .service
        .insert_picture(upload(jpeg(500, 500), "image/jpeg", "tile"), false)
        .await
        .unwrap();

    let sizes = [50u32, 100, 150, 200];
    let tasks = sizes.iter().flat_map(|&size| {
        let h_service = Arc::clone(&h.service);
        (0..3).map(move |_| {
            let service = Arc::clone(&h_service);
            tokio::spawn(async move {
                service
                    .ensure_picture_url(picture.id, size, false, None)
                    .await
                    .unwrap()
            })
        })
    });
    for joined in join_all(tasks.collect::<Vec<_>>()).await {
        assert!(joined.unwrap().is_some());
    }

    assert_eq!(h.rendition_writes(), sizes.len());
    assert_eq!(h.thumb_names().await.len(), sizes.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lookup_during_update_renders_new_original() {
    let h = TestHarness::local();
    let picture = h
        .service
        .insert_picture(upload(jpeg(200, 100), "image/jpeg", "x"), false)
        .await
        .unwrap();
    let id = picture.id;

    // Hold the update while its new original is being written.
    let gate = h.store.gate_next_write(&format!("images/{}_0", id));
    let service = Arc::clone(&h.service);
    let update = tokio::spawn(async move {
        service
            .update_picture(
                id,
                PictureUpdate {
                    binary: Some(jpeg(200, 400)),
                    mime_type: "image/jpeg".to_string(),
                    seo_filename: "x".to_string(),
                    ..PictureUpdate::default()
                },
                false,
            )
            .await
    });
    gate.entered.notified().await;

    let service = Arc::clone(&h.service);
    let lookup = tokio::spawn(async move { service.ensure_picture_url(id, 100, false, None).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!lookup.is_finished());

    gate.release.notify_one();
    update.await.unwrap().unwrap().unwrap();
    let url = lookup.await.unwrap().unwrap().unwrap();

    assert_eq!(url, format!("/images/thumbs/{}_x_100.jpg", id));
    assert_eq!(h.rendition_dimensions(&format!("{}_x_100.jpg", id)).await, (50, 100));
    assert_eq!(h.rendition_writes(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lookup_during_seo_change_uses_new_name() {
    let h = TestHarness::blob();
    let picture = h
        .service
        .insert_picture(upload(jpeg(120, 60), "image/jpeg", "old name"), false)
        .await
        .unwrap();
    let id = picture.id;

    let service = Arc::clone(&h.service);
    let renamed = picture.clone();
    let (rename, lookup) = tokio::join!(
        tokio::spawn(async move { service.set_seo_filename(&renamed, "new name").await }),
        {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move { service.ensure_picture_url(id, 30, false, None).await })
        }
    );
    rename.unwrap().unwrap();
    lookup.unwrap().unwrap().unwrap();

    // Whichever ran first, a fresh lookup agrees with what is stored.
    let url = h
        .service
        .ensure_picture_url(id, 30, false, None)
        .await
        .unwrap()
        .unwrap();
    assert!(url.ends_with(&format!("{}_new-name_30.jpg", id)), "{}", url);
    assert_eq!(h.thumb_names().await, vec![format!("{}_new-name_30.jpg", id)]);
}
