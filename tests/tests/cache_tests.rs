//! Integration tests for the durable cache facade.
//!
//! The crate's unit tests cover tier mechanics (LRU accounting, naming,
//! rendition scaling) in isolation; the tests here exercise whole-facade
//! behavior against real temp directories: survival across instances,
//! disk backstop after memory eviction, and the scoping rules of the
//! delete operations.

use std::sync::Arc;

use bytes::Bytes;
use rstest::rstest;

use media_cache::{CacheKey, CacheSettings, Dimensions, MediaCache, ResourceKind, SourceId};

mod setup;

fn payload(tag: u8, len: usize) -> Bytes {
    Bytes::from(vec![tag; len])
}

/// Encodes a small solid-color PNG so sized-variant paths have a real
/// image to scale.
fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 200, 30, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("png encode must succeed");
    Bytes::from(out.into_inner())
}

#[test]
fn payloads_survive_a_cache_restart() {
    setup::SERVER_RT.block_on(async {
        let root = tempfile::tempdir().expect("tempdir");
        let video = SourceId::from_name("clip.mp4");
        let photo = SourceId::from_name("photo.png");
        let movie_bytes = payload(1, 4096);
        let photo_bytes = png_bytes(64, 64);

        {
            let cache = MediaCache::new(CacheSettings::new(root.path())).await.unwrap();
            cache
                .put_original(video.clone(), ResourceKind::Video, movie_bytes.clone())
                .await
                .unwrap();
            cache
                .put_original(photo.clone(), ResourceKind::Image, photo_bytes.clone())
                .await
                .unwrap();
            cache
                .put_sized(
                    photo.clone(),
                    ResourceKind::Image,
                    photo_bytes.clone(),
                    Dimensions::new(16, 16),
                )
                .await
                .unwrap();
        }

        // A fresh instance over the same root sees everything.
        let reopened = MediaCache::new(CacheSettings::new(root.path())).await.unwrap();
        let video_key = CacheKey::original(video, ResourceKind::Video);
        assert_eq!(
            reopened.get(&video_key).await.unwrap(),
            Some(movie_bytes.clone())
        );
        assert_eq!(
            reopened
                .get(&CacheKey::original(photo.clone(), ResourceKind::Image))
                .await
                .unwrap(),
            Some(photo_bytes)
        );

        let sized_key = CacheKey::sized(photo, ResourceKind::Image, Dimensions::new(16, 16));
        let sized = reopened.get(&sized_key).await.unwrap().expect("rendition survives");
        let rendition = image::load_from_memory(&sized).expect("rendition must decode");
        assert_eq!((rendition.width(), rendition.height()), (16, 16));

        // Size probes answer from disk metadata without loading payloads.
        let cold = MediaCache::new(CacheSettings::new(root.path())).await.unwrap();
        assert_eq!(
            cold.len_hint(&video_key).await.unwrap(),
            Some(movie_bytes.len() as u64)
        );
        let absent = CacheKey::original(SourceId::from_name("never.mp4"), ResourceKind::Video);
        assert_eq!(cold.len_hint(&absent).await.unwrap(), None);
    });
}

#[test]
fn memory_eviction_falls_back_to_disk() {
    setup::SERVER_RT.block_on(async {
        let root = tempfile::tempdir().expect("tempdir");
        let settings = CacheSettings::new(root.path()).encoded_max_entries(1);
        let cache = MediaCache::new(settings).await.unwrap();

        let first = SourceId::from_name("first.mp4");
        let second = SourceId::from_name("second.mp4");
        cache
            .put_original(first.clone(), ResourceKind::Video, payload(7, 512))
            .await
            .unwrap();
        // Inserting the second evicts the first from the memory tier.
        cache
            .put_original(second.clone(), ResourceKind::Video, payload(8, 512))
            .await
            .unwrap();

        // Both still resolve; the first comes back through the disk tier.
        assert_eq!(
            cache
                .get(&CacheKey::original(first, ResourceKind::Video))
                .await
                .unwrap(),
            Some(payload(7, 512))
        );
        assert_eq!(
            cache
                .get(&CacheKey::original(second, ResourceKind::Video))
                .await
                .unwrap(),
            Some(payload(8, 512))
        );
    });
}

#[test]
fn delete_scopes_to_one_kind() {
    setup::SERVER_RT.block_on(async {
        let root = tempfile::tempdir().expect("tempdir");
        let cache = MediaCache::new(CacheSettings::new(root.path())).await.unwrap();

        // The same source name can exist under both kinds.
        let source = SourceId::from_name("asset.bin");
        cache
            .put_original(source.clone(), ResourceKind::Video, payload(1, 128))
            .await
            .unwrap();
        cache
            .put_original(source.clone(), ResourceKind::Image, payload(2, 128))
            .await
            .unwrap();

        let removed = cache.delete(&source, ResourceKind::Video).await.unwrap();
        assert_eq!(removed, 1);

        assert_eq!(
            cache
                .get(&CacheKey::original(source.clone(), ResourceKind::Video))
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            cache
                .get(&CacheKey::original(source, ResourceKind::Image))
                .await
                .unwrap(),
            Some(payload(2, 128))
        );
    });
}

#[rstest]
#[case(ResourceKind::Video, ResourceKind::Image)]
#[case(ResourceKind::Image, ResourceKind::Video)]
fn clear_wipes_one_kind_and_leaves_the_other(
    #[case] cleared: ResourceKind,
    #[case] kept: ResourceKind,
) {
    setup::SERVER_RT.block_on(async {
        let root = tempfile::tempdir().expect("tempdir");
        let cache = MediaCache::new(CacheSettings::new(root.path())).await.unwrap();

        for name in ["a.bin", "b.bin"] {
            let source = SourceId::from_name(name);
            cache
                .put_original(source.clone(), cleared, payload(3, 64))
                .await
                .unwrap();
            cache.put_original(source, kept, payload(4, 64)).await.unwrap();
        }

        let removed = cache.clear(cleared).await.unwrap();
        assert_eq!(removed, 2);

        for name in ["a.bin", "b.bin"] {
            let source = SourceId::from_name(name);
            assert_eq!(
                cache
                    .get(&CacheKey::original(source.clone(), cleared))
                    .await
                    .unwrap(),
                None,
                "cleared kind must be empty"
            );
            assert_eq!(
                cache.get(&CacheKey::original(source, kept)).await.unwrap(),
                Some(payload(4, 64)),
                "other kind must be untouched"
            );
        }
    });
}

#[test]
fn similar_names_do_not_collide() {
    setup::SERVER_RT.block_on(async {
        let root = tempfile::tempdir().expect("tempdir");
        let cache = MediaCache::new(CacheSettings::new(root.path())).await.unwrap();

        // "photo" is a name prefix of "photo2"; deletes must not bleed over.
        let photo = SourceId::from_name("photo.png");
        let photo2 = SourceId::from_name("photo2.png");
        let image = png_bytes(32, 32);
        for source in [&photo, &photo2] {
            cache
                .put_original(source.clone(), ResourceKind::Image, image.clone())
                .await
                .unwrap();
            cache
                .put_sized(
                    source.clone(),
                    ResourceKind::Image,
                    image.clone(),
                    Dimensions::new(8, 8),
                )
                .await
                .unwrap();
        }

        let removed = cache.delete_all(&photo).await.unwrap();
        assert_eq!(removed, 2, "original plus one rendition");

        assert_eq!(
            cache
                .get(&CacheKey::original(photo, ResourceKind::Image))
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            cache
                .get(&CacheKey::original(photo2.clone(), ResourceKind::Image))
                .await
                .unwrap(),
            Some(image)
        );
        assert!(cache
            .get(&CacheKey::sized(photo2, ResourceKind::Image, Dimensions::new(8, 8)))
            .await
            .unwrap()
            .is_some());
    });
}

#[test]
fn purge_scratch_leaves_final_payloads() {
    setup::SERVER_RT.block_on(async {
        let root = tempfile::tempdir().expect("tempdir");
        let cache = MediaCache::new(CacheSettings::new(root.path())).await.unwrap();

        let source = SourceId::from_name("keep.mp4");
        cache
            .put_original(source.clone(), ResourceKind::Video, payload(9, 256))
            .await
            .unwrap();

        // Leftovers as an interrupted transcode would leave them.
        let scratch = root.path().join("scratch");
        tokio::fs::write(scratch.join(".transcode-in-abc.mp4"), b"partial")
            .await
            .unwrap();
        tokio::fs::write(scratch.join(".out-keep_256x256.mp4"), b"partial")
            .await
            .unwrap();

        let removed = cache.purge_scratch().await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            cache
                .get(&CacheKey::original(source, ResourceKind::Video))
                .await
                .unwrap(),
            Some(payload(9, 256))
        );
    });
}

#[test]
fn caches_can_be_shared_across_tasks() {
    setup::SERVER_RT.block_on(async {
        let root = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(MediaCache::new(CacheSettings::new(root.path())).await.unwrap());

        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                let source = SourceId::from_name(&format!("task-{i}.mp4"));
                cache
                    .put_original(source.clone(), ResourceKind::Video, payload(i, 128))
                    .await
                    .unwrap();
                source
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            let source = task.await.expect("writer task must not panic");
            assert_eq!(
                cache
                    .get(&CacheKey::original(source, ResourceKind::Video))
                    .await
                    .unwrap(),
                Some(payload(i as u8, 128))
            );
        }
    });
}
