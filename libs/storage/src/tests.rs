use bytes::Bytes;
use tempfile::TempDir;

use crate::{FsStore, StorageConfig, Store, StoreError};

fn fs_store(tmp: &TempDir, bucket: &str) -> FsStore {
    FsStore::new(tmp.path(), bucket)
}

#[tokio::test]
async fn put_list_and_stat_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = fs_store(&tmp, "live-streams");
    store.ensure_bucket().await.unwrap();

    store
        .put(
            "live-segments/k/720p/segment_000.ts",
            Bytes::from_static(b"abcd"),
            "video/mp2t",
        )
        .await
        .unwrap();
    store
        .put(
            "live-segments/k/720p/playlist.m3u8",
            Bytes::from_static(b"#EXTM3U"),
            "application/vnd.apple.mpegurl",
        )
        .await
        .unwrap();

    let stat = store.stat("live-segments/k/720p/segment_000.ts").await.unwrap();
    assert_eq!(stat.size, 4);

    let listed = store.list("live-segments/k/").await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|o| o.key.starts_with("live-segments/k/")));

    let other = store.list("live-segments/other/").await.unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn delete_prefix_leaves_prefix_empty() {
    let tmp = TempDir::new().unwrap();
    let store = fs_store(&tmp, "live-streams");
    store.ensure_bucket().await.unwrap();

    for quality in ["1080p", "720p"] {
        for n in 0..3 {
            store
                .put(
                    &format!("live-segments/k/{quality}/segment_{n:03}.ts"),
                    Bytes::from_static(b"x"),
                    "video/mp2t",
                )
                .await
                .unwrap();
        }
    }
    store
        .put("live-segments/other/master.m3u8", Bytes::from_static(b"#"), "application/vnd.apple.mpegurl")
        .await
        .unwrap();

    let deleted = store.delete_prefix("live-segments/k/").await.unwrap();
    assert_eq!(deleted, 6);
    assert!(store.list("live-segments/k/").await.unwrap().is_empty());

    // Objects outside the prefix are untouched.
    assert_eq!(store.list("live-segments/other/").await.unwrap().len(), 1);
}

#[tokio::test]
async fn copy_from_moves_objects_across_buckets() {
    let tmp = TempDir::new().unwrap();
    let recordings = fs_store(&tmp, "recordings");
    let videos = fs_store(&tmp, "vod-videos");
    recordings.ensure_bucket().await.unwrap();
    videos.ensure_bucket().await.unwrap();

    recordings
        .put("k.mp4", Bytes::from_static(b"mp4-bytes"), "video/mp4")
        .await
        .unwrap();

    videos
        .copy_from("recordings", "k.mp4", "v1.mp4", "video/mp4")
        .await
        .unwrap();

    let stat = videos.stat("v1.mp4").await.unwrap();
    assert_eq!(stat.size, 9);
    // Source stays in place; copy is not a move.
    assert!(recordings.stat("k.mp4").await.is_ok());
}

#[tokio::test]
async fn missing_objects_surface_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = fs_store(&tmp, "recordings");
    store.ensure_bucket().await.unwrap();

    match store.stat("nope.mp4").await {
        Err(StoreError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
    match store.get("nope.mp4").await {
        Err(StoreError::NotFound(_)) => {}
        Ok(_) => panic!("expected NotFound"),
        Err(other) => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn storage_config_endpoint_url() {
    let cfg = StorageConfig::S3 {
        endpoint: "minio:9000".to_string(),
        access_key: "minioadmin".to_string(),
        secret_key: "minioadmin".to_string(),
        use_ssl: false,
        region: "us-east-1".to_string(),
    };
    assert_eq!(cfg.endpoint_url().as_deref(), Some("http://minio:9000"));

    let cfg = StorageConfig::S3 {
        endpoint: "s3.example.com".to_string(),
        access_key: String::new(),
        secret_key: String::new(),
        use_ssl: true,
        region: "us-east-1".to_string(),
    };
    assert_eq!(cfg.endpoint_url().as_deref(), Some("https://s3.example.com"));

    let cfg = StorageConfig::Fs {
        root: "./storage".to_string(),
    };
    assert!(cfg.endpoint_url().is_none());
}
