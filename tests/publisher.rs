use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use storage::{AnyStore, FsStore, Store};
use streamd::transcode::publisher::SegmentPublisher;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const STREAM_KEY: &str = "deadbeefcafe";

async fn write_segment(dir: &Path, quality: &str, n: u32) {
    let quality_dir = dir.join(quality);
    tokio::fs::create_dir_all(&quality_dir).await.unwrap();
    tokio::fs::write(
        quality_dir.join(format!("segment_{n:03}.ts")),
        format!("segment-{quality}-{n}"),
    )
    .await
    .unwrap();
}

async fn write_playlists(dir: &Path, qualities: &[&str]) {
    for quality in qualities {
        tokio::fs::write(dir.join(quality).join("playlist.m3u8"), "#EXTM3U")
            .await
            .unwrap();
    }
    tokio::fs::write(dir.join("master.m3u8"), "#EXTM3U").await.unwrap();
}

fn live_store(tmp: &TempDir) -> Arc<AnyStore> {
    Arc::new(AnyStore::Fs(FsStore::new(
        tmp.path().join("buckets"),
        "live-streams",
    )))
}

#[tokio::test]
async fn final_drain_uploads_every_closed_segment() {
    let tmp = TempDir::new().unwrap();
    let scratch = tmp.path().join("scratch").join(STREAM_KEY);

    for n in 0..3 {
        write_segment(&scratch, "1080p", n).await;
    }
    write_segment(&scratch, "360p", 0).await;
    write_playlists(&scratch, &["1080p", "360p"]).await;

    let store = live_store(&tmp);
    store.ensure_bucket().await.unwrap();

    let publisher = SegmentPublisher::new(store.clone(), STREAM_KEY, &scratch);
    let stop = CancellationToken::new();
    stop.cancel();
    // With the token already cancelled, run() goes straight to the drain.
    publisher.run(stop).await;

    for n in 0..3 {
        let key = format!("live-segments/{STREAM_KEY}/1080p/segment_{n:03}.ts");
        assert!(store.stat(&key).await.is_ok(), "missing {key}");
    }
    assert!(store
        .stat(&format!("live-segments/{STREAM_KEY}/360p/segment_000.ts"))
        .await
        .is_ok());
    assert!(store
        .stat(&format!("live-segments/{STREAM_KEY}/1080p/playlist.m3u8"))
        .await
        .is_ok());
    assert!(store
        .stat(&format!("live-segments/{STREAM_KEY}/master.m3u8"))
        .await
        .is_ok());
}

#[tokio::test]
async fn periodic_scan_uploads_stable_segments_while_running() {
    let tmp = TempDir::new().unwrap();
    let scratch = tmp.path().join("scratch").join(STREAM_KEY);
    write_segment(&scratch, "720p", 0).await;
    write_playlists(&scratch, &["720p"]).await;

    let store = live_store(&tmp);
    store.ensure_bucket().await.unwrap();

    let publisher = SegmentPublisher::new(store.clone(), STREAM_KEY, &scratch);
    let stop = CancellationToken::new();
    let task = tokio::spawn(publisher.run(stop.clone()));

    // First tick fires immediately; the 300 ms stability probe must pass
    // before the upload is scheduled.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let key = format!("live-segments/{STREAM_KEY}/720p/segment_000.ts");
    assert!(
        store.stat(&key).await.is_ok(),
        "stable segment not uploaded by periodic scan"
    );

    // A segment closed mid-broadcast is picked up by a later tick.
    write_segment(&scratch, "720p", 1).await;
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert!(store
        .stat(&format!("live-segments/{STREAM_KEY}/720p/segment_001.ts"))
        .await
        .is_ok());

    stop.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn drain_does_not_reupload_tracked_segments() {
    let tmp = TempDir::new().unwrap();
    let scratch = tmp.path().join("scratch").join(STREAM_KEY);
    write_segment(&scratch, "480p", 0).await;
    write_playlists(&scratch, &["480p"]).await;

    let store = live_store(&tmp);
    store.ensure_bucket().await.unwrap();

    let publisher = SegmentPublisher::new(store.clone(), STREAM_KEY, &scratch);
    let stop = CancellationToken::new();
    let task = tokio::spawn(publisher.clone().run(stop.clone()));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let key = format!("live-segments/{STREAM_KEY}/480p/segment_000.ts");
    assert!(store.stat(&key).await.is_ok());

    // Replace the uploaded object out-of-band; the drain must not overwrite
    // an already-tracked segment.
    store
        .put(&key, bytes::Bytes::from_static(b"sentinel"), "video/mp2t")
        .await
        .unwrap();

    stop.cancel();
    task.await.unwrap();

    assert_eq!(store.stat(&key).await.unwrap().size, "sentinel".len() as i64);
}
