use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use storage::{AnyStore, Store};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::transcode::profiles;

const SCAN_INTERVAL: Duration = Duration::from_secs(2);
const STABLE_PROBE_DELAY: Duration = Duration::from_millis(300);
const MAX_CONCURRENT_UPLOADS: usize = 10;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// Watches a transcode's scratch directory and mirrors closed segment files
/// into the live bucket for the lifetime of the encode.
///
/// Segments are immutable once closed and uploaded exactly once; playlists
/// are overwritten on every scan tick. A viewer may briefly see a playlist
/// entry whose segment upload is still in flight; players retry within the
/// 2 s scan cadence.
pub struct SegmentPublisher {
    store: Arc<AnyStore>,
    stream_key: String,
    output_dir: PathBuf,
    uploaded: Mutex<HashSet<String>>,
    upload_slots: Arc<Semaphore>,
}

impl SegmentPublisher {
    pub fn new(store: Arc<AnyStore>, stream_key: &str, output_dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            store,
            stream_key: stream_key.to_string(),
            output_dir: output_dir.to_path_buf(),
            uploaded: Mutex::new(HashSet::new()),
            upload_slots: Arc::new(Semaphore::new(MAX_CONCURRENT_UPLOADS)),
        })
    }

    /// Scans every 2 s until `stop` fires, then performs one final drain that
    /// uploads everything the encoder left behind.
    pub async fn run(self: Arc<Self>, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(SCAN_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => self.scan_and_upload(false).await,
            }
        }
        debug!(stream_key = self.stream_key, "publisher draining");
        self.scan_and_upload(true).await;
        debug!(stream_key = self.stream_key, "publisher drained");
    }

    /// One scan pass. Outside of drain mode a segment is eligible only once
    /// two size probes 300 ms apart agree, which excludes the file the
    /// encoder is still writing.
    async fn scan_and_upload(&self, drain: bool) {
        let mut uploads = JoinSet::new();

        for quality in profiles::quality_names() {
            let quality_dir = self.output_dir.join(quality);
            for path in list_segments(&quality_dir).await {
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let tracked = format!("{quality}/{file_name}");
                if self.uploaded.lock().await.contains(&tracked) {
                    continue;
                }
                if !drain && !stable_size(&path).await {
                    continue;
                }

                let permit = match self.upload_slots.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let store = self.store.clone();
                let key = format!(
                    "live-segments/{}/{}/{}",
                    self.stream_key, quality, file_name
                );
                uploads.spawn(async move {
                    let _permit = permit;
                    match store.put_file(&key, &path, SEGMENT_CONTENT_TYPE).await {
                        Ok(()) => {
                            crate::metrics::SEGMENT.inc();
                            debug!(key, "segment uploaded");
                            Some(tracked)
                        }
                        Err(err) => {
                            warn!(key, %err, "segment upload failed");
                            None
                        }
                    }
                });
            }

            if !drain {
                self.upload_playlist(
                    quality_dir.join("playlist.m3u8"),
                    format!(
                        "live-segments/{}/{}/playlist.m3u8",
                        self.stream_key, quality
                    ),
                    false,
                )
                .await;
            }
        }
        if !drain {
            self.upload_playlist(
                self.output_dir.join("master.m3u8"),
                format!("live-segments/{}/master.m3u8", self.stream_key),
                false,
            )
            .await;
        }

        while let Some(result) = uploads.join_next().await {
            if let Ok(Some(tracked)) = result {
                self.uploaded.lock().await.insert(tracked);
            }
        }

        // In the drain, playlists go up only after the last segment landed:
        // the final playlist must never reference an object that is missing
        // once the publisher reports done.
        if drain {
            for quality in profiles::quality_names() {
                self.upload_playlist(
                    self.output_dir.join(quality).join("playlist.m3u8"),
                    format!(
                        "live-segments/{}/{}/playlist.m3u8",
                        self.stream_key, quality
                    ),
                    true,
                )
                .await;
            }
            self.upload_playlist(
                self.output_dir.join("master.m3u8"),
                format!("live-segments/{}/master.m3u8", self.stream_key),
                true,
            )
            .await;
        }
    }

    /// Playlist uploads are fire-and-forget: a failure is retried implicitly
    /// on the next tick's overwrite. The final drain awaits them so the last
    /// playlist state lands before the publisher reports done.
    async fn upload_playlist(&self, path: PathBuf, key: String, drain: bool) {
        if tokio::fs::metadata(&path).await.is_err() {
            return;
        }
        let store = self.store.clone();
        let task = async move {
            if let Err(err) = store.put_file(&key, &path, PLAYLIST_CONTENT_TYPE).await {
                warn!(key, %err, "playlist upload failed");
            }
        };
        if drain {
            task.await;
        } else {
            tokio::spawn(task);
        }
    }

    /// Uploads the session thumbnail grabbed by the transcoder.
    pub async fn upload_thumbnail(&self, path: &Path) -> Result<String, storage::StoreError> {
        let key = format!("live-segments/{}/thumbnail.jpg", self.stream_key);
        self.store.put_file(&key, path, "image/jpeg").await?;
        Ok(key)
    }
}

pub(crate) async fn list_segments(dir: &Path) -> Vec<PathBuf> {
    let mut segments = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return segments;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("segment_") && name.ends_with(".ts") {
            segments.push(entry.path());
        }
    }
    segments.sort();
    segments
}

/// The encoder renames segments into place only on close; a file whose size
/// is unchanged across two probes 300 ms apart is taken as closed.
async fn stable_size(path: &Path) -> bool {
    let Ok(first) = tokio::fs::metadata(path).await else {
        return false;
    };
    tokio::time::sleep(STABLE_PROBE_DELAY).await;
    let Ok(second) = tokio::fs::metadata(path).await else {
        return false;
    };
    first.len() == second.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn stable_size_rejects_growing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("segment_000.ts");
        tokio::fs::write(&path, b"start").await.unwrap();

        let grower = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                tokio::fs::write(&path, b"start-plus-more").await.unwrap();
            })
        };

        assert!(!stable_size(&path).await);
        grower.await.unwrap();

        // Once writes stop, the same probe passes.
        assert!(stable_size(&path).await);
    }

    #[tokio::test]
    async fn list_segments_filters_and_orders() {
        let tmp = TempDir::new().unwrap();
        for name in ["segment_010.ts", "segment_002.ts", "playlist.m3u8", "junk.txt"] {
            tokio::fs::write(tmp.path().join(name), b"x").await.unwrap();
        }

        let names: Vec<String> = list_segments(tmp.path())
            .await
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["segment_002.ts", "segment_010.ts"]);
    }
}
