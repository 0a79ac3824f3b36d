use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use api::event::RecordingComplete;
use db::{status, RecordingRepo};
use reqwest::Client;
use serde::Deserialize;
use storage::{AnyStore, Store};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assemble;
use crate::config::Config;

const QUIESCENCE_POLL: Duration = Duration::from_millis(500);
const QUIESCENCE_MAX_WAIT: Duration = Duration::from_secs(15);
const QUIESCENCE_STABLE_PROBES: u32 = 4;
const LIST_TIMEOUT: Duration = Duration::from_secs(2);

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
const IMPORT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Subset of the stream service's stream representation this service needs.
#[derive(Deserialize, Debug, Clone)]
pub struct StreamInfo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stream_key: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Default)]
struct Registry {
    active: HashMap<Uuid, CancellationToken>,
    key_to_id: HashMap<String, Uuid>,
}

/// Owns the recording lifecycle: reacts to start/stop webhooks, watches the
/// live-stream snapshot as a safety net, and finalizes each broadcast into a
/// durable MP4 plus thumbnail in the recordings bucket.
pub struct Monitor {
    http: Client,
    stream_service_url: String,
    vod_service_url: String,
    internal_api_key: String,
    live_store: Arc<AnyStore>,
    recordings_store: Arc<AnyStore>,
    recordings: RecordingRepo,
    scratch_dir: PathBuf,
    interval: Duration,
    registry: Mutex<Registry>,
}

impl Monitor {
    pub fn new(
        cfg: &Config,
        live_store: Arc<AnyStore>,
        recordings_store: Arc<AnyStore>,
        recordings: RecordingRepo,
    ) -> Arc<Self> {
        Arc::new(Self {
            http: Client::new(),
            stream_service_url: cfg.services.stream_service_url.trim_end_matches('/').to_string(),
            vod_service_url: cfg.services.vod_service_url.trim_end_matches('/').to_string(),
            internal_api_key: cfg.internal_api_key.clone(),
            live_store,
            recordings_store,
            recordings,
            scratch_dir: PathBuf::from(&cfg.recording.scratch_dir),
            interval: Duration::from_secs(cfg.recording.monitor_interval),
            registry: Mutex::new(Registry::default()),
        })
    }

    /// `started` webhook: create the recording row and arm a recording task.
    /// Idempotent per stream: a second `started` while one is active is a
    /// successful no-op.
    pub async fn handle_started(self: &Arc<Self>, stream_key: &str) -> anyhow::Result<()> {
        let stream_id = match self.cached_stream_id(stream_key).await {
            Some(id) => id,
            None => {
                let info = self.stream_info_by_key(stream_key).await?;
                let mut registry = self.registry.lock().await;
                registry.key_to_id.insert(stream_key.to_string(), info.id);
                info.id
            }
        };

        let mut registry = self.registry.lock().await;
        if registry.active.contains_key(&stream_id) {
            info!(%stream_id, stream_key, "stream is already being recorded");
            return Ok(());
        }

        let recording = self
            .recordings
            .create(stream_id, &format!("{stream_key}.mp4"))
            .await?;
        info!(%stream_id, recording_id = %recording.id, stream_key, "recording started");

        let token = CancellationToken::new();
        registry.active.insert(stream_id, token.clone());
        drop(registry);

        let monitor = self.clone();
        let stream_key = stream_key.to_string();
        tokio::spawn(async move {
            monitor
                .recording_task(stream_key, recording.id, stream_id, token)
                .await;
        });
        Ok(())
    }

    /// `stopped` webhook: cancel the stream's recording task. Silent when no
    /// task is registered (duplicate stop, or stop after snapshot cleanup).
    pub async fn handle_stopped(&self, stream_key: &str) {
        let mut registry = self.registry.lock().await;
        let Some(stream_id) = registry.key_to_id.get(stream_key).copied() else {
            warn!(stream_key, "stop for unknown stream key");
            return;
        };
        if let Some(token) = registry.active.remove(&stream_id) {
            info!(%stream_id, stream_key, "stopping recording");
            token.cancel();
        }
    }

    async fn cached_stream_id(&self, stream_key: &str) -> Option<Uuid> {
        self.registry.lock().await.key_to_id.get(stream_key).copied()
    }

    /// Periodic live-stream snapshot. Any registered recording whose stream
    /// no longer shows as live gets cancelled, which recovers from lost
    /// `stopped` webhooks.
    pub async fn run_snapshot(self: Arc<Self>, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "stream monitor started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.check_streams().await,
            }
        }
        info!("stream monitor stopped");
    }

    async fn check_streams(&self) {
        let live = match self.fetch_live_streams().await {
            Ok(live) => live,
            Err(err) => {
                warn!(%err, "failed to fetch live streams");
                return;
            }
        };
        debug!(count = live.len(), "live stream snapshot");

        let mut registry = self.registry.lock().await;
        let live_ids: HashSet<Uuid> = live.iter().map(|s| s.id).collect();
        for stream in &live {
            registry
                .key_to_id
                .insert(stream.stream_key.clone(), stream.id);
        }

        let stale: Vec<Uuid> = registry
            .active
            .keys()
            .filter(|id| !live_ids.contains(id))
            .copied()
            .collect();
        for stream_id in stale {
            if let Some(token) = registry.active.remove(&stream_id) {
                info!(%stream_id, "stream no longer live, stopping recording");
                token.cancel();
            }
        }
    }

    /// One finalization, armed at `started` and fired by cancellation. The
    /// cleanup webhook is sent no matter how processing went; `success=false`
    /// tells the ingest service to keep the live segments.
    async fn recording_task(
        self: Arc<Self>,
        stream_key: String,
        recording_id: Uuid,
        stream_id: Uuid,
        token: CancellationToken,
    ) {
        token.cancelled().await;

        let result = self.process(&stream_key, recording_id, stream_id).await;
        let success = result.is_ok();
        if let Err(err) = &result {
            error!(%recording_id, %err, "failed to process recording");
            if let Err(err) = self
                .recordings
                .finalize(recording_id, status::recording::FAILED)
                .await
            {
                error!(%recording_id, %err, "failed to mark recording failed");
            }
        }

        self.registry.lock().await.active.remove(&stream_id);
        self.send_cleanup_webhook(&stream_key, stream_id, success).await;
    }

    async fn process(
        self: &Arc<Self>,
        stream_key: &str,
        recording_id: Uuid,
        stream_id: Uuid,
    ) -> anyhow::Result<()> {
        let file_count = wait_for_upload_quiescence(
            self.live_store.as_ref(),
            stream_key,
            QUIESCENCE_MAX_WAIT,
        )
        .await;
        info!(%recording_id, file_count, "processing completed recording");

        // Reassemble the best rendition into one MP4 on scratch.
        let work_dir = self.scratch_dir.join("temp").join(recording_id.to_string());
        tokio::fs::create_dir_all(&work_dir).await?;
        let output = self.scratch_dir.join(format!("{recording_id}.mp4"));

        let assembled: anyhow::Result<()> = async {
            let (segments, quality) =
                assemble::download_single_quality(self.live_store.as_ref(), stream_key, &work_dir)
                    .await?;
            info!(count = segments.len(), quality, stream_key, "assembling mp4");
            let manifest = work_dir.join("concat.txt");
            assemble::write_concat_manifest(&segments, &manifest).await?;
            assemble::concat_segments(&manifest, &output).await?;
            Ok(())
        }
        .await;
        // Segment downloads are only needed for the concat.
        let _ = tokio::fs::remove_dir_all(&work_dir).await;
        assembled?;

        // Thumbnail is best-effort; a recording without one is still valid.
        let thumbnail = self.scratch_dir.join(format!("{recording_id}.thumb.jpg"));
        let mut thumbnail_generated = true;
        if let Err(err) = assemble::generate_thumbnail(&output, &thumbnail).await {
            warn!(%recording_id, %err, "scene thumbnail failed, trying simple grab");
            if let Err(err) = assemble::generate_thumbnail_simple(&output, &thumbnail).await {
                warn!(%recording_id, %err, "thumbnail generation failed");
                thumbnail_generated = false;
            }
        }

        let upload: anyhow::Result<()> = async {
            let file_size = tokio::fs::metadata(&output).await?.len() as i64;
            let duration = assemble::probe_duration(&output).await;

            self.recordings_store
                .put_file(&format!("{stream_key}.mp4"), &output, "video/mp4")
                .await?;
            info!(%recording_id, "recording uploaded: {stream_key}.mp4");

            let mut thumbnail_key = None;
            if thumbnail_generated {
                let key = format!("{stream_key}.jpg");
                match self
                    .recordings_store
                    .put_file(&key, &thumbnail, "image/jpeg")
                    .await
                {
                    Ok(()) => thumbnail_key = Some(key),
                    Err(err) => warn!(%recording_id, %err, "thumbnail upload failed"),
                }
            }

            self.recordings
                .set_media(recording_id, thumbnail_key.as_deref(), duration, file_size)
                .await?;
            self.recordings
                .finalize(recording_id, status::recording::COMPLETED)
                .await?;
            Ok(())
        }
        .await;

        let _ = tokio::fs::remove_file(&output).await;
        let _ = tokio::fs::remove_file(&thumbnail).await;
        upload?;

        info!(%recording_id, "recording completed");

        // Import runs on its own task; cleanup is already safe because the
        // finalizer reads from the recordings bucket only.
        let monitor = self.clone();
        tokio::spawn(async move {
            monitor.trigger_vod_import(stream_id, recording_id).await;
        });
        Ok(())
    }

    async fn fetch_live_streams(&self) -> anyhow::Result<Vec<StreamInfo>> {
        #[derive(Deserialize)]
        struct LiveStreams {
            streams: Vec<StreamInfo>,
        }
        let response = self
            .http
            .get(format!("{}{}", self.stream_service_url, api::path::STREAMS_LIVE))
            .timeout(WEBHOOK_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<LiveStreams>().await?.streams)
    }

    async fn stream_info_by_key(&self, stream_key: &str) -> anyhow::Result<StreamInfo> {
        let response = self
            .http
            .get(format!(
                "{}{}",
                self.stream_service_url,
                api::path::stream_by_key(stream_key)
            ))
            .timeout(WEBHOOK_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn stream_info_by_id(&self, stream_id: Uuid) -> anyhow::Result<StreamInfo> {
        let response = self
            .http
            .get(format!(
                "{}{}",
                self.stream_service_url,
                api::path::stream(&stream_id.to_string())
            ))
            .timeout(WEBHOOK_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn send_cleanup_webhook(&self, stream_key: &str, stream_id: Uuid, success: bool) {
        let payload = RecordingComplete {
            stream_key: stream_key.to_string(),
            stream_id,
            video_id: None,
            success,
        };
        let url = format!(
            "{}{}",
            self.stream_service_url,
            api::path::RECORDING_COMPLETE_WEBHOOK
        );
        match self
            .http
            .post(&url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(stream_key, success, "cleanup webhook delivered")
            }
            Ok(response) => {
                warn!(stream_key, status = %response.status(), "cleanup webhook rejected")
            }
            Err(err) => warn!(stream_key, %err, "cleanup webhook failed"),
        }
    }

    /// Promotes the completed recording to a VOD asset through the vod
    /// service. When the owning stream cannot be resolved the import fails
    /// outright; importing under a placeholder owner would orphan the video.
    async fn trigger_vod_import(self: Arc<Self>, stream_id: Uuid, recording_id: Uuid) {
        let recording = match self.recordings.get(recording_id).await {
            Ok(Some(recording)) => recording,
            Ok(None) => {
                error!(%recording_id, "recording disappeared before import");
                return;
            }
            Err(err) => {
                error!(%recording_id, %err, "failed to load recording for import");
                return;
            }
        };
        if recording.status != status::recording::COMPLETED {
            warn!(%recording_id, status = recording.status, "recording not completed, skipping import");
            return;
        }

        let stream = match self.stream_info_by_id(stream_id).await {
            Ok(stream) => stream,
            Err(err) => {
                error!(%stream_id, %recording_id, %err, "cannot resolve stream owner, failing import");
                return;
            }
        };

        let title = if stream.title.is_empty() {
            format!(
                "Stream Recording {}",
                recording.started_at.format("%Y-%m-%d %H:%M")
            )
        } else {
            format!("Recording: {}", stream.title)
        };

        let request = api::request::ImportRecording {
            recording_id,
            title,
            description: "Automatically imported stream recording".to_string(),
            category: String::new(),
            tags: Vec::new(),
            visibility: Some(status::visibility::PUBLIC.to_string()),
        };
        let url = format!("{}{}", self.vod_service_url, api::path::VIDEOS_IMPORT_RECORDING);
        let response = self
            .http
            .post(&url)
            .timeout(IMPORT_TIMEOUT)
            .header(api::HEADER_USER_ID, stream.user_id.to_string())
            .header(api::HEADER_INTERNAL_API_KEY, &self.internal_api_key)
            .json(&request)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                error!(%recording_id, %err, "vod import request failed");
                return;
            }
        };
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%recording_id, %status, body, "vod import rejected");
            return;
        }

        match response.json::<api::response::ImportRecording>().await {
            Ok(imported) => {
                info!(%recording_id, video_id = %imported.video_id, "recording imported to vod");
                if let Err(err) = self
                    .recordings
                    .set_video_id(recording_id, imported.video_id)
                    .await
                {
                    warn!(%recording_id, %err, "failed to backlink video id");
                }
            }
            Err(err) => warn!(%recording_id, %err, "unparseable vod import response"),
        }
    }
}

/// Waits for the segment publisher to go quiet: polls the stream's
/// live-segment prefix every 500 ms and requires four consecutive identical
/// non-zero `.ts`/`.m3u8` counts (2 s of stability). Gives up after
/// `max_wait` and proceeds with the last observed count.
pub async fn wait_for_upload_quiescence(
    live_store: &AnyStore,
    stream_key: &str,
    max_wait: Duration,
) -> usize {
    let prefix = format!("live-segments/{stream_key}/");
    let deadline = Instant::now() + max_wait;
    let mut ticker = tokio::time::interval(QUIESCENCE_POLL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut last_count = 0usize;
    let mut stable_probes = 0u32;

    while Instant::now() < deadline {
        ticker.tick().await;

        let count = match tokio::time::timeout(LIST_TIMEOUT, live_store.list(&prefix)).await {
            Ok(Ok(objects)) => objects
                .iter()
                .filter(|obj| obj.key.ends_with(".ts") || obj.key.ends_with(".m3u8"))
                .count(),
            Ok(Err(err)) => {
                warn!(prefix, %err, "listing live segments failed");
                continue;
            }
            Err(_) => {
                warn!(prefix, "listing live segments timed out");
                continue;
            }
        };

        if count == last_count && count > 0 {
            stable_probes += 1;
            debug!(prefix, count, stable_probes, "upload stability probe");
            if stable_probes >= QUIESCENCE_STABLE_PROBES {
                info!(prefix, count, "segment upload quiesced");
                return count;
            }
        } else {
            if count != last_count {
                debug!(prefix, last_count, count, "file count changed");
            }
            stable_probes = 0;
            last_count = count;
        }
    }

    warn!(prefix, last_count, "timed out waiting for upload quiescence");
    last_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use storage::FsStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn quiescence_returns_once_counts_stabilize() {
        let tmp = TempDir::new().unwrap();
        let store = AnyStore::Fs(FsStore::new(tmp.path(), "live-streams"));
        store.ensure_bucket().await.unwrap();
        for n in 0..4 {
            store
                .put(
                    &format!("live-segments/k/720p/segment_{n:03}.ts"),
                    Bytes::from_static(b"x"),
                    "video/mp2t",
                )
                .await
                .unwrap();
        }
        store
            .put(
                "live-segments/k/720p/playlist.m3u8",
                Bytes::from_static(b"#"),
                "application/vnd.apple.mpegurl",
            )
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let count =
            wait_for_upload_quiescence(&store, "k", Duration::from_secs(15)).await;
        assert_eq!(count, 5);
        // Four stable probes at 500 ms spacing: noticeably under the cap.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn quiescence_falls_through_at_cap_when_nothing_uploaded() {
        let tmp = TempDir::new().unwrap();
        let store = AnyStore::Fs(FsStore::new(tmp.path(), "live-streams"));
        store.ensure_bucket().await.unwrap();

        let started = std::time::Instant::now();
        let count = wait_for_upload_quiescence(&store, "k", Duration::from_secs(2)).await;
        assert_eq!(count, 0);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
