use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use db::StreamRepo;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::transcode::publisher::{list_segments, SegmentPublisher};
use crate::transcode::profiles;

const CAPTURE_DELAY: Duration = Duration::from_secs(10);
const SEGMENT_POLL_ATTEMPTS: u32 = 20;

/// Grabs one frame roughly ten seconds into the broadcast, uploads it next to
/// the live segments and persists the public URL on the stream row.
pub async fn capture_after_delay(
    output_dir: PathBuf,
    publisher: Arc<SegmentPublisher>,
    streams: StreamRepo,
    stream_id: Uuid,
    thumbnail_url: String,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {
            debug!(%stream_id, "stream ended before thumbnail capture");
            return;
        }
        _ = tokio::time::sleep(CAPTURE_DELAY) => {}
    }

    // The encoder may still be warming up; wait for the first closed segment
    // in any rendition.
    let mut first_segment = None;
    for _ in 0..SEGMENT_POLL_ATTEMPTS {
        for quality in profiles::quality_names() {
            if let Some(segment) = list_segments(&output_dir.join(quality)).await.into_iter().next()
            {
                first_segment = Some(segment);
                break;
            }
        }
        if first_segment.is_some() {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }

    let Some(segment) = first_segment else {
        warn!(%stream_id, "no segments found for thumbnail capture");
        return;
    };

    let thumbnail_path = output_dir.join("thumbnail.jpg");
    if let Err(err) = extract_frame(&segment, &thumbnail_path).await {
        warn!(%stream_id, %err, "thumbnail extraction failed");
        return;
    }

    match publisher.upload_thumbnail(&thumbnail_path).await {
        Ok(key) => info!(%stream_id, key, "thumbnail uploaded"),
        Err(err) => {
            warn!(%stream_id, %err, "thumbnail upload failed");
            return;
        }
    }

    if let Err(err) = streams.set_thumbnail(stream_id, &thumbnail_url).await {
        warn!(%stream_id, %err, "failed to persist thumbnail url");
    }
}

/// One frame at t=1s of the given segment, scaled to width 640.
async fn extract_frame(segment: &Path, out: &Path) -> anyhow::Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-hide_banner")
        .arg("-i")
        .arg(segment)
        .args(["-ss", "00:00:01", "-vframes", "1", "-vf", "scale=640:-1", "-q:v", "2", "-y"])
        .arg(out)
        .output()
        .await?;
    if !output.status.success() {
        anyhow::bail!(
            "ffmpeg thumbnail exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}
