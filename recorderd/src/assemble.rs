use std::path::{Path, PathBuf};

use storage::{AnyStore, Store};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Rendition download priority when reconstructing the canonical MP4:
/// highest quality that produced at least one segment wins.
pub const QUALITY_PRIORITY: [&str; 4] = ["1080p", "720p", "480p", "360p"];

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("no segments found in any quality for stream {0}")]
    NoSegments(String),
    #[error("storage: {0}")]
    Storage(#[from] storage::StoreError),
    #[error("encoder binary not found: {0}")]
    NotFound(std::io::Error),
    #[error("encoder execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// The sequence number the encoder assigned to a segment file
/// (`segment_017.ts` → 17).
pub fn segment_number(file_name: &str) -> u32 {
    file_name
        .strip_prefix("segment_")
        .and_then(|rest| rest.strip_suffix(".ts"))
        .and_then(|num| num.parse().ok())
        .unwrap_or(0)
}

fn file_name_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Downloads every `.ts` segment of the best available rendition into
/// `work_dir`, ordered by encoder sequence number. Returns the local paths
/// and the selected quality.
pub async fn download_single_quality(
    live_store: &AnyStore,
    stream_key: &str,
    work_dir: &Path,
) -> Result<(Vec<PathBuf>, &'static str), AssembleError> {
    for quality in QUALITY_PRIORITY {
        let prefix = format!("live-segments/{stream_key}/{quality}/");
        debug!(prefix, "checking for segments");

        let mut keys: Vec<String> = live_store
            .list(&prefix)
            .await?
            .into_iter()
            .map(|obj| obj.key)
            .filter(|key| key.ends_with(".ts"))
            .collect();
        if keys.is_empty() {
            debug!(quality, "no segments in this quality, trying next");
            continue;
        }
        keys.sort_by_key(|key| segment_number(file_name_of(key)));

        let mut files = Vec::with_capacity(keys.len());
        for key in &keys {
            let local = work_dir.join(file_name_of(key));
            live_store.download_to(key, &local).await?;
            files.push(local);
        }
        info!(count = files.len(), quality, stream_key, "downloaded segments");
        return Ok((files, quality));
    }
    Err(AssembleError::NoSegments(stream_key.to_string()))
}

/// Writes the encoder concat manifest: one `file '...'` line per segment in
/// playback order.
pub async fn write_concat_manifest(
    segments: &[PathBuf],
    manifest_path: &Path,
) -> Result<(), AssembleError> {
    let mut file = tokio::fs::File::create(manifest_path).await?;
    for segment in segments {
        file.write_all(format!("file '{}'\n", segment.display()).as_bytes())
            .await?;
    }
    file.flush().await?;
    Ok(())
}

/// Stream-copies the ordered transport-stream segments into one MP4.
/// `aac_adtstoasc` repackages ADTS audio for MP4; `+faststart` moves the
/// moov atom up front for progressive playback.
pub async fn concat_segments(manifest: &Path, output: &Path) -> Result<(), AssembleError> {
    let manifest = manifest.to_string_lossy();
    let output = output.to_string_lossy();
    run_ffmpeg(&[
        "-hide_banner",
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        &manifest,
        "-c",
        "copy",
        "-bsf:a",
        "aac_adtstoasc",
        "-movflags",
        "+faststart",
        "-y",
        &output,
    ])
    .await
}

/// Scene-aware thumbnail: let the encoder pick the most representative of
/// the first 300 frames, scaled into 1920x1080.
pub async fn generate_thumbnail(video: &Path, thumbnail: &Path) -> Result<(), AssembleError> {
    let video = video.to_string_lossy();
    let thumbnail = thumbnail.to_string_lossy();
    run_ffmpeg(&[
        "-hide_banner",
        "-i",
        &video,
        "-vf",
        "thumbnail=300,scale=1920:1080:force_original_aspect_ratio=decrease",
        "-frames:v",
        "1",
        "-q:v",
        "2",
        "-y",
        &thumbnail,
    ])
    .await
}

/// Fallback thumbnail: plain frame grab at t=1s.
pub async fn generate_thumbnail_simple(video: &Path, thumbnail: &Path) -> Result<(), AssembleError> {
    let video = video.to_string_lossy();
    let thumbnail = thumbnail.to_string_lossy();
    run_ffmpeg(&[
        "-hide_banner",
        "-ss",
        "00:00:01",
        "-i",
        &video,
        "-vframes",
        "1",
        "-q:v",
        "2",
        "-vf",
        "scale=1920:1080:force_original_aspect_ratio=decrease",
        "-y",
        &thumbnail,
    ])
    .await
}

/// Media duration in whole seconds via ffprobe; 0 when probing fails.
pub async fn probe_duration(path: &Path) -> i32 {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await;
    match output {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<f64>()
            .map(|secs| secs as i32)
            .unwrap_or(0),
        Ok(output) => {
            warn!(
                path = %path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "ffprobe failed"
            );
            0
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "ffprobe not available");
            0
        }
    }
}

async fn run_ffmpeg(args: &[&str]) -> Result<(), AssembleError> {
    debug!(?args, "running ffmpeg");
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .map_err(AssembleError::NotFound)?;
    if !output.status.success() {
        return Err(AssembleError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::FsStore;
    use tempfile::TempDir;

    #[test]
    fn segment_numbers_parse_and_default() {
        assert_eq!(segment_number("segment_000.ts"), 0);
        assert_eq!(segment_number("segment_017.ts"), 17);
        assert_eq!(segment_number("segment_123.ts"), 123);
        assert_eq!(segment_number("garbage.ts"), 0);
    }

    #[test]
    fn priority_is_high_to_low() {
        assert_eq!(QUALITY_PRIORITY, ["1080p", "720p", "480p", "360p"]);
    }

    #[tokio::test]
    async fn download_picks_first_quality_with_segments() {
        let tmp = TempDir::new().unwrap();
        let store = AnyStore::Fs(FsStore::new(tmp.path().join("buckets"), "live-streams"));
        store.ensure_bucket().await.unwrap();

        // 1080p is empty; 720p has out-of-order segments.
        for n in [2u32, 0, 1] {
            store
                .put(
                    &format!("live-segments/k/720p/segment_{n:03}.ts"),
                    bytes::Bytes::from(format!("seg-{n}")),
                    "video/mp2t",
                )
                .await
                .unwrap();
        }
        store
            .put(
                "live-segments/k/720p/playlist.m3u8",
                bytes::Bytes::from_static(b"#EXTM3U"),
                "application/vnd.apple.mpegurl",
            )
            .await
            .unwrap();

        let work = tmp.path().join("work");
        let (files, quality) = download_single_quality(&store, "k", &work).await.unwrap();

        assert_eq!(quality, "720p");
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["segment_000.ts", "segment_001.ts", "segment_002.ts"]
        );
        for file in &files {
            assert!(file.exists());
        }
    }

    #[tokio::test]
    async fn download_fails_when_no_quality_has_segments() {
        let tmp = TempDir::new().unwrap();
        let store = AnyStore::Fs(FsStore::new(tmp.path().join("buckets"), "live-streams"));
        store.ensure_bucket().await.unwrap();

        let result = download_single_quality(&store, "k", &tmp.path().join("work")).await;
        assert!(matches!(result, Err(AssembleError::NoSegments(_))));
    }

    #[tokio::test]
    async fn concat_manifest_lists_segments_in_order() {
        let tmp = TempDir::new().unwrap();
        let segments = vec![
            tmp.path().join("segment_000.ts"),
            tmp.path().join("segment_001.ts"),
        ];
        let manifest = tmp.path().join("concat.txt");
        write_concat_manifest(&segments, &manifest).await.unwrap();

        let contents = tokio::fs::read_to_string(&manifest).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("file '"));
        assert!(lines[0].contains("segment_000.ts"));
        assert!(lines[1].contains("segment_001.ts"));
    }
}
