use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use db::StreamRepo;
use storage::AnyStore;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub mod profiles;
pub mod publisher;
mod thumbnail;

use publisher::SegmentPublisher;

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("failed to spawn encoder: {0}")]
    Spawn(std::io::Error),
    #[error("encoder exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Drives one external-encoder session: pipes the ingest byte stream into
/// ffmpeg, which writes the ABR rendition tree onto local scratch, while the
/// segment publisher and thumbnail tasks run alongside.
pub struct Transcoder {
    scratch_dir: PathBuf,
    store: Arc<AnyStore>,
    streams: StreamRepo,
}

impl Transcoder {
    pub fn new(scratch_dir: &str, store: Arc<AnyStore>, streams: StreamRepo) -> Self {
        Self {
            scratch_dir: PathBuf::from(scratch_dir),
            store,
            streams,
        }
    }

    pub fn output_dir(&self, stream_key: &str) -> PathBuf {
        self.scratch_dir.join(stream_key)
    }

    /// Runs until the encoder exits. The encoder exits on input EOF
    /// (broadcaster disconnect) or when `cancel` fires and the child is
    /// killed. Returns only after the publisher has drained, so every closed
    /// segment is in the live bucket when this returns.
    ///
    /// A non-zero encoder exit is terminal; reconnecting is the
    /// broadcaster's retry.
    pub async fn run<R>(
        &self,
        input: R,
        stream: &db::Stream,
        thumbnail_url: String,
        cancel: CancellationToken,
    ) -> Result<(), TranscodeError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let stream_key = stream.stream_key.clone();
        let output_dir = self.output_dir(&stream_key);
        for profile in &profiles::LADDER {
            tokio::fs::create_dir_all(output_dir.join(profile.name)).await?;
        }

        let publisher = SegmentPublisher::new(self.store.clone(), &stream_key, &output_dir);
        let publisher_stop = CancellationToken::new();
        let publisher_task = tokio::spawn(publisher.clone().run(publisher_stop.clone()));

        let thumb_cancel = cancel.child_token();
        let thumb_task = tokio::spawn(thumbnail::capture_after_delay(
            output_dir.clone(),
            publisher.clone(),
            self.streams.clone(),
            stream.id,
            thumbnail_url,
            thumb_cancel.clone(),
        ));

        let args = profiles::build_abr_args(&profiles::LADDER, &output_dir);
        info!(stream_key, qualities = ?profiles::quality_names(), "starting abr transcode");

        let spawn_result = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawn_result {
            Ok(child) => child,
            Err(err) => {
                publisher_stop.cancel();
                let _ = publisher_task.await;
                thumb_cancel.cancel();
                let _ = thumb_task.await;
                return Err(TranscodeError::Spawn(err));
            }
        };

        let stdin = child.stdin.take();
        let feed_task = tokio::spawn(async move {
            let Some(mut stdin) = stdin else { return };
            let mut input = input;
            // EOF on disconnect closes stdin and lets the encoder flush.
            let _ = tokio::io::copy(&mut input, &mut stdin).await;
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                debug!(stream_key, "session cancelled, stopping encoder");
                let _ = child.start_kill();
                child.wait().await?
            }
        };
        feed_task.abort();
        thumb_cancel.cancel();

        // Final drain: everything the encoder closed must reach the bucket
        // before the caller reports the stream stopped.
        publisher_stop.cancel();
        let _ = publisher_task.await;
        let _ = thumb_task.await;

        if status.success() {
            info!(stream_key, "abr transcode completed");
            Ok(())
        } else {
            Err(TranscodeError::Failed(status))
        }
    }
}
