use std::time::Duration;

use api::event::StreamEventKind;
use futures_util::StreamExt;
use srt_protocol::packet::{CoreRejectReason, RejectReason};
use srt_tokio::{ConnectionRequest, SrtListener};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::route::AppState;
use crate::transcode::Transcoder;

/// Accepts SRT publish connections for the lifetime of the service.
///
/// The listener loop only validates and hands off; each accepted connection
/// runs in its own task with a cancellation handle derived from the server's.
pub async fn serve(state: AppState, cancel: CancellationToken) -> anyhow::Result<()> {
    let (_listener, mut incoming) = SrtListener::builder()
        .latency(Duration::from_millis(state.config.srt.latency))
        .bind(state.config.srt.listen)
        .await?;
    info!(
        addr = %state.config.srt.listen,
        latency_ms = state.config.srt.latency,
        "srt listener up"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            request = incoming.incoming().next() => {
                let Some(request) = request else { break };
                let state = state.clone();
                let session_cancel = cancel.child_token();
                tokio::spawn(async move {
                    handle_publish(state, request, session_cancel).await;
                });
            }
        }
    }
    info!("srt listener shut down");
    Ok(())
}

/// One publish session: validate the stream key, flip the stream live, run
/// the transcoder over the connection's bytes, then flip it back offline.
async fn handle_publish(state: AppState, request: ConnectionRequest, cancel: CancellationToken) {
    let stream_key = request
        .stream_id()
        .map(|id| id.to_string())
        .unwrap_or_default();
    info!(stream_key, "incoming srt connection");

    // Unknown keys are rejected at the handshake; nothing was mutated.
    let stream = match state.streams.get_by_key(&stream_key).await {
        Ok(Some(stream)) => stream,
        Ok(None) => {
            warn!(stream_key, "rejecting srt connection: unknown stream key");
            let _ = request.reject(RejectReason::Core(CoreRejectReason::Peer)).await;
            return;
        }
        Err(err) => {
            error!(stream_key, %err, "stream key lookup failed");
            let _ = request.reject(RejectReason::Core(CoreRejectReason::Peer)).await;
            return;
        }
    };

    let socket = match request.accept(None).await {
        Ok(socket) => socket,
        Err(err) => {
            error!(stream_key, %err, "failed to accept srt connection");
            return;
        }
    };
    info!(stream_key, stream_id = %stream.id, "srt connection accepted");
    crate::metrics::SESSION.inc();

    let hls_url = api::path::hls_master(
        &state.config.public_base_url,
        &state.config.buckets.live,
        &stream_key,
    );

    if let Err(err) = state.streams.set_live(stream.id).await {
        error!(stream_key, %err, "failed to set stream live");
        crate::metrics::SESSION.dec();
        return;
    }
    if let Err(err) = state.streams.set_hls_url(stream.id, &hls_url).await {
        warn!(stream_key, %err, "failed to persist hls url");
    }
    state
        .stream_events
        .notify(&stream_key, StreamEventKind::Started, &hls_url);

    let reader = StreamReader::new(Box::pin(
        socket.map(|item| item.map(|(_instant, bytes)| bytes)),
    ));
    let transcoder = Transcoder::new(
        &state.config.transcode.scratch_dir,
        state.live_store.clone(),
        state.streams.clone(),
    );
    let thumbnail_url = format!(
        "{}/{}/live-segments/{}/thumbnail.jpg",
        state.config.public_base_url, state.config.buckets.live, stream_key
    );

    if let Err(err) = transcoder
        .run(reader, &stream, thumbnail_url.clone(), cancel)
        .await
    {
        error!(stream_key, %err, "transcode failed");
    }

    if let Err(err) = state.streams.set_offline(stream.id).await {
        error!(stream_key, %err, "failed to set stream offline");
    }
    if let Err(err) = state.streams.set_thumbnail(stream.id, &thumbnail_url).await {
        warn!(stream_key, %err, "failed to persist thumbnail url");
    }
    state
        .stream_events
        .notify(&stream_key, StreamEventKind::Stopped, &hls_url);
    crate::metrics::SESSION.dec();
    info!(stream_key, "stream ended");
}
