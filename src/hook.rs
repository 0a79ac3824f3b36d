use std::time::Duration;

use api::event::{StreamEvent, StreamEventKind};
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, warn};

/// Sends stream lifecycle webhooks to the recording service.
///
/// Delivery is one-shot fire-and-forget: the ingest path never blocks or
/// rolls back on webhook failure, and the recording service's periodic
/// live-stream poll recovers from lost events.
#[derive(Clone)]
pub struct StreamEventHook {
    url: String,
    client: Client,
}

impl StreamEventHook {
    pub fn new(recording_service_url: &str) -> Self {
        Self {
            url: format!(
                "{}{}",
                recording_service_url.trim_end_matches('/'),
                api::path::STREAM_EVENT_WEBHOOK
            ),
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
        }
    }

    pub fn notify(&self, stream_key: &str, kind: StreamEventKind, hls_url: &str) {
        let hook = self.clone();
        let event = StreamEvent {
            stream_key: stream_key.to_string(),
            event: kind,
            hls_url: hls_url.to_string(),
            timestamp: Utc::now().timestamp(),
        };
        tokio::spawn(async move {
            if let Err(err) = hook.send(&event).await {
                warn!(url = hook.url, ?event.event, stream_key = event.stream_key, %err, "stream event webhook failed");
            }
        });
    }

    async fn send(&self, event: &StreamEvent) -> anyhow::Result<()> {
        let response = self.client.post(&self.url).json(event).send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(url = self.url, ?event.event, stream_key = event.stream_key, "stream event webhook delivered");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("webhook returned {status}: {body}")
        }
    }
}
