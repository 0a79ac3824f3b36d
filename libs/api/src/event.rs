use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle webhook sent by the ingest service to the recording service
/// when a broadcast starts or ends.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StreamEvent {
    pub stream_key: String,
    pub event: StreamEventKind,
    pub hls_url: String,
    pub timestamp: i64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamEventKind {
    Started,
    Stopped,
}

/// Webhook sent by the recording service back to the ingest service once a
/// broadcast has been finalized. `success = false` skips segment cleanup.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RecordingComplete {
    pub stream_key: String,
    pub stream_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<Uuid>,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_event_wire_shape() {
        let event = StreamEvent {
            stream_key: "abc123".to_string(),
            event: StreamEventKind::Started,
            hls_url: "http://localhost/live-streams/live-segments/abc123/master.m3u8".to_string(),
            timestamp: 1700000000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "started");
        assert_eq!(json["stream_key"], "abc123");

        let parsed: StreamEvent =
            serde_json::from_str(r#"{"stream_key":"k","event":"stopped","hls_url":"","timestamp":0}"#)
                .unwrap();
        assert_eq!(parsed.event, StreamEventKind::Stopped);
    }

    #[test]
    fn recording_complete_omits_missing_video_id() {
        let payload = RecordingComplete {
            stream_key: "k".to_string(),
            stream_id: Uuid::nil(),
            video_id: None,
            success: false,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("video_id").is_none());
    }
}
