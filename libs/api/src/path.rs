pub const HEALTH: &str = "/health";

pub const STREAMS: &str = "/streams";
pub const STREAMS_LIVE: &str = "/streams/live";
pub const STREAMS_USER: &str = "/streams/user";

pub const STREAM_EVENT_WEBHOOK: &str = "/webhook/stream";
pub const RECORDING_COMPLETE_WEBHOOK: &str = "/webhooks/recording-complete";

pub const VIDEOS: &str = "/videos";
pub const VIDEOS_IMPORT_RECORDING: &str = "/videos/import-recording";

pub fn stream(id: &str) -> String {
    format!("/streams/{id}")
}

pub fn stream_by_key(key: &str) -> String {
    format!("/streams/by-key/{key}")
}

pub fn recording(id: &str) -> String {
    format!("/recording/{id}")
}

pub fn video(id: &str) -> String {
    format!("/videos/{id}")
}

/// Public HLS master manifest for a live stream, served from the live bucket.
pub fn hls_master(public_base_url: &str, live_bucket: &str, stream_key: &str) -> String {
    format!("{public_base_url}/{live_bucket}/live-segments/{stream_key}/master.m3u8")
}

/// SRT publish URL handed to broadcasters on stream creation.
pub fn srt_publish(srt_addr: &str, stream_key: &str) -> String {
    format!("srt://{srt_addr}?streamid={stream_key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_and_playback_urls() {
        assert_eq!(
            srt_publish("127.0.0.1:6000", "deadbeef"),
            "srt://127.0.0.1:6000?streamid=deadbeef"
        );
        assert_eq!(
            hls_master("http://localhost:9000", "live-streams", "deadbeef"),
            "http://localhost:9000/live-streams/live-segments/deadbeef/master.m3u8"
        );
    }
}
