/// Content type by file extension, covering the artifacts the pipeline
/// produces. Anything else is tagged as an opaque octet stream.
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("mp4") => "video/mp4",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(
            content_type_for("live-segments/k/master.m3u8"),
            "application/vnd.apple.mpegurl"
        );
        assert_eq!(
            content_type_for("live-segments/k/720p/segment_001.ts"),
            "video/mp2t"
        );
        assert_eq!(content_type_for("abc.mp4"), "video/mp4");
        assert_eq!(content_type_for("thumb.jpg"), "image/jpeg");
        assert_eq!(content_type_for("thumb.jpeg"), "image/jpeg");
    }

    #[test]
    fn unknown_extension_falls_back() {
        assert_eq!(content_type_for("data.bin"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
