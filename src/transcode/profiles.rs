use std::path::Path;

/// One rung of the adaptive bitrate ladder.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_bitrate: &'static str,
    pub max_rate: &'static str,
    pub buf_size: &'static str,
    pub audio_bitrate: &'static str,
}

/// Default ladder, highest quality first. Rendition selection priority in
/// the recording pipeline follows this order.
pub const LADDER: [Profile; 4] = [
    Profile {
        name: "1080p",
        width: 1920,
        height: 1080,
        video_bitrate: "5000k",
        max_rate: "5500k",
        buf_size: "11000k",
        audio_bitrate: "192k",
    },
    Profile {
        name: "720p",
        width: 1280,
        height: 720,
        video_bitrate: "2800k",
        max_rate: "3080k",
        buf_size: "5600k",
        audio_bitrate: "128k",
    },
    Profile {
        name: "480p",
        width: 854,
        height: 480,
        video_bitrate: "1400k",
        max_rate: "1540k",
        buf_size: "2800k",
        audio_bitrate: "128k",
    },
    Profile {
        name: "360p",
        width: 640,
        height: 360,
        video_bitrate: "800k",
        max_rate: "880k",
        buf_size: "1600k",
        audio_bitrate: "96k",
    },
];

/// Segment length in seconds.
pub const SEGMENT_SECONDS: u32 = 4;

pub fn quality_names() -> Vec<&'static str> {
    LADDER.iter().map(|p| p.name).collect()
}

/// Builds the encoder argument list for one live ABR transcode reading from
/// stdin and emitting per-rendition HLS event playlists plus a master
/// manifest under `output_dir`.
pub fn build_abr_args(profiles: &[Profile], output_dir: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-i".into(),
        "pipe:0".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-tune".into(),
        "zerolatency".into(),
        "-g".into(),
        "60".into(),
        "-keyint_min".into(),
        "60".into(),
        "-sc_threshold".into(),
        "0".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ];

    args.push("-filter_complex".into());
    args.push(split_scale_filter(profiles));

    let mut var_stream_map = Vec::with_capacity(profiles.len());
    for (i, profile) in profiles.iter().enumerate() {
        args.push("-map".into());
        args.push(format!("[v{i}out]"));
        args.push(format!("-c:v:{i}"));
        args.push("libx264".into());
        args.push(format!("-b:v:{i}"));
        args.push(profile.video_bitrate.into());
        args.push(format!("-maxrate:v:{i}"));
        args.push(profile.max_rate.into());
        args.push(format!("-bufsize:v:{i}"));
        args.push(profile.buf_size.into());

        args.push("-map".into());
        args.push("a:0".into());
        args.push(format!("-c:a:{i}"));
        args.push("aac".into());
        args.push(format!("-b:a:{i}"));
        args.push(profile.audio_bitrate.into());
        args.push("-ar".into());
        args.push("48000".into());
        args.push("-ac".into());
        args.push("2".into());

        var_stream_map.push(format!("v:{i},a:{i},name:{}", profile.name));
    }

    args.extend(
        [
            "-f",
            "hls",
            "-hls_time",
            "4",
            // 0 keeps every segment in the playlist for the whole broadcast.
            "-hls_list_size",
            "0",
            "-hls_flags",
            "independent_segments+program_date_time",
            "-hls_playlist_type",
            "event",
            "-hls_segment_type",
            "mpegts",
            "-master_pl_name",
            "master.m3u8",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push("-var_stream_map".into());
    args.push(var_stream_map.join(" "));
    args.push("-hls_segment_filename".into());
    args.push(
        output_dir
            .join("%v")
            .join("segment_%03d.ts")
            .to_string_lossy()
            .into_owned(),
    );
    args.push(
        output_dir
            .join("%v")
            .join("playlist.m3u8")
            .to_string_lossy()
            .into_owned(),
    );

    args
}

fn split_scale_filter(profiles: &[Profile]) -> String {
    if profiles.len() == 1 {
        let p = &profiles[0];
        return format!("[0:v]scale={}:{}[v0out]", p.width, p.height);
    }
    let mut filter = format!("[0:v]split={}", profiles.len());
    for i in 0..profiles.len() {
        filter.push_str(&format!("[v{i}]"));
    }
    filter.push(';');
    let scales: Vec<String> = profiles
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[v{i}]scale={}:{}[v{i}out]", p.width, p.height))
        .collect();
    filter.push_str(&scales.join(";"));
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn ladder_order_is_high_to_low() {
        assert_eq!(quality_names(), vec!["1080p", "720p", "480p", "360p"]);
        assert!(LADDER.windows(2).all(|w| w[0].height > w[1].height));
    }

    #[test]
    fn abr_args_map_every_profile() {
        let out = PathBuf::from("/scratch/key");
        let args = build_abr_args(&LADDER, &out);

        // One video map per rendition plus one audio map each.
        assert_eq!(args.iter().filter(|a| *a == "-map").count(), 8);

        let vsm_pos = args.iter().position(|a| a == "-var_stream_map").unwrap();
        assert_eq!(
            args[vsm_pos + 1],
            "v:0,a:0,name:1080p v:1,a:1,name:720p v:2,a:2,name:480p v:3,a:3,name:360p"
        );

        let filter_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        let filter = &args[filter_pos + 1];
        assert!(filter.starts_with("[0:v]split=4[v0][v1][v2][v3];"));
        assert!(filter.contains("[v0]scale=1920:1080[v0out]"));
        assert!(filter.contains("[v3]scale=640:360[v3out]"));

        assert!(args.contains(&"-hls_playlist_type".to_string()));
        assert!(args.contains(&"event".to_string()));
        assert!(args
            .iter()
            .any(|a| a.ends_with("segment_%03d.ts") && a.contains("%v")));
    }

    #[test]
    fn single_profile_skips_split() {
        let out = PathBuf::from("/scratch/key");
        let args = build_abr_args(&LADDER[..1], &out);
        let filter_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(args[filter_pos + 1], "[0:v]scale=1920:1080[v0out]");
    }
}
