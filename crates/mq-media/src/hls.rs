//! Canned commands for video outputs.

use std::path::Path;

use mq_models::Rendition;

use crate::command::FfmpegCommand;
use crate::naming;

/// Timestamp the video thumbnail is taken at.
pub const THUMBNAIL_OFFSET: &str = "00:00:01";

/// Encode one HLS rendition: `<stem>_<label>.m3u8` plus its segments.
pub fn rendition_command(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    filename: &str,
    rendition: &Rendition,
) -> FfmpegCommand {
    let stem = naming::stem(filename);
    let out_dir = out_dir.as_ref();
    let playlist = out_dir.join(format!("{}_{}.m3u8", stem, rendition.label));
    let segments = out_dir.join(format!("{}_{}_%03d.ts", stem, rendition.label));

    FfmpegCommand::new(input, playlist)
        .args(["-hide_banner", "-y"])
        .video_filter(format!("scale=w=-2:h={}", rendition.height))
        .args(["-c:v", "h264", "-profile:v", "main", "-crf", "20"])
        .args(["-g", "48", "-keyint_min", "48"])
        .args(["-b:v", rendition.video_bitrate])
        .args(["-maxrate", rendition.maxrate])
        .args(["-bufsize", rendition.bufsize])
        .args(["-c:a", "aac", "-ar", "48000"])
        .args(["-b:a", rendition.audio_bitrate])
        .args(["-f", "hls", "-hls_time", "4", "-hls_playlist_type", "vod"])
        .arg("-hls_segment_filename")
        .arg(segments.to_string_lossy())
}

/// Grab a 320x180 JPEG one second in: `<stem>_thumbnail.jpg`.
pub fn video_thumbnail_command(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    filename: &str,
) -> FfmpegCommand {
    let stem = naming::stem(filename);
    let output = out_dir.as_ref().join(format!("{}_thumbnail.jpg", stem));

    FfmpegCommand::new(input, output)
        .args(["-ss", THUMBNAIL_OFFSET])
        .args(["-vframes", "1"])
        .video_filter("scale=320:180")
        .args(["-q:v", "2", "-y"])
}
