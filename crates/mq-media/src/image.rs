//! Canned commands for image outputs.

use std::path::Path;

use crate::command::FfmpegCommand;
use crate::naming;

/// Downscale to fit 1920x1080, preserving aspect: `<stem>_processed<ext>`.
pub fn downscale_command(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    filename: &str,
) -> FfmpegCommand {
    let output = out_dir.as_ref().join(format!(
        "{}_processed{}",
        naming::stem(filename),
        naming::extension(filename)
    ));

    FfmpegCommand::new(input, output)
        .video_filter("scale=1920:1080:force_original_aspect_ratio=decrease")
        .args(["-q:v", "2", "-y"])
}

/// Small blurred preview: `<stem>_blurred_thumbnail.jpg`.
pub fn blurred_thumbnail_command(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    filename: &str,
) -> FfmpegCommand {
    let output = out_dir
        .as_ref()
        .join(format!("{}_blurred_thumbnail.jpg", naming::stem(filename)));

    FfmpegCommand::new(input, output)
        .video_filter("scale=320:240:force_original_aspect_ratio=decrease,boxblur=10:1")
        .args(["-q:v", "5", "-y"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downscale_argv() {
        let cmd = downscale_command("in/pic.jpg", "out", "pic.jpg");
        let args = cmd.build_args();
        let expected: Vec<String> = [
            "-i",
            "in/pic.jpg",
            "-vf",
            "scale=1920:1080:force_original_aspect_ratio=decrease",
            "-q:v",
            "2",
            "-y",
            "out/pic_processed.jpg",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_blurred_thumbnail_argv() {
        let cmd = blurred_thumbnail_command("in/pic.png", "out", "pic.png");
        let args = cmd.build_args();
        let expected: Vec<String> = [
            "-i",
            "in/pic.png",
            "-vf",
            "scale=320:240:force_original_aspect_ratio=decrease,boxblur=10:1",
            "-q:v",
            "5",
            "-y",
            "out/pic_blurred_thumbnail.jpg",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_processed_keeps_source_extension() {
        let cmd = downscale_command("in/pic.webp", "out", "pic.webp");
        assert_eq!(
            cmd.output(),
            Path::new("out/pic_processed.webp")
        );
    }
}
