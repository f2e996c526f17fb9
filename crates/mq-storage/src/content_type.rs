//! Content types for uploaded artifacts.

use std::path::Path;

/// Content type for a file, by extension.
pub fn for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("mp4") => "video/mp4",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_types() {
        assert_eq!(for_path(Path::new("a_master.m3u8")), "application/vnd.apple.mpegurl");
        assert_eq!(for_path(Path::new("a_720p_001.ts")), "video/mp2t");
    }

    #[test]
    fn test_image_types() {
        assert_eq!(for_path(Path::new("pic_processed.JPG")), "image/jpeg");
        assert_eq!(for_path(Path::new("pic.webp")), "image/webp");
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(for_path(Path::new("file.bin")), "application/octet-stream");
        assert_eq!(for_path(Path::new("noext")), "application/octet-stream");
    }
}
