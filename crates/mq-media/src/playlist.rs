//! Master playlist composition for adaptive streaming.

use std::path::{Path, PathBuf};

use mq_models::Rendition;

use crate::error::MediaResult;
use crate::naming;

/// Compose the master playlist referencing each rendition's own playlist.
pub fn master_playlist(stem: &str, renditions: &[&Rendition]) -> String {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n\n");

    for rendition in renditions {
        playlist.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={},NAME=\"{}\"\n{}_{}.m3u8\n\n",
            rendition.bandwidth(),
            rendition.resolution(),
            rendition.label,
            stem,
            rendition.label,
        ));
    }

    playlist
}

/// Write `<stem>_master.m3u8` next to the rendition playlists.
pub async fn write_master_playlist(
    out_dir: impl AsRef<Path>,
    filename: &str,
    renditions: &[&Rendition],
) -> MediaResult<PathBuf> {
    let stem = naming::stem(filename);
    let path = out_dir.as_ref().join(format!("{}_master.m3u8", stem));
    tokio::fs::write(&path, master_playlist(stem, renditions)).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mq_models::{select_renditions, RENDITION_LADDER};

    #[test]
    fn test_header_and_entry_format() {
        let renditions = vec![&RENDITION_LADDER[1]];
        let playlist = master_playlist("a", &renditions);

        assert!(playlist.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n\n"));
        assert!(playlist.contains(
            "#EXT-X-STREAM-INF:BANDWIDTH=2928000,RESOLUTION=1280x720,NAME=\"720p\"\na_720p.m3u8\n\n"
        ));
    }

    #[test]
    fn test_low_source_gets_single_entry() {
        let renditions = select_renditions(300);
        let playlist = master_playlist("clip", &renditions);
        assert_eq!(playlist.matches("#EXT-X-STREAM-INF").count(), 1);
        assert!(playlist.contains("clip_480p.m3u8"));
    }

    #[test]
    fn test_entries_follow_ladder_order() {
        let renditions = select_renditions(1080);
        let playlist = master_playlist("a", &renditions);
        let p480 = playlist.find("a_480p.m3u8").unwrap();
        let p720 = playlist.find("a_720p.m3u8").unwrap();
        let p1080 = playlist.find("a_1080p.m3u8").unwrap();
        assert!(p480 < p720 && p720 < p1080);
    }

    #[tokio::test]
    async fn test_write_master_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let renditions = select_renditions(720);

        let path = write_master_playlist(dir.path(), "a.mp4", &renditions)
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "a_master.m3u8");
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, master_playlist("a", &renditions));
    }
}
