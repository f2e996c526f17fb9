//! The adaptive-streaming rendition ladder.

/// One encoded variant of a video at a fixed resolution and bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendition {
    /// Label used in output filenames and the master playlist ("720p")
    pub label: &'static str,
    /// Target vertical resolution in pixels
    pub height: u32,
    /// Video bitrate ("2800k")
    pub video_bitrate: &'static str,
    /// Encoder rate ceiling
    pub maxrate: &'static str,
    /// Encoder rate-control buffer
    pub bufsize: &'static str,
    /// Audio bitrate ("128k")
    pub audio_bitrate: &'static str,
}

/// The fixed ladder, bottom rung first.
pub const RENDITION_LADDER: [Rendition; 4] = [
    Rendition {
        label: "480p",
        height: 480,
        video_bitrate: "800k",
        maxrate: "856k",
        bufsize: "1200k",
        audio_bitrate: "96k",
    },
    Rendition {
        label: "720p",
        height: 720,
        video_bitrate: "2800k",
        maxrate: "2996k",
        bufsize: "4200k",
        audio_bitrate: "128k",
    },
    Rendition {
        label: "1080p",
        height: 1080,
        video_bitrate: "5000k",
        maxrate: "5350k",
        bufsize: "7500k",
        audio_bitrate: "192k",
    },
    Rendition {
        label: "2160p",
        height: 2160,
        video_bitrate: "15000k",
        maxrate: "16050k",
        bufsize: "22500k",
        audio_bitrate: "320k",
    },
];

/// Select the rungs to encode for a source of the given height.
///
/// Keeps renditions whose height does not exceed the source, in ladder
/// order. Sources below the bottom rung still get that rung.
pub fn select_renditions(source_height: u32) -> Vec<&'static Rendition> {
    let selected: Vec<_> = RENDITION_LADDER
        .iter()
        .filter(|r| r.height <= source_height)
        .collect();

    if selected.is_empty() {
        vec![&RENDITION_LADDER[0]]
    } else {
        selected
    }
}

impl Rendition {
    /// Combined audio + video bandwidth in bits per second, as advertised
    /// in the master playlist.
    pub fn bandwidth(&self) -> u64 {
        (parse_kbits(self.video_bitrate) + parse_kbits(self.audio_bitrate)) * 1000
    }

    /// Display width at 16:9 for this rung.
    pub fn width(&self) -> u32 {
        (self.height as f64 * 16.0 / 9.0).round() as u32
    }

    /// RESOLUTION attribute value ("1280x720").
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width(), self.height)
    }
}

/// Parse a bitrate like "2800k" into kilobits.
fn parse_kbits(bitrate: &str) -> u64 {
    bitrate
        .trim_end_matches(['k', 'K'])
        .parse()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_below_bottom_rung() {
        let r = select_renditions(300);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].label, "480p");
    }

    #[test]
    fn test_selection_at_1080() {
        let labels: Vec<_> = select_renditions(1080).iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["480p", "720p", "1080p"]);
    }

    #[test]
    fn test_selection_at_720() {
        let labels: Vec<_> = select_renditions(720).iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["480p", "720p"]);
    }

    #[test]
    fn test_selection_at_2160() {
        assert_eq!(select_renditions(2160).len(), 4);
        assert_eq!(select_renditions(4320).len(), 4);
    }

    #[test]
    fn test_bandwidth_720p() {
        let r = &RENDITION_LADDER[1];
        assert_eq!(r.bandwidth(), 2_928_000);
    }

    #[test]
    fn test_width_rounding() {
        assert_eq!(RENDITION_LADDER[0].width(), 853);
        assert_eq!(RENDITION_LADDER[1].width(), 1280);
        assert_eq!(RENDITION_LADDER[2].width(), 1920);
        assert_eq!(RENDITION_LADDER[3].width(), 3840);
    }

    #[test]
    fn test_resolution_attribute() {
        assert_eq!(RENDITION_LADDER[1].resolution(), "1280x720");
    }
}
