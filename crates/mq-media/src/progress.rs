//! Progress extraction from ffmpeg's textual status output.
//!
//! ffmpeg prints the input duration once (`Duration: HH:MM:SS.ff`) and then
//! a status line per interval (`... time=HH:MM:SS.ff ...`). The parser fixes
//! the total from the first duration it sees and converts every later time
//! mark into a percentage. Inputs without a reported duration produce no
//! live progress.

use std::sync::OnceLock;

use regex::Regex;

/// One live progress reading from an encode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeProgress {
    /// Seconds of output produced so far
    pub current_seconds: f64,
    /// Total input duration in seconds
    pub total_seconds: f64,
    /// `current / total`, clamped to 100
    pub percentage: f64,
}

/// Stateful line parser for one ffmpeg invocation.
#[derive(Debug, Default)]
pub(crate) struct StderrParser {
    total_seconds: Option<f64>,
}

impl StderrParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed one stderr line; returns a reading when the line carries one.
    pub(crate) fn observe(&mut self, line: &str) -> Option<EncodeProgress> {
        if self.total_seconds.is_none() {
            if let Some(total) = parse_duration(line) {
                self.total_seconds = Some(total);
            }
            return None;
        }

        let total_seconds = self.total_seconds?;
        if total_seconds <= 0.0 {
            return None;
        }

        let current_seconds = parse_time(line)?;
        let percentage = (current_seconds / total_seconds * 100.0).min(100.0);
        Some(EncodeProgress {
            current_seconds,
            total_seconds,
            percentage,
        })
    }
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap())
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\btime=(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap())
}

/// Parse the input duration from an ffmpeg metadata line.
fn parse_duration(line: &str) -> Option<f64> {
    clock_to_seconds(duration_re().captures(line)?)
}

/// Parse the current output time from an ffmpeg status line.
fn parse_time(line: &str) -> Option<f64> {
    clock_to_seconds(time_re().captures(line)?)
}

fn clock_to_seconds(caps: regex::Captures<'_>) -> Option<f64> {
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_fixed_once() {
        let mut parser = StderrParser::new();
        assert!(parser
            .observe("  Duration: 00:02:30.50, start: 0.000000, bitrate: 1203 kb/s")
            .is_none());
        assert_eq!(parser.total_seconds, Some(150.5));

        // A later duration line (e.g. from a second input) does not reset it.
        parser.observe("  Duration: 01:00:00.00, start: 0.000000");
        assert_eq!(parser.total_seconds, Some(150.5));
    }

    #[test]
    fn test_time_tick_percentage() {
        let mut parser = StderrParser::new();
        parser.observe("  Duration: 00:02:30.50, start: 0.000000");

        let p = parser
            .observe("frame=  120 fps= 30 q=28.0 size=    512kB time=00:01:15.25 bitrate= 500.0kbits/s speed=1.2x")
            .unwrap();
        assert!((p.percentage - 50.0).abs() < 0.01);
        assert!((p.current_seconds - 75.25).abs() < 0.001);
    }

    #[test]
    fn test_no_duration_means_no_ticks() {
        let mut parser = StderrParser::new();
        assert!(parser
            .observe("frame=  120 fps= 30 time=00:01:15.25 bitrate= 500.0kbits/s")
            .is_none());
    }

    #[test]
    fn test_percentage_clamped() {
        let mut parser = StderrParser::new();
        parser.observe("  Duration: 00:00:10.00, start: 0.000000");
        let p = parser.observe("time=00:00:12.00 bitrate=N/A").unwrap();
        assert_eq!(p.percentage, 100.0);
    }

    #[test]
    fn test_out_time_not_mistaken_for_time() {
        let mut parser = StderrParser::new();
        parser.observe("  Duration: 00:00:10.00, start: 0.000000");
        assert!(parser.observe("out_time=00:00:05.000000").is_none());
    }

    #[test]
    fn test_non_status_lines_ignored() {
        let mut parser = StderrParser::new();
        parser.observe("  Duration: 00:00:10.00, start: 0.000000");
        assert!(parser.observe("Stream #0:0: Video: h264, yuv420p").is_none());
        assert!(parser.observe("").is_none());
    }
}
