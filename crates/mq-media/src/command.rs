//! ffmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{EncodeProgress, StderrParser};

/// How many trailing stderr lines to keep for failure reports.
const STDERR_TAIL_LINES: usize = 32;

/// An ffmpeg invocation: `-i <input> <args…> <output>`.
///
/// Arguments are emitted in the order they were added, so each canned
/// command controls its exact argv.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a video filter chain.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// The output path this command will produce.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Assemble the full argument list.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + 3);
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Runner for ffmpeg commands with progress, cancellation and timeout.
#[derive(Default)]
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel cooperatively when the channel flips to true.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Kill the encode after a wall-clock limit.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run a command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run a command, reporting live progress parsed from stderr.
    ///
    /// The callback fires once per ffmpeg status line, and only for inputs
    /// whose duration was announced.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, on_progress: F) -> MediaResult<()>
    where
        F: Fn(EncodeProgress) + Send + 'static,
    {
        which::which("ffmpeg").map_err(|e| MediaError::FfmpegUnavailable(e.to_string()))?;

        let args = cmd.build_args();
        debug!("Running ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::FfmpegUnavailable(e.to_string()))?;

        let stderr = child.stderr.take().expect("stderr not captured");

        // ffmpeg separates status updates with carriage returns, so split
        // on those and handle embedded newlines per segment.
        let tail_handle = tokio::spawn(async move {
            let mut parser = StderrParser::new();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut segments = BufReader::new(stderr).split(b'\r');

            while let Ok(Some(segment)) = segments.next_segment().await {
                let text = String::from_utf8_lossy(&segment);
                for line in text.split('\n') {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.to_string());

                    if let Some(progress) = parser.observe(line) {
                        on_progress(progress);
                    }
                }
            }

            tail
        });

        let status = self.wait_for_completion(&mut child).await;
        let tail = tail_handle.await.unwrap_or_default();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(MediaError::FfmpegFailed {
                exit_code: status.code(),
                stderr_tail: tail.into_iter().collect::<Vec<_>>().join("\n"),
            }),
            Err(e) => Err(e),
        }
    }

    /// Wait for the child, honouring cancellation and the timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<std::process::ExitStatus> {
        let mut cancel_rx = self.cancel_rx.clone();

        let waited = async {
            tokio::select! {
                status = child.wait() => Some(status),
                _ = cancel_requested(&mut cancel_rx) => None,
            }
        };

        let outcome = match self.timeout_secs {
            Some(limit) => {
                match tokio::time::timeout(std::time::Duration::from_secs(limit), waited).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("ffmpeg timed out after {}s, killing process", limit);
                        let _ = child.kill().await;
                        return Err(MediaError::Timeout(limit));
                    }
                }
            }
            None => waited.await,
        };

        match outcome {
            Some(status) => Ok(status?),
            None => {
                info!("ffmpeg cancelled, killing process");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
        }
    }
}

/// Resolve when cancellation is requested; never resolves without a channel.
async fn cancel_requested(cancel_rx: &mut Option<watch::Receiver<bool>>) {
    match cancel_rx {
        Some(rx) => {
            loop {
                if *rx.borrow() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Sender dropped without cancelling.
                    std::future::pending::<()>().await;
                }
            }
        }
        None => std::future::pending().await,
    }
}

/// Check that ffmpeg is on PATH.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|e| MediaError::FfmpegUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_order_preserved() {
        let cmd = FfmpegCommand::new("in.mp4", "out/out.m3u8")
            .args(["-hide_banner", "-y"])
            .video_filter("scale=w=-2:h=720")
            .args(["-c:v", "h264"]);

        let args = cmd.build_args();
        assert_eq!(args[0], "-i");
        assert_eq!(args[1], "in.mp4");
        assert_eq!(args[2], "-hide_banner");
        assert_eq!(args[3], "-y");
        assert_eq!(args[4], "-vf");
        assert_eq!(args[5], "scale=w=-2:h=720");
        assert_eq!(args.last().unwrap(), "out/out.m3u8");
    }

    #[tokio::test]
    async fn test_spawn_failure_reports_unavailable() {
        // Point PATH at nothing so the preflight lookup fails.
        let original = std::env::var_os("PATH");
        std::env::set_var("PATH", "/nonexistent");

        let result = FfmpegRunner::new()
            .run(&FfmpegCommand::new("in.mp4", "out.mp4"))
            .await;

        match original {
            Some(path) => std::env::set_var("PATH", path),
            None => std::env::remove_var("PATH"),
        }

        assert!(matches!(result, Err(MediaError::FfmpegUnavailable(_))));
    }
}
