use async_trait::async_trait;
use log::{debug, error, warn};
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use super::Muxer;
use crate::app_config::AcquisitionConfig;
use crate::errors::{AcquireError, MuxError};
use crate::jobs::record::TrimWindow;

// @module: ffmpeg invocations shared by acquisition and muxing

/// Run an external tool with a timeout, returning its output.
///
/// A hung ffmpeg on a damaged file would otherwise pin the stage forever.
pub(crate) async fn run_tool(
    bin: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<Output, String> {
    let future = Command::new(bin).args(args).output();

    let output = tokio::select! {
        result = future => {
            result.map_err(|e| format!("Failed to execute {} command: {}", bin, e))?
        },
        _ = tokio::time::sleep(timeout) => {
            return Err(format!("{} command timed out after {}s", bin, timeout.as_secs()));
        }
    };

    Ok(output)
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub(crate) fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let dominated_prefixes = [
        "ffmpeg version",
        "  built with",
        "  configuration:",
        "  lib",
        "Input #",
        "  Metadata:",
        "  Duration:",
        "  Stream #",
        "      Metadata:",
        "Output #",
        "Stream mapping:",
        "Press [q]",
        "frame=",
        "size=",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return false;
            }
            !dominated_prefixes.iter().any(|p| line.starts_with(p) || trimmed.starts_with(p))
        })
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}

/// Extract audio from a video as compressed MP3, mono rate sufficient for
/// speech recognition
pub(crate) async fn extract_audio(
    ffmpeg_bin: &str,
    video: &Path,
    output: &Path,
    bitrate: &str,
    timeout: Duration,
) -> Result<(), AcquireError> {
    let video_str = video.to_str().unwrap_or_default();
    let output_str = output.to_str().unwrap_or_default();
    let args = [
        "-y",
        "-i",
        video_str,
        "-vn",
        "-acodec",
        "libmp3lame",
        "-b:a",
        bitrate,
        output_str,
    ];

    let result = run_tool(ffmpeg_bin, &args, timeout)
        .await
        .map_err(AcquireError::TransferFailed)?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let filtered = filter_ffmpeg_stderr(&stderr);
        error!("Audio extraction failed: {}", filtered);
        return Err(AcquireError::UnsupportedContainer(filtered));
    }

    Ok(())
}

/// Trim a video to the given window with stream copy
pub(crate) async fn trim_video(
    ffmpeg_bin: &str,
    video: &Path,
    output: &Path,
    window: TrimWindow,
    timeout: Duration,
) -> Result<(), AcquireError> {
    let start = format!("{:.3}", window.start_ms as f64 / 1000.0);
    let end = format!("{:.3}", window.end_ms as f64 / 1000.0);
    let video_str = video.to_str().unwrap_or_default();
    let output_str = output.to_str().unwrap_or_default();
    let args = [
        "-y", "-ss", &start, "-to", &end, "-i", video_str, "-c", "copy", output_str,
    ];

    let result = run_tool(ffmpeg_bin, &args, timeout)
        .await
        .map_err(AcquireError::TransferFailed)?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let filtered = filter_ffmpeg_stderr(&stderr);
        error!("Trim failed: {}", filtered);
        return Err(AcquireError::TransferFailed(filtered));
    }

    Ok(())
}

/// ffmpeg burn-in muxer.
///
/// Tries hardware-accelerated decode first and falls back to plain software
/// on failure, so an exotic driver setup degrades instead of failing the
/// stage.
#[derive(Debug)]
pub struct FfmpegMuxer {
    config: AcquisitionConfig,
}

impl FfmpegMuxer {
    /// Create a muxer using the configured ffmpeg binary
    pub fn new(config: AcquisitionConfig) -> Self {
        Self { config }
    }

    async fn run_burn(
        &self,
        video: &Path,
        filter: &str,
        output: &Path,
        hwaccel: bool,
    ) -> Result<Output, MuxError> {
        let video_str = video.to_str().unwrap_or_default();
        let output_str = output.to_str().unwrap_or_default();

        let mut args: Vec<&str> = Vec::new();
        if hwaccel {
            args.extend(["-hwaccel", "auto"]);
        }
        args.extend([
            "-y", "-i", video_str, "-vf", filter, "-acodec", "copy", output_str,
        ]);

        run_tool(
            &self.config.ffmpeg_bin,
            &args,
            Duration::from_secs(self.config.timeout_secs),
        )
        .await
        .map_err(MuxError::EncodeFailed)
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn burn(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
    ) -> Result<(), MuxError> {
        let subtitle_str = subtitles.to_str().unwrap_or_default();
        let filter = match subtitles.extension().and_then(|e| e.to_str()) {
            Some("ass") => format!("ass={}", subtitle_str),
            Some("srt") => format!("subtitles={}", subtitle_str),
            other => {
                return Err(MuxError::UnsupportedCodec(format!(
                    "subtitle format {:?} cannot be burned",
                    other
                )));
            }
        };

        let result = self.run_burn(video, &filter, output, true).await?;
        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!(
            "Hardware-accelerated burn failed, retrying in software: {}",
            filter_ffmpeg_stderr(&stderr)
        );

        let result = self.run_burn(video, &filter, output, false).await?;
        if result.status.success() {
            debug!("Software burn succeeded after hardware failure");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        Err(MuxError::EncodeFailed(filter_ffmpeg_stderr(&stderr)))
    }
}
