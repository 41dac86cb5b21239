use async_trait::async_trait;
use log::{debug, error, info};
use std::path::Path;
use std::time::Duration;

use super::ffmpeg;
use super::{AcquiredMedia, MediaAcquirer, StageProgress};
use crate::app_config::AcquisitionConfig;
use crate::errors::AcquireError;
use crate::jobs::record::{SourceRef, TrimWindow};

// @module: Media acquisition via yt-dlp and ffmpeg

// Containers the downstream ffmpeg steps are known to handle
const SUPPORTED_CONTAINERS: [&str; 6] = ["mp4", "mkv", "webm", "mov", "avi", "flv"];

/// Acquires media with yt-dlp (remote references) or a plain copy
/// (uploaded files), then applies the trim window and extracts the audio
/// track so the pause point has both handles ready.
#[derive(Debug)]
pub struct YtDlpAcquirer {
    config: AcquisitionConfig,
}

impl YtDlpAcquirer {
    /// Create an acquirer using the configured tool binaries
    pub fn new(config: AcquisitionConfig) -> Self {
        Self { config }
    }

    async fn download(&self, url: &str, output: &Path) -> Result<(), AcquireError> {
        let output_str = output.to_str().unwrap_or_default();
        // Prefer a merged mp4; fall back to the best single file so a
        // missing ffmpeg merge step does not kill the download
        let args = [
            "-f",
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
            "--merge-output-format",
            "mp4",
            "--no-warnings",
            "--quiet",
            "-o",
            output_str,
            url,
        ];

        let result = ffmpeg::run_tool(
            &self.config.ytdlp_bin,
            &args,
            Duration::from_secs(self.config.timeout_secs),
        )
        .await
        .map_err(AcquireError::TransferFailed)?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            error!("yt-dlp failed: {}", stderr.trim());
            return Err(AcquireError::TransferFailed(stderr.trim().to_string()));
        }
        if !output.exists() {
            return Err(AcquireError::TransferFailed(
                "download produced no output file".to_string(),
            ));
        }

        Ok(())
    }

    fn check_container(path: &Path) -> Result<(), AcquireError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_CONTAINERS.contains(&ext.as_str()) {
            return Err(AcquireError::UnsupportedContainer(format!(
                "'{}' is not a supported container",
                ext
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaAcquirer for YtDlpAcquirer {
    async fn acquire(
        &self,
        source: &SourceRef,
        trim: Option<TrimWindow>,
        work_dir: &Path,
        on_progress: StageProgress<'_>,
    ) -> Result<AcquiredMedia, AcquireError> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut video = work_dir.join("video.mp4");

        match source {
            SourceRef::RemoteUrl { url } => {
                info!("Downloading {}", url);
                self.download(url, &video).await?;
            }
            SourceRef::UploadedFile { path } => {
                if !path.exists() {
                    return Err(AcquireError::InvalidReference(format!(
                        "uploaded file does not exist: {}",
                        path.display()
                    )));
                }
                Self::check_container(path)?;
                debug!("Copying upload {} into work dir", path.display());
                tokio::fs::copy(path, &video)
                    .await
                    .map_err(|e| AcquireError::TransferFailed(e.to_string()))?;
            }
        }
        on_progress(0.6);

        if let Some(window) = trim {
            let trimmed = work_dir.join("trimmed.mp4");
            ffmpeg::trim_video(&self.config.ffmpeg_bin, &video, &trimmed, window, timeout).await?;
            video = trimmed;
        }
        on_progress(0.8);

        let audio = work_dir.join("audio.mp3");
        ffmpeg::extract_audio(
            &self.config.ffmpeg_bin,
            &video,
            &audio,
            &self.config.audio_bitrate,
            timeout,
        )
        .await?;
        on_progress(1.0);

        Ok(AcquiredMedia { video, audio })
    }
}
