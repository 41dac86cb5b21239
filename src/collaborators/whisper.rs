use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, multipart};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::Transcriber;
use crate::app_config::TranscriptionConfig;
use crate::errors::TranscribeError;
use crate::language_utils;
use crate::subtitles::Segment;

/// Transcriber backed by a Whisper-compatible `audio/transcriptions`
/// endpoint, requesting `verbose_json` so segment timings come back.
#[derive(Debug)]
pub struct WhisperApiTranscriber {
    /// HTTP client for API requests
    client: Client,
    /// Service configuration
    config: TranscriptionConfig,
}

/// Segment entry in a verbose_json transcription response
#[derive(Debug, Deserialize)]
struct ApiSegment {
    /// Segment start in seconds
    start: f64,
    /// Segment end in seconds
    end: f64,
    /// Transcribed text
    text: String,
}

/// verbose_json transcription response
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    segments: Vec<ApiSegment>,
}

impl WhisperApiTranscriber {
    /// Create a transcriber client from the service configuration
    pub fn new(config: TranscriptionConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: &str,
    ) -> Result<Vec<Segment>, TranscribeError> {
        let metadata = tokio::fs::metadata(audio)
            .await
            .map_err(|e| TranscribeError::UnsupportedAudio(format!("{}: {}", audio.display(), e)))?;
        if metadata.len() > self.config.max_upload_bytes {
            return Err(TranscribeError::UnsupportedAudio(format!(
                "audio is {:.1}MB, exceeding the {}MB upload limit",
                metadata.len() as f64 / (1024.0 * 1024.0),
                self.config.max_upload_bytes / (1024 * 1024)
            )));
        }

        // The API only understands the primary subtag ("zh-TW" -> "zh")
        let language = language_utils::primary_subtag(language_hint);

        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| TranscribeError::RequestFailed(e.to_string()))?;

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| TranscribeError::RequestFailed(e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json")
            .text("language", language);

        debug!("Uploading {} bytes for transcription", metadata.len());
        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscribeError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            return Err(match status.as_u16() {
                401 | 403 => TranscribeError::AuthenticationError(body),
                429 => TranscribeError::QuotaExceeded(body),
                _ => TranscribeError::RequestFailed(format!("{}: {}", status, body)),
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::ParseError(e.to_string()))?;
        if parsed.segments.is_empty() {
            return Err(TranscribeError::ParseError(
                "transcription returned no segments".to_string(),
            ));
        }

        let mut segments = Vec::with_capacity(parsed.segments.len());
        for (i, seg) in parsed.segments.iter().enumerate() {
            let start_ms = (seg.start.max(0.0) * 1000.0) as u64;
            let end_ms = (seg.end.max(0.0) * 1000.0) as u64;
            match Segment::new_validated(i + 1, start_ms, end_ms, seg.text.clone()) {
                Ok(segment) => segments.push(segment),
                Err(e) => warn!("Skipping invalid transcription segment {}: {}", i + 1, e),
            }
        }
        if segments.is_empty() {
            return Err(TranscribeError::ParseError(
                "no usable segments in transcription".to_string(),
            ));
        }

        // Renumber after any skips so indices stay contiguous
        for (i, segment) in segments.iter_mut().enumerate() {
            segment.index = i + 1;
        }

        Ok(segments)
    }
}
