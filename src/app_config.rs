use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Job lifecycle settings
    #[serde(default)]
    pub jobs: JobConfig,

    /// Media acquisition settings
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Transcription service settings
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Translation service settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Job store and event channel settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobConfig {
    // @field: Seconds a job record lives after creation
    #[serde(default = "default_job_ttl_secs")]
    pub ttl_secs: u64,

    // @field: Interval between expiry sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    // @field: Idle seconds before a keep-alive event is emitted
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    // @field: Bounded capacity of each job's event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    // @field: Root for per-job scratch directories (system temp when unset)
    #[serde(default)]
    pub work_root: Option<PathBuf>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_job_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            keepalive_secs: default_keepalive_secs(),
            event_capacity: default_event_capacity(),
            work_root: None,
        }
    }
}

/// Media acquisition settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AcquisitionConfig {
    // @field: yt-dlp binary
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,

    // @field: ffmpeg binary
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,

    // @field: Audio bitrate for the extracted track (speech recognition quality)
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    // @field: Timeout for the whole download
    #[serde(default = "default_acquire_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            ytdlp_bin: default_ytdlp_bin(),
            ffmpeg_bin: default_ffmpeg_bin(),
            audio_bitrate: default_audio_bitrate(),
            timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

/// Transcription service settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranscriptionConfig {
    /// Service endpoint URL (OpenAI-compatible audio API)
    #[serde(default = "default_transcription_endpoint")]
    pub endpoint: String,

    /// API key
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_transcription_timeout_secs")]
    pub timeout_secs: u64,

    /// Upstream upload size limit in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_transcription_endpoint(),
            api_key: String::new(),
            model: default_transcription_model(),
            timeout_secs: default_transcription_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Translation service settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Service endpoint URL (OpenAI-compatible chat API)
    #[serde(default = "default_translation_endpoint")]
    pub endpoint: String,

    /// API key
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_translation_model")]
    pub model: String,

    /// Entries per batch request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Max concurrent batch requests
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Request timeout in seconds
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_translation_endpoint(),
            api_key: String::new(),
            model: default_translation_model(),
            batch_size: default_batch_size(),
            concurrent_requests: default_concurrent_requests(),
            timeout_secs: default_translation_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh-TW".to_string()
}

fn default_job_ttl_secs() -> u64 {
    1800 // 30 minutes from creation, regardless of activity
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_keepalive_secs() -> u64 {
    30
}

fn default_event_capacity() -> usize {
    64
}

fn default_ytdlp_bin() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_audio_bitrate() -> String {
    "64k".to_string()
}

fn default_acquire_timeout_secs() -> u64 {
    600
}

fn default_transcription_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_transcription_model() -> String {
    "whisper-large-v3-turbo".to_string()
}

fn default_transcription_timeout_secs() -> u64 {
    300
}

fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024 // upstream hard limit
}

fn default_translation_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_translation_model() -> String {
    "qwen/qwen3-32b".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_translation_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.3
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save the configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        if self.jobs.ttl_secs == 0 {
            return Err(anyhow!("Job TTL must be positive"));
        }
        if self.jobs.sweep_interval_secs == 0 {
            return Err(anyhow!("Sweep interval must be positive"));
        }
        if self.translation.batch_size == 0 {
            return Err(anyhow!("Translation batch size must be positive"));
        }
        if self.translation.concurrent_requests == 0 {
            return Err(anyhow!("Translation concurrency must be positive"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            jobs: JobConfig::default(),
            acquisition: AcquisitionConfig::default(),
            transcription: TranscriptionConfig::default(),
            translation: TranslationConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
