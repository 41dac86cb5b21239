use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};
use url::Url;

use crate::errors::{StageFailure, ValidationError};
use crate::language_utils;
use crate::subtitles::BilingualEntry;

/// Position of a job in its state machine.
///
/// `Completed`, `Burned` and `Failed` are terminal for the progress
/// contract; `Completed` and `Burned` still accept the explicit burn
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Pending,
    Downloading,
    DownloadComplete,
    Transcribing,
    Translating,
    Merging,
    Completed,
    Burning,
    Burned,
    Failed,
}

impl JobPhase {
    /// Whether the progress contract considers this phase final
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Burned | JobPhase::Failed)
    }

    /// Exhaustive transition table.
    ///
    /// The pipeline order is strictly sequential; the only re-entries are
    /// the explicit burn from `Completed`/`Burned`, and `Failed` is
    /// reachable from every non-terminal phase.
    pub fn can_transition_to(self, next: JobPhase) -> bool {
        use JobPhase::*;
        match (self, next) {
            (Pending, Downloading) => true,
            (Downloading, DownloadComplete) => true,
            (DownloadComplete, Transcribing) => true,
            (Transcribing, Translating) => true,
            (Translating, Merging) => true,
            (Merging, Completed) => true,
            (Completed, Burning) => true,
            (Burning, Burned) => true,
            (Burned, Burning) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Wire-level name of the phase
    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Pending => "pending",
            JobPhase::Downloading => "downloading",
            JobPhase::DownloadComplete => "download_complete",
            JobPhase::Transcribing => "transcribing",
            JobPhase::Translating => "translating",
            JobPhase::Merging => "merging",
            JobPhase::Completed => "completed",
            JobPhase::Burning => "burning",
            JobPhase::Burned => "burned",
            JobPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output artifact kinds produced by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Bilingual SubRip subtitle
    Srt,
    /// Bilingual ASS subtitle
    Ass,
    /// Burned-in output video
    Video,
    /// Extracted audio track
    Audio,
    /// Acquired source video
    SourceVideo,
}

impl ArtifactKind {
    /// Wire-level name of the artifact kind
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Srt => "srt",
            ArtifactKind::Ass => "ass",
            ArtifactKind::Video => "video",
            ArtifactKind::Audio => "audio",
            ArtifactKind::SourceVideo => "source_video",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "srt" => Ok(ArtifactKind::Srt),
            "ass" => Ok(ArtifactKind::Ass),
            "video" => Ok(ArtifactKind::Video),
            "audio" => Ok(ArtifactKind::Audio),
            "source_video" => Ok(ArtifactKind::SourceVideo),
            _ => Err(anyhow::anyhow!("Invalid artifact kind: {}", s)),
        }
    }
}

/// Where the media comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRef {
    /// A remote http(s) reference, downloaded by the acquirer
    RemoteUrl {
        /// The reference itself
        url: String,
    },
    /// A file the client already placed on local disk
    UploadedFile {
        /// Handle to the uploaded file
        path: PathBuf,
    },
}

/// Optional window to cut out of the source before processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimWindow {
    /// Window start in ms
    pub start_ms: u64,
    /// Window end in ms
    pub end_ms: u64,
}

/// Everything a creation request carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInputs {
    /// Media source reference
    pub source: SourceRef,

    /// Optional trim window
    pub trim: Option<TrimWindow>,

    /// Source language hint
    pub source_lang: String,

    /// Target language hint
    pub target_lang: String,
}

impl JobInputs {
    /// Validate the inputs before any job record exists.
    ///
    /// Remote references must be http(s) URLs, the trim window must be
    /// ordered, and both language hints must be recognizable ISO codes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.source {
            SourceRef::RemoteUrl { url } => {
                let parsed = Url::parse(url)
                    .map_err(|e| ValidationError::InvalidSource(format!("{}: {}", url, e)))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(ValidationError::InvalidSource(format!(
                        "unsupported scheme '{}' in {}",
                        parsed.scheme(),
                        url
                    )));
                }
            }
            SourceRef::UploadedFile { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ValidationError::InvalidSource(
                        "empty upload handle".to_string(),
                    ));
                }
            }
        }

        if let Some(trim) = &self.trim {
            if trim.start_ms >= trim.end_ms {
                return Err(ValidationError::InvalidTrimWindow {
                    start_ms: trim.start_ms,
                    end_ms: trim.end_ms,
                });
            }
        }

        for lang in [&self.source_lang, &self.target_lang] {
            language_utils::normalize_to_part2t(lang)
                .map_err(|_| ValidationError::InvalidLanguage(lang.clone()))?;
        }

        Ok(())
    }
}

/// One job's full state, owned exclusively by the store
#[derive(Debug, Clone)]
pub struct JobRecord {
    /// Opaque unique id, immutable after creation
    pub id: String,

    /// Current position in the state machine
    pub phase: JobPhase,

    /// 0-100, non-decreasing until a terminal phase
    pub progress_percent: u8,

    /// Human-readable step label
    pub current_step: Option<String>,

    /// Wall-clock creation time, for display
    pub created_at: DateTime<Utc>,

    /// Monotonic creation instant, for TTL math
    pub created_instant: Instant,

    /// Time-to-live measured from creation
    pub ttl: Duration,

    /// Creation request inputs
    pub inputs: JobInputs,

    /// Produced artifacts by kind
    pub output_files: HashMap<ArtifactKind, PathBuf>,

    /// Captured failure, set together with the `Failed` phase
    pub error: Option<StageFailure>,

    /// Bilingual entries, present once translation and merge complete
    pub entries: Vec<BilingualEntry>,

    /// Per-job scratch directory, set once acquisition prepared it
    pub work_dir: Option<PathBuf>,
}

impl JobRecord {
    /// Create a fresh record in `Pending` with a new id
    pub fn new(inputs: JobInputs, ttl: Duration) -> Self {
        JobRecord {
            id: uuid::Uuid::new_v4().simple().to_string(),
            phase: JobPhase::Pending,
            progress_percent: 0,
            current_step: None,
            created_at: Utc::now(),
            created_instant: Instant::now(),
            ttl,
            inputs,
            output_files: HashMap::new(),
            error: None,
            entries: Vec::new(),
            work_dir: None,
        }
    }

    /// Whether the record has outlived its TTL at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_instant) >= self.ttl
    }

    /// Checked phase transition; rejects anything not in the table
    pub fn set_phase(&mut self, next: JobPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            return false;
        }
        self.phase = next;
        true
    }

    /// Snapshot for status queries
    pub fn status(&self) -> JobStatus {
        JobStatus {
            job_id: self.id.clone(),
            status: self.phase,
            progress: self.progress_percent,
            current_step: self.current_step.clone(),
            created_at: self.created_at,
            expires_at: self.created_at
                + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero()),
            error: self.error.clone(),
            output_files: self.output_files.clone(),
            entry_count: self.entries.len(),
        }
    }
}

/// Serializable view of a job for status queries
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    /// Job id
    pub job_id: String,
    /// Current phase
    pub status: JobPhase,
    /// 0-100
    pub progress: u8,
    /// Human-readable step label
    pub current_step: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Eviction deadline
    pub expires_at: DateTime<Utc>,
    /// Captured failure when the phase is `failed`
    pub error: Option<StageFailure>,
    /// Produced artifacts by kind
    pub output_files: HashMap<ArtifactKind, PathBuf>,
    /// Number of bilingual entries currently held
    pub entry_count: usize,
}
