/*!
 * Error types for the bisub pipeline.
 *
 * This module contains custom error types for the different parts of the
 * application, using the thiserror crate for ergonomic error definitions.
 * Collaborator errors are converted to a `StageFailure` before they are
 * stored in a job record, so the record keeps a stable wire-level code
 * regardless of which adapter produced the error.
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors rejected at job submission time, before any job record exists
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The source reference is not a usable URL or file handle
    #[error("invalid source reference: {0}")]
    InvalidSource(String),

    /// The trim window is inverted or degenerate
    #[error("invalid trim window: start {start_ms}ms must be before end {end_ms}ms")]
    InvalidTrimWindow {
        /// Requested window start
        start_ms: u64,
        /// Requested window end
        end_ms: u64,
    },

    /// A language hint is not a recognizable ISO 639 code
    #[error("invalid language code: {0}")]
    InvalidLanguage(String),
}

/// Errors from the media acquisition collaborator
#[derive(Error, Debug)]
pub enum AcquireError {
    /// The remote reference or uploaded handle cannot be used
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The transfer itself failed (network, external tool exit)
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// The downloaded media is in a container we cannot process
    #[error("unsupported container: {0}")]
    UnsupportedContainer(String),
}

/// Errors from the transcription collaborator
#[derive(Error, Debug)]
pub enum TranscribeError {
    /// Error with authentication or authorization
    #[error("authentication error: {0}")]
    AuthenticationError(String),

    /// Error related to quota or rate limiting
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The audio payload is unusable for the upstream service
    #[error("unsupported audio: {0}")]
    UnsupportedAudio(String),

    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("failed to parse API response: {0}")]
    ParseError(String),
}

/// Errors from the translation collaborator
#[derive(Error, Debug)]
pub enum TranslateError {
    /// Error with authentication or authorization
    #[error("authentication error: {0}")]
    AuthenticationError(String),

    /// Error related to quota or rate limiting
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The upstream response did not follow the numbered-lines protocol
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),
}

/// Errors from subtitle serialization and merging
#[derive(Error, Debug)]
pub enum MergeError {
    /// Original and translated sequences differ in length
    #[error("entry count mismatch: original has {original} entries, translated has {translated}")]
    CountMismatch {
        /// Entries on the original side
        original: usize,
        /// Entries on the translated side
        translated: usize,
    },

    /// Input to the serializer is malformed
    #[error("malformed input: {0}")]
    MalformedInput(String),
}

/// Errors from the muxing collaborator
#[derive(Error, Debug)]
pub enum MuxError {
    /// The video or subtitle codec cannot be burned
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// The encode failed, after any hardware/software fallback
    #[error("encode failed: {0}")]
    EncodeFailed(String),
}

/// A stage failure captured verbatim into the job record.
///
/// `code` is a stable machine-readable identifier, `message` a short
/// user-facing description, `detail` the underlying error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Stable error code (e.g. `download_failed`)
    pub code: String,
    /// Short user-facing message
    pub message: String,
    /// Underlying error detail, verbatim
    pub detail: Option<String>,
}

impl StageFailure {
    /// Create a stage failure from its parts
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        StageFailure {
            code: code.into(),
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

impl From<&AcquireError> for StageFailure {
    fn from(err: &AcquireError) -> Self {
        StageFailure::new("download_failed", "Failed to acquire media", err.to_string())
    }
}

impl From<&TranscribeError> for StageFailure {
    fn from(err: &TranscribeError) -> Self {
        StageFailure::new(
            "transcription_failed",
            "Failed to transcribe audio",
            err.to_string(),
        )
    }
}

impl From<&TranslateError> for StageFailure {
    fn from(err: &TranslateError) -> Self {
        StageFailure::new(
            "translation_failed",
            "Failed to translate subtitles",
            err.to_string(),
        )
    }
}

impl From<&MergeError> for StageFailure {
    fn from(err: &MergeError) -> Self {
        StageFailure::new(
            "merge_failed",
            "Failed to merge bilingual subtitles",
            err.to_string(),
        )
    }
}

impl From<&MuxError> for StageFailure {
    fn from(err: &MuxError) -> Self {
        StageFailure::new(
            "burn_failed",
            "Failed to burn subtitles into video",
            err.to_string(),
        )
    }
}

/// Rejections from the retranslation coordinator.
///
/// These are recoverable and never alter the job phase.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RetranslationRejected {
    /// A burn captured the entries; edits are locked until it finishes
    #[error("a burn is in progress; entries are locked")]
    BurnInProgress,

    /// A chosen index was not part of the latest preview
    #[error("index {0} is not part of the latest preview")]
    StaleIndex(usize),

    /// Commit was called with no outstanding preview
    #[error("no preview outstanding for this job")]
    NoPreview,

    /// The job has no entries to operate on in its current phase
    #[error("entries are not available in phase {0}")]
    EntriesUnavailable(String),

    /// A selected index does not exist in the job's entries
    #[error("no entry with index {0}")]
    UnknownIndex(usize),
}

/// Errors surfaced at the orchestrator boundary
#[derive(Error, Debug)]
pub enum JobError {
    /// The job id is absent from the store: never created, deleted, or expired
    #[error("job {0} not found")]
    NotFound(String),

    /// The request was malformed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The operation does not apply to the job's current phase
    #[error("job {id} is in phase {phase}: {action} not allowed")]
    PhaseConflict {
        /// Job id
        id: String,
        /// Current phase name
        phase: String,
        /// Operation that was attempted
        action: &'static str,
    },

    /// A retranslation preview or commit was rejected
    #[error("retranslation rejected: {0}")]
    Retranslation(#[from] RetranslationRejected),

    /// The translation collaborator failed while producing a preview;
    /// recoverable, the job phase is untouched
    #[error("translation failed: {0}")]
    Translation(#[from] TranslateError),

    /// A requested artifact has not been produced
    #[error("artifact {0} is not available for job {1}")]
    ArtifactUnavailable(String, String),
}
