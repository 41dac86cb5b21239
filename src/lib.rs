/*!
 * # bisub - Bilingual Subtitle Pipeline
 *
 * A Rust library that turns a single media source into bilingual subtitle
 * artifacts (and optionally a muxed video) through a multi-stage pipeline.
 *
 * ## Features
 *
 * - Acquire media from a remote URL (yt-dlp) or an uploaded file, with an
 *   optional trim window
 * - Transcribe audio through a Whisper-compatible API
 * - Translate segments through an OpenAI-compatible chat API with batched
 *   requests and a one-by-one fallback
 * - Merge and serialize bilingual SRT and ASS artifacts
 * - Burn subtitles into the video with ffmpeg
 * - Stream live progress events per job, with an explicit pause point after
 *   acquisition and a resume call to continue
 * - Preview and commit alternate translations for selected entries
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `jobs`: Job records, the state machine, the TTL-evicting store, and
 *   per-job event channels
 * - `pipeline`: The stage executor and the retranslation coordinator
 * - `orchestrator`: The boundary exposed to clients
 * - `collaborators`: Adapters for the external acquisition, transcription,
 *   translation and muxing services
 * - `formats`: SRT and ASS serialization
 * - `subtitles`: Shared subtitle domain types
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * All job state is process-lifetime only; nothing survives a restart.
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]

// Public modules
pub mod app_config;
pub mod collaborators;
pub mod errors;
pub mod formats;
pub mod jobs;
pub mod language_utils;
pub mod orchestrator;
pub mod pipeline;
pub mod subtitles;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{JobError, RetranslationRejected, StageFailure, ValidationError};
pub use jobs::{ArtifactKind, JobEvent, JobInputs, JobPhase, JobStatus, SourceRef, TrimWindow};
pub use orchestrator::Orchestrator;
pub use pipeline::{Choice, PreviewItem};
pub use subtitles::{BilingualEntry, Segment};
