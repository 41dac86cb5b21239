/*!
 * Collaborator interfaces for the pipeline stages.
 *
 * Each stage of the pipeline delegates its real work to an external,
 * independently-replaceable collaborator behind one of these traits:
 * acquisition (yt-dlp + ffmpeg), transcription (Whisper-compatible HTTP
 * API), translation (OpenAI-compatible chat API) and muxing (ffmpeg
 * burn-in). Serialization is pure and lives in the `formats` module
 * instead.
 *
 * The executor only ever sees the traits, which is what lets the test
 * suite drive the whole pipeline with scripted mocks.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{AcquireError, MuxError, TranscribeError, TranslateError};
use crate::jobs::record::{SourceRef, TrimWindow};
use crate::subtitles::Segment;

pub mod ffmpeg;
pub mod llm;
pub mod ytdlp;
pub mod whisper;

/// Handles produced by a successful acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredMedia {
    /// Local media file, trimmed when a window was requested
    pub video: PathBuf,
    /// Extracted audio track, ready for transcription
    pub audio: PathBuf,
}

/// An original/current text pair selected for retranslation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetranslatePair {
    /// Entry index within the job
    pub index: usize,
    /// Original (source-language) text
    pub original_text: String,
    /// Translated text at request time
    pub current_text: String,
}

/// Fraction-of-stage progress callback, called with values in `[0, 1]`
pub type StageProgress<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// Completed/total progress callback for batched work
pub type BatchProgress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Turns a source reference into local media and audio handles
#[async_trait]
pub trait MediaAcquirer: Send + Sync + Debug {
    /// Acquire the source into `work_dir`, applying the trim window and
    /// extracting the audio track
    async fn acquire(
        &self,
        source: &SourceRef,
        trim: Option<TrimWindow>,
        work_dir: &Path,
        on_progress: StageProgress<'_>,
    ) -> Result<AcquiredMedia, AcquireError>;
}

/// Produces time-coded text segments from an audio handle
#[async_trait]
pub trait Transcriber: Send + Sync + Debug {
    /// Transcribe `audio`, hinted with an ISO language code
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: &str,
    ) -> Result<Vec<Segment>, TranscribeError>;
}

/// Translates ordered segments, or a selected subset with free-text context
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate every segment, returning texts aligned to input order
    async fn translate_segments(
        &self,
        segments: &[Segment],
        source_lang: &str,
        target_lang: &str,
        on_progress: BatchProgress<'_>,
    ) -> Result<Vec<String>, TranslateError>;

    /// Translate a selected subset with free-text guidance, returning
    /// `(index, text)` for each pair that produced a result
    async fn retranslate(
        &self,
        pairs: &[RetranslatePair],
        context: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<(usize, String)>, TranslateError>;
}

/// Burns a subtitle artifact into a media file
#[async_trait]
pub trait Muxer: Send + Sync + Debug {
    /// Produce `output` from `video` with `subtitles` burned in
    async fn burn(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
    ) -> Result<(), MuxError>;
}

/// The full set of collaborators handed to the executor
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Acquisition adapter
    pub acquirer: Arc<dyn MediaAcquirer>,
    /// Transcription adapter
    pub transcriber: Arc<dyn Transcriber>,
    /// Translation adapter
    pub translator: Arc<dyn Translator>,
    /// Muxing adapter
    pub muxer: Arc<dyn Muxer>,
}
