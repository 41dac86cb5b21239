/*!
 * Mock collaborator implementations for testing
 *
 * These implement the collaborator traits without touching the network or
 * external tools, so the whole pipeline can be driven in-process. Each mock
 * records its calls in a shared tracker and can be scripted to fail at a
 * chosen stage.
 */

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use bisub::collaborators::{
    AcquiredMedia, BatchProgress, Collaborators, MediaAcquirer, Muxer, RetranslatePair,
    StageProgress, Transcriber, Translator,
};
use bisub::errors::{AcquireError, MuxError, TranscribeError, TranslateError};
use bisub::jobs::record::{SourceRef, TrimWindow};
use bisub::subtitles::Segment;

/// Tracks collaborator calls to assert on pipeline behavior
#[derive(Debug, Default)]
pub struct ApiCallTracker {
    /// Number of acquire calls made
    pub acquire_calls: usize,
    /// Number of transcribe calls made
    pub transcribe_calls: usize,
    /// Number of full-translation calls made
    pub translate_calls: usize,
    /// Number of retranslation calls made
    pub retranslate_calls: usize,
    /// Number of burn calls made
    pub burn_calls: usize,
    /// Context string of the last retranslation request
    pub last_retranslate_context: Option<String>,
}

/// Which collaborator call should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailPoint {
    /// Everything succeeds
    #[default]
    None,
    /// Acquisition fails with a transfer error
    Acquire,
    /// Transcription fails with an authentication error
    Transcribe,
    /// Translation fails with a quota error
    Translate,
    /// Retranslation fails with a malformed response
    Retranslate,
    /// The burn fails with an encode error
    Burn,
}

/// Build the full mock collaborator bundle sharing one call tracker
pub fn mock_collaborators(fail: FailPoint) -> (Collaborators, Arc<StdMutex<ApiCallTracker>>) {
    let tracker = Arc::new(StdMutex::new(ApiCallTracker::default()));
    let collaborators = Collaborators {
        acquirer: Arc::new(MockAcquirer {
            tracker: tracker.clone(),
            fail: fail == FailPoint::Acquire,
        }),
        transcriber: Arc::new(MockTranscriber {
            tracker: tracker.clone(),
            fail: fail == FailPoint::Transcribe,
            segments: default_segments(),
        }),
        translator: Arc::new(MockTranslator {
            tracker: tracker.clone(),
            fail_translate: fail == FailPoint::Translate,
            fail_retranslate: fail == FailPoint::Retranslate,
        }),
        muxer: Arc::new(MockMuxer {
            tracker: tracker.clone(),
            fail: fail == FailPoint::Burn,
        }),
    };
    (collaborators, tracker)
}

/// The segment set every mock transcription returns
pub fn default_segments() -> Vec<Segment> {
    vec![
        Segment::new(1, 0, 1000, "hello there".to_string()),
        Segment::new(2, 1500, 2500, "how are you".to_string()),
        Segment::new(3, 3000, 4000, "goodbye now".to_string()),
    ]
}

/// Mock acquirer: writes placeholder media files into the work dir.
///
/// A small delay gives tests time to attach an event consumer before the
/// pause-point event is published.
#[derive(Debug)]
pub struct MockAcquirer {
    tracker: Arc<StdMutex<ApiCallTracker>>,
    fail: bool,
}

#[async_trait]
impl MediaAcquirer for MockAcquirer {
    async fn acquire(
        &self,
        _source: &SourceRef,
        _trim: Option<TrimWindow>,
        work_dir: &Path,
        on_progress: StageProgress<'_>,
    ) -> Result<AcquiredMedia, AcquireError> {
        self.tracker.lock().unwrap().acquire_calls += 1;
        tokio::time::sleep(Duration::from_millis(50)).await;

        if self.fail {
            return Err(AcquireError::TransferFailed("mock transfer failure".into()));
        }

        on_progress(0.5);
        let video = work_dir.join("video.mp4");
        let audio = work_dir.join("audio.mp3");
        std::fs::write(&video, b"mock video bytes").map_err(|e| {
            AcquireError::TransferFailed(e.to_string())
        })?;
        std::fs::write(&audio, b"mock audio bytes").map_err(|e| {
            AcquireError::TransferFailed(e.to_string())
        })?;
        on_progress(1.0);

        Ok(AcquiredMedia { video, audio })
    }
}

/// Mock transcriber: returns a fixed segment set
#[derive(Debug)]
pub struct MockTranscriber {
    tracker: Arc<StdMutex<ApiCallTracker>>,
    fail: bool,
    segments: Vec<Segment>,
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        _audio: &Path,
        _language_hint: &str,
    ) -> Result<Vec<Segment>, TranscribeError> {
        self.tracker.lock().unwrap().transcribe_calls += 1;

        if self.fail {
            return Err(TranscribeError::AuthenticationError("mock auth failure".into()));
        }

        Ok(self.segments.clone())
    }
}

/// Mock translator: uppercases its input so results are easy to assert on
#[derive(Debug)]
pub struct MockTranslator {
    tracker: Arc<StdMutex<ApiCallTracker>>,
    fail_translate: bool,
    fail_retranslate: bool,
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate_segments(
        &self,
        segments: &[Segment],
        _source_lang: &str,
        _target_lang: &str,
        on_progress: BatchProgress<'_>,
    ) -> Result<Vec<String>, TranslateError> {
        self.tracker.lock().unwrap().translate_calls += 1;

        if self.fail_translate {
            return Err(TranslateError::QuotaExceeded("mock quota failure".into()));
        }

        on_progress(segments.len(), segments.len());
        Ok(segments.iter().map(|s| s.text.to_uppercase()).collect())
    }

    async fn retranslate(
        &self,
        pairs: &[RetranslatePair],
        context: &str,
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<Vec<(usize, String)>, TranslateError> {
        {
            let mut tracker = self.tracker.lock().unwrap();
            tracker.retranslate_calls += 1;
            tracker.last_retranslate_context = Some(context.to_string());
        }

        if self.fail_retranslate {
            return Err(TranslateError::MalformedResponse("mock parse failure".into()));
        }

        Ok(pairs
            .iter()
            .map(|pair| (pair.index, pair.current_text.to_uppercase()))
            .collect())
    }
}

/// Mock muxer: writes a placeholder output file
#[derive(Debug)]
pub struct MockMuxer {
    tracker: Arc<StdMutex<ApiCallTracker>>,
    fail: bool,
}

#[async_trait]
impl Muxer for MockMuxer {
    async fn burn(
        &self,
        _video: &Path,
        _subtitles: &Path,
        output: &Path,
    ) -> Result<(), MuxError> {
        self.tracker.lock().unwrap().burn_calls += 1;

        if self.fail {
            return Err(MuxError::EncodeFailed("mock encode failure".into()));
        }

        std::fs::write(output, b"mock burned video").map_err(|e| {
            MuxError::EncodeFailed(e.to_string())
        })?;
        Ok(())
    }
}
