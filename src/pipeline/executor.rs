use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::collaborators::Collaborators;
use crate::errors::{JobError, StageFailure};
use crate::formats;
use crate::jobs::events::JobEvent;
use crate::jobs::record::{ArtifactKind, JobPhase};
use crate::jobs::store::JobStore;
use crate::subtitles::merge_bilingual;

// Design-level progress bands. Stages interpolate inside their band as the
// collaborator reports sub-progress; non-burn completions jump to 100 after
// the merge band.
const DOWNLOAD_BAND_END: u8 = 15;
const TRANSCRIBE_BAND_END: u8 = 50;
const TRANSLATE_BAND_END: u8 = 70;
const MERGE_BAND_END: u8 = 80;

/// Everything a burn run needs, captured atomically at burn-start
pub struct BurnContext {
    payload: String,
    video: PathBuf,
    work_dir: PathBuf,
}

/// Drives one job through its stages.
///
/// Every stage boundary is one atomic store update (phase + percent + step)
/// followed by the matching event. A collaborator error ends the run after
/// one atomic `Failed` update; a vanished record (deletion or TTL eviction
/// mid-run) makes updates return `None`, and the run simply stops writing.
pub struct PipelineExecutor {
    store: Arc<JobStore>,
    collaborators: Collaborators,
    work_root: Option<PathBuf>,
}

impl PipelineExecutor {
    /// Create an executor over a store and a collaborator bundle
    pub fn new(
        store: Arc<JobStore>,
        collaborators: Collaborators,
        work_root: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            collaborators,
            work_root,
        }
    }

    /// Checked stage transition: one atomic update, then the matching event.
    ///
    /// Returns false when the record is gone or the transition is not in
    /// the table, either of which ends the run.
    fn advance(&self, id: &str, phase: JobPhase, percent: u8, step: &str, message: &str) -> bool {
        let applied = self.store.update(id, |record| {
            if !record.set_phase(phase) {
                return None;
            }
            record.progress_percent = record.progress_percent.max(percent);
            record.current_step = Some(step.to_string());
            Some(record.progress_percent)
        });

        match applied {
            Some(Some(progress)) => {
                if let Some(events) = self.store.events(id) {
                    events.publish(JobEvent::progress(phase, progress, step, message));
                }
                true
            }
            Some(None) => {
                error!("Job {}: transition to {} rejected", id, phase);
                false
            }
            None => false,
        }
    }

    /// Capture a stage failure and end the job in one atomic update.
    ///
    /// Progress stays at its last successful value.
    fn fail(&self, id: &str, failure: StageFailure) {
        let applied = self.store.update(id, |record| {
            if !record.set_phase(JobPhase::Failed) {
                return false;
            }
            record.error = Some(failure.clone());
            true
        });

        if applied == Some(true) {
            error!("Job {} failed: {} ({})", id, failure.code, failure.message);
            if let Some(events) = self.store.events(id) {
                events.publish(JobEvent::error(&failure));
            }
        }
    }

    /// Cooperative cancellation check between stages
    fn cancelled(&self, id: &str) -> bool {
        let token_gone = match self.store.cancel_token(id) {
            Some(token) => token.is_cancelled(),
            None => true,
        };
        if token_gone {
            debug!("Job {}: cancelled, stopping executor", id);
        }
        token_gone
    }

    fn create_work_dir(&self, id: &str) -> std::io::Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("bisub_{}_", id);
        builder.prefix(&prefix);
        let dir = match &self.work_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir.into_path())
    }

    /// First run: acquisition up to the `DownloadComplete` pause point.
    ///
    /// The task ends there; `run_processing` is spawned by the explicit
    /// resume call.
    pub async fn run_acquisition(&self, job_id: String) {
        let Some(record) = self.store.get(&job_id) else {
            return;
        };

        let work_dir = match self.create_work_dir(&job_id) {
            Ok(dir) => dir,
            Err(e) => {
                self.fail(
                    &job_id,
                    StageFailure::new(
                        "download_failed",
                        "Failed to prepare work directory",
                        e.to_string(),
                    ),
                );
                return;
            }
        };

        if !self.advance(
            &job_id,
            JobPhase::Downloading,
            0,
            "download",
            "Downloading video",
        ) {
            return;
        }

        let t0 = Instant::now();
        let store = Arc::clone(&self.store);
        let progress_id = job_id.clone();
        let on_progress = move |fraction: f32| {
            let percent = (fraction.clamp(0.0, 1.0) * DOWNLOAD_BAND_END as f32) as u8;
            let state = store
                .update(&progress_id, |record| {
                    if record.phase != JobPhase::Downloading {
                        return None;
                    }
                    record.progress_percent = record.progress_percent.max(percent);
                    Some(record.progress_percent)
                })
                .flatten();
            if let Some(progress) = state {
                if let Some(events) = store.events(&progress_id) {
                    events.publish(JobEvent::progress(
                        JobPhase::Downloading,
                        progress,
                        "download",
                        "Downloading video",
                    ));
                }
            }
        };

        let acquired = self
            .collaborators
            .acquirer
            .acquire(
                &record.inputs.source,
                record.inputs.trim,
                &work_dir,
                &on_progress,
            )
            .await;

        let media = match acquired {
            Ok(media) => media,
            Err(e) => {
                self.fail(&job_id, StageFailure::from(&e));
                return;
            }
        };
        info!(
            "Job {}: acquisition finished in {:.1}s",
            job_id,
            t0.elapsed().as_secs_f64()
        );

        let applied = self.store.update(&job_id, |record| {
            if !record.set_phase(JobPhase::DownloadComplete) {
                return false;
            }
            record.progress_percent = DOWNLOAD_BAND_END;
            record.current_step = Some("download".to_string());
            record.work_dir = Some(work_dir.clone());
            record
                .output_files
                .insert(ArtifactKind::SourceVideo, media.video.clone());
            record
                .output_files
                .insert(ArtifactKind::Audio, media.audio.clone());
            true
        });

        if applied == Some(true) {
            if let Some(events) = self.store.events(&job_id) {
                events.publish(JobEvent::download_complete(
                    DOWNLOAD_BAND_END,
                    "download",
                    "Download complete, awaiting resume",
                ));
            }
            info!("Job {}: paused at download_complete", job_id);
        }
    }

    /// Continuation run: transcribe, translate, merge, complete.
    ///
    /// Spawned by resume; the checked transition out of `DownloadComplete`
    /// makes a double resume harmless (the second one finds the phase
    /// already advanced and stops).
    pub async fn run_processing(&self, job_id: String) {
        let Some(record) = self.store.get(&job_id) else {
            return;
        };
        let (Some(audio), Some(work_dir)) = (
            record.output_files.get(&ArtifactKind::Audio).cloned(),
            record.work_dir.clone(),
        ) else {
            self.fail(
                &job_id,
                StageFailure::new(
                    "transcription_failed",
                    "Failed to transcribe audio",
                    "no audio handle from acquisition",
                ),
            );
            return;
        };

        // --- Transcribe ---
        if !self.advance(
            &job_id,
            JobPhase::Transcribing,
            DOWNLOAD_BAND_END,
            "transcribe",
            "Transcribing audio",
        ) {
            return;
        }
        let t0 = Instant::now();
        let segments = match self
            .collaborators
            .transcriber
            .transcribe(&audio, &record.inputs.source_lang)
            .await
        {
            Ok(segments) => segments,
            Err(e) => {
                self.fail(&job_id, StageFailure::from(&e));
                return;
            }
        };
        info!(
            "Job {}: transcription finished in {:.1}s ({} segments)",
            job_id,
            t0.elapsed().as_secs_f64(),
            segments.len()
        );
        if self.cancelled(&job_id) {
            return;
        }

        // --- Translate ---
        if !self.advance(
            &job_id,
            JobPhase::Translating,
            TRANSCRIBE_BAND_END,
            "translate",
            "Translating subtitles",
        ) {
            return;
        }
        let t0 = Instant::now();
        let band = TRANSLATE_BAND_END - TRANSCRIBE_BAND_END;
        let store = Arc::clone(&self.store);
        let events = self.store.events(&job_id);
        let progress_id = job_id.clone();
        let on_progress = move |done: usize, total: usize| {
            if total == 0 {
                return;
            }
            let percent = TRANSCRIBE_BAND_END + ((done * band as usize) / total) as u8;
            let state = store
                .update(&progress_id, |record| {
                    if record.phase != JobPhase::Translating {
                        return None;
                    }
                    record.progress_percent = record.progress_percent.max(percent);
                    Some(record.progress_percent)
                })
                .flatten();
            if let (Some(progress), Some(events)) = (state, events.as_ref()) {
                events.publish(JobEvent::progress(
                    JobPhase::Translating,
                    progress,
                    "translate",
                    "Translating subtitles",
                ));
            }
        };

        let translations = match self
            .collaborators
            .translator
            .translate_segments(
                &segments,
                &record.inputs.source_lang,
                &record.inputs.target_lang,
                &on_progress,
            )
            .await
        {
            Ok(translations) => translations,
            Err(e) => {
                self.fail(&job_id, StageFailure::from(&e));
                return;
            }
        };
        info!(
            "Job {}: translation finished in {:.1}s",
            job_id,
            t0.elapsed().as_secs_f64()
        );
        if self.cancelled(&job_id) {
            return;
        }

        // --- Merge & serialize ---
        if !self.advance(
            &job_id,
            JobPhase::Merging,
            TRANSLATE_BAND_END,
            "merge",
            "Merging bilingual subtitles",
        ) {
            return;
        }
        let entries = match merge_bilingual(&segments, &translations) {
            Ok(entries) => entries,
            Err(e) => {
                self.fail(&job_id, StageFailure::from(&e));
                return;
            }
        };

        let srt_path = work_dir.join("subtitle.srt");
        let ass_path = work_dir.join("subtitle.ass");
        let srt_content = formats::srt::serialize(&entries);
        let ass_content = formats::ass::serialize_bilingual(&entries);
        for (path, content) in [(&srt_path, &srt_content), (&ass_path, &ass_content)] {
            if let Err(e) = tokio::fs::write(path, content).await {
                self.fail(
                    &job_id,
                    StageFailure::new(
                        "merge_failed",
                        "Failed to merge bilingual subtitles",
                        format!("{}: {}", path.display(), e),
                    ),
                );
                return;
            }
        }

        // Entries land as one full replacement list, together with the
        // subtitle artifacts, before the terminal update
        let applied = self.store.update(&job_id, |record| {
            if record.phase != JobPhase::Merging {
                return false;
            }
            record.progress_percent = MERGE_BAND_END;
            record.entries = entries.clone();
            record
                .output_files
                .insert(ArtifactKind::Srt, srt_path.clone());
            record
                .output_files
                .insert(ArtifactKind::Ass, ass_path.clone());
            true
        });
        if applied != Some(true) {
            return;
        }
        if let Some(events) = self.store.events(&job_id) {
            events.publish(JobEvent::progress(
                JobPhase::Merging,
                MERGE_BAND_END,
                "merge",
                "Merging bilingual subtitles",
            ));
        }

        // --- Complete ---
        let applied = self.store.update(&job_id, |record| {
            if !record.set_phase(JobPhase::Completed) {
                return false;
            }
            record.progress_percent = 100;
            record.current_step = Some("complete".to_string());
            true
        });
        if applied == Some(true) {
            if let Some(events) = self.store.events(&job_id) {
                events.publish(JobEvent::complete(JobPhase::Completed));
            }
            info!("Job {}: pipeline complete", job_id);
        }
    }

    /// Atomic burn-start: transition to `Burning` and capture the payload
    /// in one read-modify-write, so a concurrent retranslation commit can
    /// never interleave with the snapshot.
    ///
    /// A missing payload means "burn the current entries", serialized to
    /// ASS inside the same atomic update.
    pub fn start_burn(&self, id: &str, payload: Option<String>) -> Result<BurnContext, JobError> {
        let result = self.store.update(id, |record| {
            if !record.phase.can_transition_to(JobPhase::Burning) {
                return Err(JobError::PhaseConflict {
                    id: record.id.clone(),
                    phase: record.phase.to_string(),
                    action: "burn",
                });
            }
            let video = record
                .output_files
                .get(&ArtifactKind::SourceVideo)
                .cloned()
                .ok_or_else(|| JobError::ArtifactUnavailable(
                    ArtifactKind::SourceVideo.to_string(),
                    record.id.clone(),
                ))?;
            let work_dir = record.work_dir.clone().ok_or_else(|| {
                JobError::ArtifactUnavailable("work_dir".to_string(), record.id.clone())
            })?;
            let payload = match payload {
                Some(payload) => payload,
                None => formats::ass::serialize_bilingual(&record.entries),
            };

            record.phase = JobPhase::Burning;
            // Burn re-enters the progress scale at the start of its band
            record.progress_percent = MERGE_BAND_END;
            record.current_step = Some("burn".to_string());

            Ok(BurnContext {
                payload,
                video,
                work_dir,
            })
        });

        let context = result.ok_or_else(|| JobError::NotFound(id.to_string()))??;
        if let Some(events) = self.store.events(id) {
            events.publish(JobEvent::progress(
                JobPhase::Burning,
                MERGE_BAND_END,
                "burn",
                "Burning subtitles into video",
            ));
        }
        Ok(context)
    }

    /// Burn run: write the captured payload and mux it into the source video
    pub async fn run_burn(&self, job_id: String, context: BurnContext) {
        let subtitle_path = context.work_dir.join("burn.ass");
        if let Err(e) = tokio::fs::write(&subtitle_path, &context.payload).await {
            self.fail(
                &job_id,
                StageFailure::new(
                    "burn_failed",
                    "Failed to burn subtitles into video",
                    e.to_string(),
                ),
            );
            return;
        }

        let output = context.work_dir.join("output.mp4");
        let t0 = Instant::now();
        if let Err(e) = self
            .collaborators
            .muxer
            .burn(&context.video, &subtitle_path, &output)
            .await
        {
            self.fail(&job_id, StageFailure::from(&e));
            return;
        }
        info!(
            "Job {}: burn finished in {:.1}s",
            job_id,
            t0.elapsed().as_secs_f64()
        );

        let applied = self.store.update(&job_id, |record| {
            if !record.set_phase(JobPhase::Burned) {
                return false;
            }
            record.progress_percent = 100;
            record.current_step = Some("burn".to_string());
            record
                .output_files
                .insert(ArtifactKind::Video, output.clone());
            true
        });
        if applied == Some(true) {
            if let Some(events) = self.store.events(&job_id) {
                events.publish(JobEvent::complete(JobPhase::Burned));
            }
        } else {
            warn!("Job {}: burn result dropped, record is gone", job_id);
        }
    }
}
