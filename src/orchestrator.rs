use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::app_config::Config;
use crate::collaborators::Collaborators;
use crate::errors::JobError;
use crate::jobs::events::EventStream;
use crate::jobs::record::{ArtifactKind, JobInputs, JobPhase, JobStatus};
use crate::jobs::store::JobStore;
use crate::pipeline::executor::PipelineExecutor;
use crate::pipeline::retranslate::{Choice, PreviewItem, RetranslationCoordinator};
use crate::subtitles::BilingualEntry;

/// The job orchestrator: owns every job's lifecycle and exposes the
/// format-agnostic boundary clients talk to.
///
/// One background task per executor run; each task gets an explicit handle
/// here and a cancellation token in the store. Cancellation stays
/// cooperative: deleting a job never aborts an in-flight collaborator call,
/// the run just stops writing at its next stage boundary.
pub struct Orchestrator {
    config: Config,
    store: Arc<JobStore>,
    executor: Arc<PipelineExecutor>,
    retranslation: RetranslationCoordinator,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Wire an orchestrator from configuration and a collaborator bundle
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let store = Arc::new(JobStore::new(
            Duration::from_secs(config.jobs.ttl_secs),
            config.jobs.event_capacity,
            Duration::from_secs(config.jobs.keepalive_secs),
        ));
        let executor = Arc::new(PipelineExecutor::new(
            Arc::clone(&store),
            collaborators.clone(),
            config.jobs.work_root.clone(),
        ));
        let retranslation =
            RetranslationCoordinator::new(Arc::clone(&store), collaborators.translator.clone());

        Self {
            config,
            store,
            executor,
            retranslation,
            tasks: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        }
    }

    /// Start the periodic TTL sweep; idempotent
    pub fn start_sweeper(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_none() {
            let interval = Duration::from_secs(self.config.jobs.sweep_interval_secs);
            *sweeper = Some(JobStore::spawn_sweeper(&self.store, interval));
            debug!("Expiry sweeper started ({}s interval)", interval.as_secs());
        }
    }

    /// Stop the sweeper and drop all task handles.
    ///
    /// In-flight collaborator calls are left to finish on their own; their
    /// records are already gone, so their writes are dropped.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        for (id, handle) in self.tasks.lock().drain() {
            self.store.remove(&id);
            drop(handle);
        }
        info!("Orchestrator shut down");
    }

    /// Validate the inputs, create a job and schedule its acquisition run
    pub fn create_job(&self, inputs: JobInputs) -> Result<JobStatus, JobError> {
        inputs.validate()?;
        let record = self.store.create(inputs);

        let executor = Arc::clone(&self.executor);
        let id = record.id.clone();
        let handle = tokio::spawn(async move { executor.run_acquisition(id).await });
        self.tasks.lock().insert(record.id.clone(), handle);

        Ok(record.status())
    }

    /// Snapshot a job's status
    pub fn get_status(&self, job_id: &str) -> Result<JobStatus, JobError> {
        self.store
            .get(job_id)
            .map(|record| record.status())
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Snapshot a job's bilingual entries
    pub fn entries(&self, job_id: &str) -> Result<Vec<BilingualEntry>, JobError> {
        self.store
            .get(job_id)
            .map(|record| record.entries)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Attach the (at most one active) live event consumer for a job.
    ///
    /// Events are at-most-once; a consumer that reconnects after missing
    /// events reconciles through `get_status`.
    pub fn subscribe(&self, job_id: &str) -> Result<EventStream, JobError> {
        self.store
            .events(job_id)
            .map(|events| events.subscribe())
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Resume a job paused at `download_complete` and schedule the
    /// processing run.
    ///
    /// The executor's checked transition out of `DownloadComplete` makes a
    /// racing double resume harmless; the loser stops without writing.
    pub fn resume(&self, job_id: &str) -> Result<(), JobError> {
        let record = self
            .store
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        if record.phase != JobPhase::DownloadComplete {
            return Err(JobError::PhaseConflict {
                id: record.id,
                phase: record.phase.to_string(),
                action: "resume",
            });
        }

        let executor = Arc::clone(&self.executor);
        let id = job_id.to_string();
        let handle = tokio::spawn(async move { executor.run_processing(id).await });
        self.tasks.lock().insert(job_id.to_string(), handle);

        Ok(())
    }

    /// Request a burn of the given subtitle payload (or of the current
    /// entries when none is provided) and schedule the burn run.
    ///
    /// The burn-start transition and the payload capture happen in one
    /// atomic store update, which is what a concurrent retranslation
    /// commit is rejected against.
    pub fn request_burn(&self, job_id: &str, payload: Option<String>) -> Result<(), JobError> {
        let context = self.executor.start_burn(job_id, payload)?;

        let executor = Arc::clone(&self.executor);
        let id = job_id.to_string();
        let handle = tokio::spawn(async move { executor.run_burn(id, context).await });
        self.tasks.lock().insert(job_id.to_string(), handle);

        Ok(())
    }

    /// Produce a non-committing retranslation preview for selected entries
    pub async fn preview_retranslation(
        &self,
        job_id: &str,
        selected_indices: &[usize],
        context: &str,
    ) -> Result<Vec<PreviewItem>, JobError> {
        self.retranslation
            .preview(job_id, selected_indices, context)
            .await
    }

    /// Commit choices from the latest preview into the job's entries
    pub fn commit_retranslation(
        &self,
        job_id: &str,
        choices: &HashMap<usize, Choice>,
    ) -> Result<Vec<BilingualEntry>, JobError> {
        self.retranslation.commit(job_id, choices)
    }

    /// Replace one entry's translated text, leaving everything else alone.
    ///
    /// Invalidates any outstanding preview for the job.
    pub fn update_entry(
        &self,
        job_id: &str,
        index: usize,
        translated_text: &str,
    ) -> Result<(), JobError> {
        let applied = self
            .store
            .update(job_id, |record| {
                match record.phase {
                    JobPhase::Completed | JobPhase::Burned => {}
                    phase => {
                        return Err(JobError::PhaseConflict {
                            id: record.id.clone(),
                            phase: phase.to_string(),
                            action: "edit entry",
                        });
                    }
                }
                let entry = record
                    .entries
                    .iter_mut()
                    .find(|e| e.index == index)
                    .ok_or(crate::errors::RetranslationRejected::UnknownIndex(index))?;
                entry.translated_text = translated_text.to_string();
                Ok(())
            })
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        applied?;
        self.retranslation.invalidate(job_id);
        Ok(())
    }

    /// Delete one entry and renumber the rest contiguously from 1.
    ///
    /// Invalidates any outstanding preview for the job.
    pub fn delete_entry(&self, job_id: &str, index: usize) -> Result<(), JobError> {
        let applied = self
            .store
            .update(job_id, |record| {
                match record.phase {
                    JobPhase::Completed | JobPhase::Burned => {}
                    phase => {
                        return Err(JobError::PhaseConflict {
                            id: record.id.clone(),
                            phase: phase.to_string(),
                            action: "delete entry",
                        });
                    }
                }
                let before = record.entries.len();
                record.entries.retain(|e| e.index != index);
                if record.entries.len() == before {
                    return Err(crate::errors::RetranslationRejected::UnknownIndex(index).into());
                }
                for (i, entry) in record.entries.iter_mut().enumerate() {
                    entry.index = i + 1;
                }
                Ok(())
            })
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        applied?;
        self.retranslation.invalidate(job_id);
        Ok(())
    }

    /// Path of a produced artifact by kind
    pub fn artifact_path(&self, job_id: &str, kind: ArtifactKind) -> Result<PathBuf, JobError> {
        let record = self
            .store
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        record
            .output_files
            .get(&kind)
            .cloned()
            .ok_or_else(|| JobError::ArtifactUnavailable(kind.to_string(), job_id.to_string()))
    }

    /// Delete a job; the record, channel and token go together.
    ///
    /// Returns false for an unknown id. An in-flight run is not aborted,
    /// it stops cooperatively at its next stage boundary.
    pub fn delete_job(&self, job_id: &str) -> bool {
        self.retranslation.invalidate(job_id);
        self.tasks.lock().remove(job_id);
        self.store.remove(job_id)
    }

    /// Direct store access for integration tests and embedding callers
    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }
}
