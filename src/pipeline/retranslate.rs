use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::collaborators::{RetranslatePair, Translator};
use crate::errors::{JobError, RetranslationRejected};
use crate::jobs::record::JobPhase;
use crate::jobs::store::JobStore;
use crate::subtitles::BilingualEntry;

// @module: Preview/commit coordination for partial retranslation

/// An uncommitted alternate translation for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewItem {
    /// Entry index within the job
    pub index: usize,
    /// Original (source-language) text
    pub original_text: String,
    /// Translated text at request time
    pub before_text: String,
    /// Newly produced translation
    pub after_text: String,
}

/// Which side of a preview item a commit keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    /// Keep the translation the entry had when the preview was taken
    Before,
    /// Adopt the newly produced translation
    After,
}

/// Coordinates non-committing retranslation previews and their commits.
///
/// The latest preview set per job lives here, not in the job record: it is
/// ephemeral, replaced by any newer preview and invalidated by entry edits
/// or deletions. A commit runs entirely inside one atomic store update, so
/// it can reliably observe (and reject on) a burn that started concurrently.
pub struct RetranslationCoordinator {
    store: Arc<JobStore>,
    translator: Arc<dyn Translator>,
    previews: RwLock<HashMap<String, HashMap<usize, PreviewItem>>>,
}

impl RetranslationCoordinator {
    /// Create a coordinator over the store and the translation collaborator
    pub fn new(store: Arc<JobStore>, translator: Arc<dyn Translator>) -> Self {
        Self {
            store,
            translator,
            previews: RwLock::new(HashMap::new()),
        }
    }

    /// Produce a preview of alternate translations for the selected entries.
    ///
    /// Never mutates the job record. Any prior preview for the job is
    /// discarded, whether or not this call succeeds.
    pub async fn preview(
        &self,
        job_id: &str,
        selected_indices: &[usize],
        context: &str,
    ) -> Result<Vec<PreviewItem>, JobError> {
        let record = self
            .store
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        match record.phase {
            JobPhase::Completed | JobPhase::Burned => {}
            JobPhase::Burning => {
                return Err(RetranslationRejected::BurnInProgress.into());
            }
            phase => {
                return Err(RetranslationRejected::EntriesUnavailable(phase.to_string()).into());
            }
        }

        // No accumulation: a new request supersedes whatever was pending
        self.previews.write().remove(job_id);

        let mut pairs = Vec::with_capacity(selected_indices.len());
        for &index in selected_indices {
            let entry = record
                .entries
                .iter()
                .find(|e| e.index == index)
                .ok_or(RetranslationRejected::UnknownIndex(index))?;
            pairs.push(RetranslatePair {
                index,
                original_text: entry.original_text.clone(),
                current_text: entry.translated_text.clone(),
            });
        }

        let results = self
            .translator
            .retranslate(
                &pairs,
                context,
                &record.inputs.source_lang,
                &record.inputs.target_lang,
            )
            .await?;

        let mut items: Vec<PreviewItem> = Vec::with_capacity(results.len());
        for (index, after_text) in results {
            if let Some(pair) = pairs.iter().find(|p| p.index == index) {
                items.push(PreviewItem {
                    index,
                    original_text: pair.original_text.clone(),
                    before_text: pair.current_text.clone(),
                    after_text,
                });
            }
        }
        items.sort_by_key(|item| item.index);

        let set: HashMap<usize, PreviewItem> =
            items.iter().map(|item| (item.index, item.clone())).collect();
        self.previews.write().insert(job_id.to_string(), set);
        info!(
            "Job {}: previewed {} of {} requested entries",
            job_id,
            items.len(),
            selected_indices.len()
        );

        Ok(items)
    }

    /// Merge a client's choices back into the job's entries.
    ///
    /// Runs inside one atomic store update: rejected without any change if
    /// the job has moved into `Burning`, or if any chosen index is absent
    /// from the latest preview. The preview set is consumed on success and
    /// kept on rejection so the client can retry.
    pub fn commit(
        &self,
        job_id: &str,
        choices: &HashMap<usize, Choice>,
    ) -> Result<Vec<BilingualEntry>, JobError> {
        let previews = self.previews.read();
        let set = previews
            .get(job_id)
            .ok_or(RetranslationRejected::NoPreview)?;
        for index in choices.keys() {
            if !set.contains_key(index) {
                return Err(RetranslationRejected::StaleIndex(*index).into());
            }
        }

        let applied = self
            .store
            .update(job_id, |record| {
                if record.phase == JobPhase::Burning {
                    return Err(RetranslationRejected::BurnInProgress);
                }
                for (index, choice) in choices {
                    let item = &set[index];
                    let entry = record
                        .entries
                        .iter_mut()
                        .find(|e| e.index == *index)
                        .ok_or(RetranslationRejected::StaleIndex(*index))?;
                    entry.translated_text = match choice {
                        Choice::Before => item.before_text.clone(),
                        Choice::After => item.after_text.clone(),
                    };
                }
                Ok(record.entries.clone())
            })
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        drop(previews);

        match applied {
            Ok(entries) => {
                self.previews.write().remove(job_id);
                info!("Job {}: committed {} choices", job_id, choices.len());
                Ok(entries)
            }
            Err(rejection) => {
                debug!("Job {}: commit rejected: {}", job_id, rejection);
                Err(rejection.into())
            }
        }
    }

    /// Drop any outstanding preview for a job.
    ///
    /// Called when an entry is edited or deleted, and when the job goes
    /// away.
    pub fn invalidate(&self, job_id: &str) {
        if self.previews.write().remove(job_id).is_some() {
            debug!("Job {}: preview invalidated", job_id);
        }
    }
}
