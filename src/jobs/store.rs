use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::events::EventChannel;
use super::record::{JobInputs, JobRecord};

/// Everything kept per job id.
///
/// The event channel and the cancellation token live beside the record so
/// that deletion and TTL eviction tear all three down in one operation.
struct JobSlot {
    record: JobRecord,
    events: Arc<EventChannel>,
    cancel: CancellationToken,
}

/// Concurrency-safe keyed storage for job records with TTL eviction.
///
/// Mutation goes through `update`, which applies a closure under the write
/// lock; that serializes all writers, so a burn-start and a retranslation
/// commit against the same record can never interleave. Reads take the read
/// lock and clone a snapshot, observing either the pre- or post-mutation
/// state, never a partial write. The backing map is never exposed.
pub struct JobStore {
    slots: RwLock<HashMap<String, JobSlot>>,
    ttl: Duration,
    event_capacity: usize,
    keepalive: Duration,
}

impl JobStore {
    /// Create an empty store
    pub fn new(ttl: Duration, event_capacity: usize, keepalive: Duration) -> Self {
        JobStore {
            slots: RwLock::new(HashMap::new()),
            ttl,
            event_capacity,
            keepalive,
        }
    }

    /// Create a new record in `Pending` and return a snapshot of it
    pub fn create(&self, inputs: JobInputs) -> JobRecord {
        let record = JobRecord::new(inputs, self.ttl);
        let snapshot = record.clone();
        let slot = JobSlot {
            record,
            events: Arc::new(EventChannel::new(self.event_capacity, self.keepalive)),
            cancel: CancellationToken::new(),
        };
        self.slots.write().insert(snapshot.id.clone(), slot);
        info!("Job created: {}", snapshot.id);
        snapshot
    }

    /// Snapshot a record by id
    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.slots.read().get(id).map(|slot| slot.record.clone())
    }

    /// Apply a mutator to a record atomically with respect to other writers.
    ///
    /// Returns `None` when the id is absent, which is how an executor whose
    /// record was evicted learns to stop: its writes are dropped silently.
    pub fn update<F, T>(&self, id: &str, mutator: F) -> Option<T>
    where
        F: FnOnce(&mut JobRecord) -> T,
    {
        let mut slots = self.slots.write();
        match slots.get_mut(id) {
            Some(slot) => Some(mutator(&mut slot.record)),
            None => {
                debug!("Update dropped, job {} is gone", id);
                None
            }
        }
    }

    /// Delete a record, cancelling its executor's token
    pub fn remove(&self, id: &str) -> bool {
        match self.slots.write().remove(id) {
            Some(slot) => {
                slot.cancel.cancel();
                info!("Job removed: {}", id);
                true
            }
            None => false,
        }
    }

    /// The event channel for a job, shared with the executor and consumers
    pub fn events(&self, id: &str) -> Option<Arc<EventChannel>> {
        self.slots.read().get(id).map(|slot| slot.events.clone())
    }

    /// The cooperative cancellation token for a job's executor
    pub fn cancel_token(&self, id: &str) -> Option<CancellationToken> {
        self.slots.read().get(id).map(|slot| slot.cancel.clone())
    }

    /// Remove every record whose TTL elapsed at `now`, returning their ids.
    ///
    /// Expiry is measured from creation, not last write: a long-running job
    /// can be evicted out from under its in-flight task, whose later writes
    /// then miss and are dropped.
    pub fn sweep_expired(&self, now: Instant) -> Vec<String> {
        let mut slots = self.slots.write();
        let expired: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.record.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(slot) = slots.remove(id) {
                slot.cancel.cancel();
            }
        }
        if !expired.is_empty() {
            info!("Swept {} expired jobs", expired.len());
        }
        expired
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Spawn the periodic expiry sweep, independent of job activity
    pub fn spawn_sweeper(store: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh store
            // is not swept before any job had a chance to run
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.sweep_expired(Instant::now());
            }
        })
    }
}
