/*!
 * Job state: records, the keyed store, and per-job event channels.
 *
 * The `record` module defines the job data model and the phase state
 * machine; `store` owns every record and serializes mutation; `events`
 * carries live progress from the executor to at most one consumer.
 */

pub mod events;
pub mod record;
pub mod store;

pub use events::{EventChannel, EventStream, JobEvent};
pub use record::{
    ArtifactKind, JobInputs, JobPhase, JobRecord, JobStatus, SourceRef, TrimWindow,
};
pub use store::JobStore;
