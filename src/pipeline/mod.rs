/*!
 * Pipeline execution: the per-job stage driver and the retranslation
 * coordinator.
 *
 * One spawned task per executor run drives a job through its stages,
 * writing phase, percent and step back to the store and publishing the
 * matching event after every successful atomic update. The coordinator
 * operates on a completed job's entries independently of the executor.
 */

pub mod executor;
pub mod retranslate;

pub use executor::PipelineExecutor;
pub use retranslate::{Choice, PreviewItem, RetranslationCoordinator};
