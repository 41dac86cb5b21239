/*!
 * Common test utilities for the bisub test suite
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use bisub::app_config::Config;
use bisub::jobs::record::{JobInputs, JobPhase, SourceRef};
use bisub::orchestrator::Orchestrator;
use bisub::subtitles::BilingualEntry;

// Re-export the mock collaborators module
pub mod mocks;

use mocks::{ApiCallTracker, FailPoint};

/// Initialize captured logging once for the whole suite
pub fn init_test_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// A test configuration with a short keep-alive and a generous TTL
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.source_language = "en".to_string();
    config.target_language = "fr".to_string();
    config.jobs.ttl_secs = 300;
    config.jobs.sweep_interval_secs = 60;
    config.jobs.keepalive_secs = 1;
    config
}

/// Standard remote-source inputs used by most tests
pub fn remote_inputs() -> JobInputs {
    JobInputs {
        source: SourceRef::RemoteUrl {
            url: "https://example.com/video.mp4".to_string(),
        },
        trim: None,
        source_lang: "en".to_string(),
        target_lang: "fr".to_string(),
    }
}

/// Build an orchestrator wired to mock collaborators
pub fn test_orchestrator(fail: FailPoint) -> (Orchestrator, Arc<StdMutex<ApiCallTracker>>) {
    init_test_logging();
    let (collaborators, tracker) = mocks::mock_collaborators(fail);
    (Orchestrator::new(test_config(), collaborators), tracker)
}

/// Poll a job's status until it reaches `phase`, panicking after 5 seconds
pub async fn wait_for_phase(orchestrator: &Orchestrator, job_id: &str, phase: JobPhase) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(status) = orchestrator.get_status(job_id) {
            if status.status == phase {
                return;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for job {} to reach {}", job_id, phase);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Drive a freshly created job through the pause point to completion
pub async fn drive_to_completion(orchestrator: &Orchestrator, job_id: &str) {
    wait_for_phase(orchestrator, job_id, JobPhase::DownloadComplete).await;
    orchestrator.resume(job_id).expect("resume should be accepted at the pause point");
    wait_for_phase(orchestrator, job_id, JobPhase::Completed).await;
}

/// Seed a completed job holding the given translated/original text pairs,
/// bypassing the pipeline
pub fn seed_completed_job(orchestrator: &Orchestrator, texts: &[(&str, &str)]) -> String {
    let record = orchestrator.store().create(remote_inputs());
    let entries: Vec<BilingualEntry> = texts
        .iter()
        .enumerate()
        .map(|(i, (translated, original))| {
            BilingualEntry::new(
                i + 1,
                (i as u64) * 2000,
                (i as u64) * 2000 + 1500,
                translated.to_string(),
                original.to_string(),
            )
        })
        .collect();

    orchestrator.store().update(&record.id, |r| {
        r.phase = JobPhase::Completed;
        r.progress_percent = 100;
        r.entries = entries;
    });

    record.id
}

/// Entries as a `index -> translated_text` map, for compact assertions
pub fn translated_by_index(entries: &[BilingualEntry]) -> HashMap<usize, String> {
    entries
        .iter()
        .map(|e| (e.index, e.translated_text.clone()))
        .collect()
}
