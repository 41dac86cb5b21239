/*!
 * End-to-end pipeline tests through the orchestrator boundary
 */

use std::time::Duration;

use bisub::errors::JobError;
use bisub::jobs::events::JobEvent;
use bisub::jobs::record::{ArtifactKind, JobPhase};
use bisub::orchestrator::Orchestrator;

use crate::common;
use crate::common::mocks::FailPoint;

/// An immediate status read after creation shows pending or downloading at 0
#[tokio::test]
async fn test_created_job_immediateRead_showsZeroProgress() {
    let (orchestrator, _) = common::test_orchestrator(FailPoint::None);

    let status = orchestrator.create_job(common::remote_inputs()).unwrap();
    assert!(matches!(
        status.status,
        JobPhase::Pending | JobPhase::Downloading
    ));
    assert_eq!(status.progress, 0);

    let read = orchestrator.get_status(&status.job_id).unwrap();
    assert!(matches!(
        read.status,
        JobPhase::Pending | JobPhase::Downloading
    ));
}

/// Bad inputs are rejected before any record exists
#[tokio::test]
async fn test_create_job_withBadInputs_createsNothing() {
    let (orchestrator, _) = common::test_orchestrator(FailPoint::None);

    let mut inputs = common::remote_inputs();
    inputs.trim = Some(bisub::jobs::record::TrimWindow {
        start_ms: 9000,
        end_ms: 3000,
    });
    assert!(matches!(
        orchestrator.create_job(inputs),
        Err(JobError::Validation(_))
    ));
    assert!(orchestrator.store().is_empty());
}

/// The full happy path: pause at download_complete, resume, complete at 100
/// with both subtitle artifact kinds and populated entries
#[tokio::test]
async fn test_full_pipeline_withPauseAndResume_shouldComplete() {
    let (orchestrator, tracker) = common::test_orchestrator(FailPoint::None);
    let job_id = orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;

    common::wait_for_phase(&orchestrator, &job_id, JobPhase::DownloadComplete).await;
    let paused = orchestrator.get_status(&job_id).unwrap();
    assert_eq!(paused.progress, 15);
    assert!(paused.output_files.contains_key(&ArtifactKind::SourceVideo));
    assert!(paused.output_files.contains_key(&ArtifactKind::Audio));

    // Transcription must not have started while paused
    assert_eq!(tracker.lock().unwrap().transcribe_calls, 0);

    orchestrator.resume(&job_id).unwrap();
    common::wait_for_phase(&orchestrator, &job_id, JobPhase::Completed).await;

    let done = orchestrator.get_status(&job_id).unwrap();
    assert_eq!(done.progress, 100);
    assert!(done.error.is_none());
    assert!(done.output_files.contains_key(&ArtifactKind::Srt));
    assert!(done.output_files.contains_key(&ArtifactKind::Ass));

    let entries = orchestrator.entries(&job_id).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].translated_text, "HELLO THERE");
    assert_eq!(entries[0].original_text, "hello there");
    assert_eq!(entries[2].index, 3);

    // The serialized artifact parses back to the stored entries
    let srt_path = orchestrator
        .artifact_path(&job_id, ArtifactKind::Srt)
        .unwrap();
    let content = std::fs::read_to_string(srt_path).unwrap();
    assert_eq!(bisub::formats::srt::parse(&content).unwrap(), entries);
}

/// Progress is monotonically non-decreasing across status reads until the
/// job reaches a terminal phase
#[tokio::test]
async fn test_progress_isMonotonic_acrossTheRun() {
    let (orchestrator, _) = common::test_orchestrator(FailPoint::None);
    let job_id = orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;

    let mut observed = Vec::new();
    let mut resumed = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = orchestrator.get_status(&job_id).unwrap();
        observed.push(status.progress);
        if status.status == JobPhase::DownloadComplete && !resumed {
            orchestrator.resume(&job_id).unwrap();
            resumed = true;
        }
        if status.status.is_terminal() {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("job never reached a terminal phase");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(observed.windows(2).all(|w| w[0] <= w[1]), "{:?}", observed);
    assert_eq!(*observed.last().unwrap(), 100);
}

/// The event stream delivers the pause event and the terminal event in
/// order, then closes itself
#[tokio::test]
async fn test_event_stream_deliversPauseAndTerminal() {
    let (orchestrator, _) = common::test_orchestrator(FailPoint::None);
    let job_id = orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;
    let mut stream = orchestrator.subscribe(&job_id).unwrap();

    let mut saw_pause = false;
    let mut progresses: Vec<u8> = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let event = tokio::time::timeout_at(deadline, stream.next())
            .await
            .expect("timed out waiting for events")
            .expect("stream closed before a terminal event");
        match event {
            JobEvent::Progress { progress, .. } => progresses.push(progress),
            JobEvent::DownloadComplete { progress, .. } => {
                assert_eq!(progress, 15);
                saw_pause = true;
                orchestrator.resume(&job_id).unwrap();
            }
            JobEvent::Complete { status, progress } => {
                assert_eq!(status, JobPhase::Completed);
                assert_eq!(progress, 100);
                break;
            }
            JobEvent::Error { code, .. } => panic!("unexpected error event: {}", code),
            JobEvent::Ping => {}
        }
    }

    assert!(saw_pause);
    assert!(progresses.windows(2).all(|w| w[0] <= w[1]), "{:?}", progresses);
    // Closed after the terminal event
    assert!(stream.next().await.is_none());
}

/// A translation-stage failure fails the job, freezes progress at the last
/// successful value and populates no entries
#[tokio::test]
async fn test_translation_failure_failsJobWithFrozenProgress() {
    let (orchestrator, _) = common::test_orchestrator(FailPoint::Translate);
    let job_id = orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;

    common::wait_for_phase(&orchestrator, &job_id, JobPhase::DownloadComplete).await;
    orchestrator.resume(&job_id).unwrap();
    common::wait_for_phase(&orchestrator, &job_id, JobPhase::Failed).await;

    let status = orchestrator.get_status(&job_id).unwrap();
    assert_eq!(status.progress, 50);
    let error = status.error.expect("failed job keeps its error detail");
    assert_eq!(error.code, "translation_failed");
    assert!(!error.message.is_empty());
    assert!(orchestrator.entries(&job_id).unwrap().is_empty());
}

/// An acquisition failure fails the job before the pause point
#[tokio::test]
async fn test_acquisition_failure_failsJobAtZero() {
    let (orchestrator, _) = common::test_orchestrator(FailPoint::Acquire);
    let job_id = orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;

    common::wait_for_phase(&orchestrator, &job_id, JobPhase::Failed).await;

    let status = orchestrator.get_status(&job_id).unwrap();
    assert_eq!(status.progress, 0);
    assert_eq!(status.error.unwrap().code, "download_failed");
}

/// Resume is only accepted at the pause point
#[tokio::test]
async fn test_resume_outsidePausePoint_isRejected() {
    let (orchestrator, _) = common::test_orchestrator(FailPoint::None);
    let job_id = orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;

    // Too early: still pending or downloading
    assert!(matches!(
        orchestrator.resume(&job_id),
        Err(JobError::PhaseConflict { .. })
    ));

    common::drive_to_completion(&orchestrator, &job_id).await;

    // Too late: already completed
    assert!(matches!(
        orchestrator.resume(&job_id),
        Err(JobError::PhaseConflict { .. })
    ));

    assert!(matches!(
        orchestrator.resume("never-created"),
        Err(JobError::NotFound(_))
    ));
}

/// Deleting a job mid-run: the executor stops writing, nothing panics, and
/// reads report not-found
#[tokio::test]
async fn test_delete_midRun_executorStopsSilently() {
    let (orchestrator, _) = common::test_orchestrator(FailPoint::None);
    let job_id = orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;

    common::wait_for_phase(&orchestrator, &job_id, JobPhase::DownloadComplete).await;
    assert!(orchestrator.delete_job(&job_id));

    assert!(matches!(
        orchestrator.get_status(&job_id),
        Err(JobError::NotFound(_))
    ));
    assert!(matches!(
        orchestrator.resume(&job_id),
        Err(JobError::NotFound(_))
    ));

    // Deleting again reports unknown
    assert!(!orchestrator.delete_job(&job_id));
}

/// A job evicted by the TTL sweep mid-run drops its task's later writes
#[tokio::test]
async fn test_ttl_eviction_midRun_dropsLaterWrites() {
    let mut config = common::test_config();
    config.jobs.ttl_secs = 1;
    let (collaborators, _) = common::mocks::mock_collaborators(FailPoint::None);
    let orchestrator = Orchestrator::new(config, collaborators);

    let job_id = orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;
    common::wait_for_phase(&orchestrator, &job_id, JobPhase::DownloadComplete).await;
    orchestrator.resume(&job_id).unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    let swept = orchestrator.store().sweep_expired(std::time::Instant::now());
    assert!(swept.contains(&job_id));

    // Give the (possibly still running) task a moment, then confirm the
    // record never reappeared
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(
        orchestrator.get_status(&job_id),
        Err(JobError::NotFound(_))
    ));
}

/// Jobs run independently: one job's failure leaves another untouched
#[tokio::test]
async fn test_independent_jobs_doNotInterfere() {
    let (ok_orchestrator, _) = common::test_orchestrator(FailPoint::None);
    let ok_id = ok_orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;
    let other_id = ok_orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;

    common::drive_to_completion(&ok_orchestrator, &ok_id).await;
    common::drive_to_completion(&ok_orchestrator, &other_id).await;

    assert_eq!(
        ok_orchestrator.get_status(&ok_id).unwrap().status,
        JobPhase::Completed
    );
    assert_eq!(
        ok_orchestrator.get_status(&other_id).unwrap().status,
        JobPhase::Completed
    );
}

/// Unknown artifact kinds and absent artifacts surface as typed errors
#[tokio::test]
async fn test_artifact_fetch_coversAbsentKinds() {
    let (orchestrator, _) = common::test_orchestrator(FailPoint::None);
    let job_id = orchestrator
        .create_job(common::remote_inputs())
        .unwrap()
        .job_id;
    common::drive_to_completion(&orchestrator, &job_id).await;

    assert!(orchestrator.artifact_path(&job_id, ArtifactKind::Srt).is_ok());
    // No burn ran, so no video artifact exists
    assert!(matches!(
        orchestrator.artifact_path(&job_id, ArtifactKind::Video),
        Err(JobError::ArtifactUnavailable(_, _))
    ));
    assert!(matches!(
        orchestrator.artifact_path("never-created", ArtifactKind::Srt),
        Err(JobError::NotFound(_))
    ));
}
