use log::debug;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;

use super::record::JobPhase;
use crate::errors::StageFailure;

// @module: Per-job progress event channel

/// One progress event, serialized with a tagged `event` field on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A stage advanced
    Progress {
        status: JobPhase,
        progress: u8,
        current_step: Option<String>,
        message: String,
    },
    /// Acquisition finished; the pipeline is paused awaiting resume
    DownloadComplete {
        status: JobPhase,
        progress: u8,
        current_step: Option<String>,
        message: String,
    },
    /// Terminal success
    Complete { status: JobPhase, progress: u8 },
    /// Terminal failure
    Error {
        code: String,
        message: String,
        detail: Option<String>,
    },
    /// Keep-alive emitted on an idle timer so proxies see a live connection
    Ping,
}

impl JobEvent {
    /// Build a progress event from the values just written to the record
    pub fn progress(phase: JobPhase, progress: u8, step: &str, message: &str) -> Self {
        JobEvent::Progress {
            status: phase,
            progress,
            current_step: Some(step.to_string()),
            message: message.to_string(),
        }
    }

    /// Build the pause-point event
    pub fn download_complete(progress: u8, step: &str, message: &str) -> Self {
        JobEvent::DownloadComplete {
            status: JobPhase::DownloadComplete,
            progress,
            current_step: Some(step.to_string()),
            message: message.to_string(),
        }
    }

    /// Build a terminal success event
    pub fn complete(phase: JobPhase) -> Self {
        JobEvent::Complete {
            status: phase,
            progress: 100,
        }
    }

    /// Build a terminal failure event from a captured stage failure
    pub fn error(failure: &StageFailure) -> Self {
        JobEvent::Error {
            code: failure.code.clone(),
            message: failure.message.clone(),
            detail: failure.detail.clone(),
        }
    }

    /// Whether the stream closes after delivering this event
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Complete { .. } | JobEvent::Error { .. })
    }
}

/// Single-producer event channel for one job.
///
/// Delivery is fire-and-forget: publishing with no attached consumer drops
/// the event, and nothing is replayed to a late subscriber. A reconnecting
/// client reconciles through a status query instead. At most one consumer
/// is active by convention; a newer subscription supersedes an older one,
/// which only observes lag or closure.
#[derive(Debug)]
pub struct EventChannel {
    sender: broadcast::Sender<JobEvent>,
    keepalive: Duration,
}

impl EventChannel {
    /// Create a channel with a bounded buffer for the active consumer
    pub fn new(capacity: usize, keepalive: Duration) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, keepalive }
    }

    /// Publish an event; silently dropped when no consumer is attached
    pub fn publish(&self, event: JobEvent) {
        if self.sender.send(event).is_err() {
            debug!("No consumer attached, event dropped");
        }
    }

    /// Attach a consumer starting from the events published after this call
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            keepalive: self.keepalive,
            closed: false,
        }
    }
}

/// Consumer side of a job's event channel.
///
/// Closes itself after yielding a terminal event; `next()` then returns
/// `None` forever.
pub struct EventStream {
    receiver: broadcast::Receiver<JobEvent>,
    keepalive: Duration,
    closed: bool,
}

impl EventStream {
    /// Wait for the next event, yielding `Ping` when idle for the
    /// keep-alive interval
    pub async fn next(&mut self) -> Option<JobEvent> {
        if self.closed {
            return None;
        }
        loop {
            match tokio::time::timeout(self.keepalive, self.receiver.recv()).await {
                Ok(Ok(event)) => {
                    if event.is_terminal() {
                        self.closed = true;
                    }
                    return Some(event);
                }
                // Overrun events are gone for good; the consumer falls back
                // to a status query to reconcile
                Ok(Err(broadcast::error::RecvError::Lagged(missed))) => {
                    debug!("Event consumer lagged, {} events dropped", missed);
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    self.closed = true;
                    return None;
                }
                Err(_) => return Some(JobEvent::Ping),
            }
        }
    }

    /// Whether a terminal event has been delivered
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
