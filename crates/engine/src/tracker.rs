// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide job registry.
//!
//! A façade: it performs no work itself. Runs register here, hosts
//! subscribe to the event stream to render progress, and cancellation
//! flows through the stored token. Records live only for the process
//! lifetime; nothing is persisted.

use chrono::{DateTime, Utc};
use fanout_core::{Clock, JobId, JobProgress, SystemClock};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const PREVIEW_MAX_CHARS: usize = 120;

/// Lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

fanout_core::simple_display! {
    JobStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Snapshot of one tracked job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    /// What kind of run this is (e.g. "pipeline", "map-reduce").
    pub kind: String,
    pub name: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Events emitted on every transition.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    Started { id: JobId },
    Progressed { id: JobId, progress: JobProgress },
    Completed { id: JobId },
    Failed { id: JobId, error: String },
    Cancelled { id: JobId },
}

struct Tracked {
    record: JobRecord,
    cancel: CancellationToken,
}

/// The registry. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct JobTracker<C: Clock = SystemClock> {
    jobs: Arc<Mutex<HashMap<JobId, Tracked>>>,
    events: broadcast::Sender<TrackerEvent>,
    clock: C,
}

impl JobTracker<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for JobTracker<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> JobTracker<C> {
    pub fn with_clock(clock: C) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            events,
            clock,
        }
    }

    /// Register a new running job. Returns its cancellation token; wire
    /// it into the run's `JobOptions`.
    pub fn register(
        &self,
        id: JobId,
        kind: impl Into<String>,
        name: impl Into<String>,
        prompt_preview: Option<&str>,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        let record = JobRecord {
            id,
            kind: kind.into(),
            name: name.into(),
            status: JobStatus::Running,
            started_at: self.clock.utc(),
            ended_at: None,
            prompt_preview: prompt_preview.map(preview),
            result_preview: None,
            error: None,
        };
        self.jobs.lock().insert(id, Tracked { record, cancel: cancel.clone() });
        self.emit(TrackerEvent::Started { id });
        cancel
    }

    /// Forward a progress event for a running job.
    pub fn progressed(&self, id: JobId, progress: JobProgress) {
        self.emit(TrackerEvent::Progressed { id, progress });
    }

    pub fn complete(&self, id: JobId, result_preview: Option<&str>) {
        self.finish(id, JobStatus::Completed, None, result_preview);
        self.emit(TrackerEvent::Completed { id });
    }

    pub fn fail(&self, id: JobId, error: impl Into<String>) {
        let error = error.into();
        self.finish(id, JobStatus::Failed, Some(error.clone()), None);
        self.emit(TrackerEvent::Failed { id, error });
    }

    /// Cancel a running job. Idempotent: cancelling a finished or already
    /// cancelled job does nothing and returns false.
    pub fn cancel(&self, id: JobId) -> bool {
        let cancelled = {
            let mut jobs = self.jobs.lock();
            match jobs.get_mut(&id) {
                Some(tracked) if tracked.record.status == JobStatus::Running => {
                    tracked.record.status = JobStatus::Cancelled;
                    tracked.record.ended_at = Some(self.clock.utc());
                    tracked.cancel.cancel();
                    true
                }
                _ => false,
            }
        };
        if cancelled {
            self.emit(TrackerEvent::Cancelled { id });
        }
        cancelled
    }

    pub fn record(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.lock().get(&id).map(|t| t.record.clone())
    }

    /// All records, newest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> =
            self.jobs.lock().values().map(|t| t.record.clone()).collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }

    /// Subscribe to transition events.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    /// Drop terminal records, keeping running ones.
    pub fn prune_finished(&self) {
        self.jobs.lock().retain(|_, t| !t.record.status.is_terminal());
    }

    fn finish(
        &self,
        id: JobId,
        status: JobStatus,
        error: Option<String>,
        result_preview: Option<&str>,
    ) {
        let mut jobs = self.jobs.lock();
        if let Some(tracked) = jobs.get_mut(&id) {
            // running → terminal only; late completions after a cancel
            // are ignored
            if tracked.record.status != JobStatus::Running {
                return;
            }
            tracked.record.status = status;
            tracked.record.ended_at = Some(self.clock.utc());
            tracked.record.error = error;
            tracked.record.result_preview = result_preview.map(preview);
        }
    }

    fn emit(&self, event: TrackerEvent) {
        // No subscribers is fine; events are fire-and-forget.
        let _ = self.events.send(event);
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > PREVIEW_MAX_CHARS {
        let mut truncated: String = s.chars().take(PREVIEW_MAX_CHARS - 1).collect();
        truncated.push('…');
        truncated
    } else {
        s.to_string()
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
