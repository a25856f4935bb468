use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use uuid::Uuid;

use crate::refine::{RefinementLoop, RefinementRequest};
use quill_core::{Attempt, ValidationLoopResult};

/// Opaque handle for a submitted refinement job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(formatter)
    }
}

/// Lifecycle of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Cancelled,
}

impl JobState {
    /// Whether the job can still make progress.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

/// Polling snapshot of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    /// Job handle
    pub id: JobId,
    /// Current lifecycle state
    pub state: JobState,
    /// Attempts finished so far
    pub attempts_completed: u32,
    /// Loop outcome, present once the job reaches a terminal state
    pub result: Option<ValidationLoopResult>,
}

struct JobEntry {
    record: JobRecord,
    cancel: Arc<AtomicBool>,
}

/// Runs refinement requests as background tasks with polling and
/// best-effort cancellation.
///
/// Cancellation is only observed between attempts, so a job always
/// completes at least the attempt in flight when it was cancelled.
#[derive(Clone)]
pub struct JobRegistry {
    refinement: Arc<RefinementLoop>,
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
}

impl JobRegistry {
    /// Creates a registry running jobs against the given refinement loop.
    #[must_use]
    pub fn new(refinement: Arc<RefinementLoop>) -> Self {
        Self {
            refinement,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Submits a refinement request and returns its handle immediately.
    pub fn submit(&self, request: RefinementRequest) -> JobId {
        let id = JobId::new();
        let cancel = Arc::new(AtomicBool::new(false));

        if let Ok(mut guard) = self.jobs.write() {
            guard.insert(
                id,
                JobEntry {
                    record: JobRecord {
                        id,
                        state: JobState::Queued,
                        attempts_completed: 0,
                        result: None,
                    },
                    cancel: Arc::clone(&cancel),
                },
            );
        }

        let refinement = Arc::clone(&self.refinement);
        let jobs = Arc::clone(&self.jobs);

        tokio::spawn(async move {
            Self::set_state(&jobs, id, JobState::Running);

            let progress = Arc::clone(&jobs);
            let on_attempt = move |attempt: &Attempt| {
                if let Ok(mut guard) = progress.write() {
                    if let Some(entry) = guard.get_mut(&id) {
                        entry.record.attempts_completed = attempt.number;
                    }
                }
            };

            let result = refinement
                .run_with_cancel(request, Some(&on_attempt), &cancel)
                .await;

            if let Ok(mut guard) = jobs.write() {
                if let Some(entry) = guard.get_mut(&id) {
                    entry.record.state = if cancel.load(Ordering::Relaxed) {
                        JobState::Cancelled
                    } else {
                        JobState::Completed
                    };
                    entry.record.result = Some(result);
                }
            }
        });

        id
    }

    /// Gets a snapshot of the job, or `None` for an unknown handle.
    #[must_use]
    pub fn status(&self, id: JobId) -> Option<JobRecord> {
        self.jobs
            .read()
            .ok()
            .and_then(|guard| guard.get(&id).map(|entry| entry.record.clone()))
    }

    /// Requests cancellation of an active job.
    ///
    /// Returns `false` for an unknown handle or a job already in a
    /// terminal state. The in-flight attempt still runs to completion.
    pub fn cancel(&self, id: JobId) -> bool {
        let Ok(guard) = self.jobs.read() else {
            return false;
        };
        match guard.get(&id) {
            Some(entry) if entry.record.state.is_active() => {
                entry.cancel.store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    fn set_state(jobs: &RwLock<HashMap<JobId, JobEntry>>, id: JobId, state: JobState) {
        if let Ok(mut guard) = jobs.write() {
            if let Some(entry) = guard.get_mut(&id) {
                entry.record.state = state;
            }
        }
    }
}
