//! In-process job registry.
//!
//! Jobs are identified by a process-local counter and live until the
//! process exits. At most one job per book is running at any time; asking
//! for another returns the running one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use ocr_profiler_core::{cancel_pair, BookId, CancelSignal, ProfileError};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{error, info, warn};

pub type JobId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Done,
    Failed,
    Cancelled,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: JobId,
    pub book_id: BookId,
    pub name: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended: Option<DateTime<Utc>>,
}

struct Entry {
    job: Job,
    cancel: watch::Sender<bool>,
}

#[derive(Default)]
struct Inner {
    last_id: JobId,
    jobs: HashMap<JobId, Entry>,
    running: HashMap<BookId, JobId>,
}

#[derive(Default)]
pub struct JobRegistry {
    inner: Mutex<Inner>,
}

impl JobRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawn `work` for `book_id` unless a job for that book is running.
    /// Returns the id of the job that is now running for the book.
    pub fn start<F, Fut>(self: &Arc<Self>, book_id: BookId, name: &str, work: F) -> JobId
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = Result<(), ProfileError>> + Send + 'static,
    {
        let (job_id, cancel) = {
            let mut inner = self.lock();
            if let Some(id) = inner.running.get(&book_id) {
                info!(job_id = id, book_id, "job already running");
                return *id;
            }
            inner.last_id += 1;
            let job_id = inner.last_id;
            let (tx, rx) = cancel_pair();
            inner.jobs.insert(
                job_id,
                Entry {
                    job: Job {
                        job_id,
                        book_id,
                        name: name.to_string(),
                        status: JobStatus::Running,
                        error: None,
                        started: Utc::now(),
                        ended: None,
                    },
                    cancel: tx,
                },
            );
            inner.running.insert(book_id, job_id);
            (job_id, rx)
        };
        info!(job_id, book_id, name, "job started");

        // the watcher outlives a panicking job and still settles it
        let handle = tokio::spawn(work(cancel));
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            registry.finish(job_id, handle.await);
        });
        job_id
    }

    fn finish(&self, job_id: JobId, res: Result<Result<(), ProfileError>, JoinError>) {
        let mut inner = self.lock();
        let Some(entry) = inner.jobs.get_mut(&job_id) else {
            return;
        };
        let job = &mut entry.job;
        job.ended = Some(Utc::now());
        match res {
            Ok(Ok(())) => {
                job.status = JobStatus::Done;
                info!(job_id, book_id = job.book_id, "job done");
            }
            Ok(Err(e)) if e.is_cancelled() => {
                job.status = JobStatus::Cancelled;
                info!(job_id, book_id = job.book_id, "job cancelled");
            }
            Ok(Err(e)) => {
                warn!(job_id, book_id = job.book_id, error = %e, "job failed");
                job.status = JobStatus::Failed;
                job.error = Some(e.to_string());
            }
            Err(e) if e.is_panic() => {
                error!(job_id, book_id = job.book_id, "job panicked");
                job.status = JobStatus::Failed;
                job.error = Some("job panicked".to_string());
            }
            Err(_) => {
                job.status = JobStatus::Cancelled;
                info!(job_id, book_id = job.book_id, "job aborted");
            }
        }
        let book_id = job.book_id;
        if inner.running.get(&book_id) == Some(&job_id) {
            inner.running.remove(&book_id);
        }
    }

    pub fn get(&self, job_id: JobId) -> Option<Job> {
        self.lock().jobs.get(&job_id).map(|e| e.job.clone())
    }

    /// Signal a running job to stop. The status changes once the job
    /// has actually returned.
    pub fn cancel(&self, job_id: JobId) -> Option<Job> {
        let inner = self.lock();
        let entry = inner.jobs.get(&job_id)?;
        if entry.job.status == JobStatus::Running {
            info!(job_id, book_id = entry.job.book_id, "cancelling job");
            entry.cancel.send_replace(true);
        }
        Some(entry.job.clone())
    }
}
