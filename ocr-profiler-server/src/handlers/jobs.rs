//! Profiling jobs.
//!
//! POST|GET /profile/jobs/books/:bid : start (or join) a job for a book
//! GET      /profile/jobs/:jid       : job status
//! DELETE   /profile/jobs/:jid       : cancel a running job

use axum::{
    extract::{Path, State},
    Json,
};
use ocr_profiler_core::BookId;
use serde::Serialize;

use crate::error::AppError;
use crate::jobs::{Job, JobId};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStarted {
    pub job_id: JobId,
}

pub async fn start_job(
    State(state): State<AppState>,
    Path(book_id): Path<BookId>,
) -> Result<Json<JobStarted>, AppError> {
    // unknown book or language fails here, before anything is spawned
    let job = state.profiler.prepare(book_id).await?;
    let profiler = state.profiler.clone();
    let job_id = state.jobs.start(book_id, "profile", move |cancel| async move {
        profiler.run(&job, cancel).await.map(|_| ())
    });
    Ok(Json(JobStarted { job_id }))
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<Job>, AppError> {
    state
        .jobs
        .get(job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<Job>, AppError> {
    state
        .jobs
        .cancel(job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))
}
