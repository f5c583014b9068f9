//! REST surface of the OCR profiler: job submission and status, profile
//! download, and the per-book suggestion queries.

pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod router;
pub mod state;
