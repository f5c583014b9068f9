use std::sync::Arc;

use ocr_profiler_core::Profiler;

use crate::jobs::JobRegistry;

/// Shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub profiler: Profiler,
    pub jobs: Arc<JobRegistry>,
}

impl AppState {
    pub fn new(profiler: Profiler) -> Self {
        Self {
            profiler,
            jobs: JobRegistry::new(),
        }
    }
}
