//! Router construction for the profiler server.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let profile = Router::new()
        .route("/languages", get(handlers::languages::list_languages))
        .route("/books/:bid", get(handlers::profile::get_profile))
        // older clients submit with GET
        .route(
            "/jobs/books/:bid",
            get(handlers::jobs::start_job).post(handlers::jobs::start_job),
        )
        .route(
            "/jobs/:jid",
            get(handlers::jobs::job_status).delete(handlers::jobs::cancel_job),
        )
        .route("/patterns/books/:bid", get(handlers::queries::patterns))
        .route("/suspicious/books/:bid", get(handlers::queries::suspicious))
        .route("/adaptive/books/:bid", get(handlers::queries::adaptive));

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/profile", profile)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
