//! REST server for profiling OCR-corrected books.
//!
//! Configuration comes from flags or the environment (see `--help`); a
//! `.env` file in the working directory is honoured.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ocr_profiler_core::{PgProfileStore, ProcessEngine, Profiler};
use ocr_profiler_server::config::Args;
use ocr_profiler_server::router::build_router;
use ocr_profiler_server::state::AppState;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.default_log_filter())),
        )
        .init();

    let store = PgProfileStore::connect(&args.database_url, args.max_connections)
        .await
        .context("cannot connect to database")?;
    store
        .ensure_schema()
        .await
        .context("cannot create schema")?;

    let profiler = Profiler::new(
        Arc::new(store),
        Arc::new(ProcessEngine::new(&args.profiler)),
        &args.project_dir,
        &args.language_dir,
    )
    .with_cutoff(args.cutoff);
    info!(
        project_dir = %args.project_dir.display(),
        language_dir = %args.language_dir.display(),
        profiler = %args.profiler.display(),
        cutoff = args.cutoff,
        "profiler configured"
    );

    let app = build_router(AppState::new(profiler));
    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to bind to {}", args.listen))?;
    info!("ocr-profiler-server listening on {}", args.listen);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
