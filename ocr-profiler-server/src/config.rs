use std::path::PathBuf;

use clap::Parser;
use ocr_profiler_core::DEFAULT_CUTOFF;

/// OCR profiler REST server
#[derive(Parser, Debug, Clone)]
#[command(name = "ocr-profiler-server")]
#[command(about = "Profile OCR-corrected books and serve correction suggestions")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "OCR_PROFILER_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Root of the per-book project directories
    #[arg(long, env = "OCR_PROFILER_PROJECT_DIR", default_value = "/project-data")]
    pub project_dir: PathBuf,

    /// Directory of the profiler's language configurations (*.ini)
    #[arg(long, env = "OCR_PROFILER_LANGUAGE_DIR", default_value = "/language-data")]
    pub language_dir: PathBuf,

    /// Profiler executable
    #[arg(long, env = "OCR_PROFILER_EXE", default_value = "/apps/profiler")]
    pub profiler: PathBuf,

    /// Candidates at or below this weight are not stored
    #[arg(long, env = "OCR_PROFILER_CUTOFF", default_value_t = DEFAULT_CUTOFF)]
    pub cutoff: f64,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum pooled database connections
    #[arg(long, env = "OCR_PROFILER_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Debug logging for this service
    #[arg(long, short = 'v', alias = "debug")]
    pub verbose: bool,
}

impl Args {
    /// Filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "info,ocr_profiler_server=debug,ocr_profiler_core=debug,tower_http=debug"
        } else {
            "info"
        }
    }
}
