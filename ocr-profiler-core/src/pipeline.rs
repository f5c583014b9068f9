//! One profiling job from stored rows to ingested suggestions.
//!
//! [`Profiler::prepare`] does the checks a caller must see synchronously
//! (book and language exist). [`Profiler::run`] does the rest and is what a
//! job executes in the background.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::archive::{archive_path, read_archive, write_profile};
use crate::engine::{run_profile, CancelSignal, ProfileEngine};
use crate::error::{ArchiveError, Result};
use crate::ingest::{ingest, IngestSummary};
use crate::language::{find_language, list_languages, LanguageConfig};
use crate::query::require_book;
use crate::store::ProfileStore;
use crate::tokenizer::tokens;
use crate::types::{Book, BookId, Token};

/// Candidates at or below this weight are not stored.
pub const DEFAULT_CUTOFF: f64 = 1e-4;

/// A book that passed the precheck, with its resolved language.
#[derive(Clone, Debug)]
pub struct ProfileJob {
    pub book: Book,
    pub language: LanguageConfig,
}

/// Everything a job needs, shared by all jobs of a process.
#[derive(Clone)]
pub struct Profiler {
    pub store: Arc<dyn ProfileStore>,
    pub engine: Arc<dyn ProfileEngine>,
    pub project_dir: PathBuf,
    pub language_dir: PathBuf,
    pub cutoff: f64,
}

impl Profiler {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        engine: Arc<dyn ProfileEngine>,
        project_dir: impl Into<PathBuf>,
        language_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            engine,
            project_dir: project_dir.into(),
            language_dir: language_dir.into(),
            cutoff: DEFAULT_CUTOFF,
        }
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn languages(&self) -> Result<Vec<LanguageConfig>> {
        Ok(list_languages(&self.language_dir)?)
    }

    /// Resolve the book and its language.
    pub async fn prepare(&self, book_id: BookId) -> Result<ProfileJob> {
        let book = require_book(self.store.as_ref(), book_id).await?;
        let language = find_language(&self.language_dir, &book.lang)?;
        Ok(ProfileJob { book, language })
    }

    /// Tokenize, profile, archive, ingest. Cancellation is honoured until
    /// the engine returns; after that the job runs to completion.
    #[instrument(skip_all, fields(book_id = job.book.book_id))]
    pub async fn run(&self, job: &ProfileJob, cancel: CancelSignal) -> Result<IngestSummary> {
        let book_id = job.book.book_id;
        let rows = self.store.load_chars(book_id).await?;
        let tokens: Vec<Token> = tokens(rows).collect();
        debug!(tokens = tokens.len(), "book tokenized");

        let profile = run_profile(
            self.engine.as_ref(),
            cancel,
            &job.language,
            book_id,
            &tokens,
        )
        .await?;

        let dest = archive_path(&self.project_dir, &job.book);
        let profile = Arc::new(profile);
        let archived = Arc::clone(&profile);
        let path = dest.clone();
        tokio::task::spawn_blocking(move || write_profile(&path, &archived))
            .await
            .map_err(|e| ArchiveError::Io {
                path: dest.clone(),
                source: std::io::Error::other(e),
            })??;
        debug!(path = %dest.display(), "profile archived");

        let summary = ingest(self.store.as_ref(), &profile, self.cutoff).await?;
        info!(suggestions = summary.suggestions, "profiling job finished");
        Ok(summary)
    }

    /// Compressed archive bytes of the book's last profile.
    pub async fn whole_profile(&self, book_id: BookId) -> Result<Vec<u8>> {
        let book = require_book(self.store.as_ref(), book_id).await?;
        Ok(read_archive(&self.project_dir, &book).await?)
    }
}
