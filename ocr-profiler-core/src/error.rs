use std::path::PathBuf;

use thiserror::Error;

use crate::types::BookId;

/// Language configuration lookup failures.
#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("no such language: {0}")]
    NotFound(String),

    #[error("cannot read language directory {}: {source}", .dir.display())]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the external profiling engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot start profiler {}: {source}", .exe.display())]
    Spawn {
        exe: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("profiler i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("profiler exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("cannot decode profiler output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("profiling cancelled")]
    Cancelled,
}

/// Database failures. The ingestion transaction is rolled back on any of them.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("book {0} not found")]
    BookNotFound(BookId),

    #[error("database: {0}")]
    Backend(#[from] anyhow::Error),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Backend(e.into())
    }
}

/// Failures writing or reading the compressed profile blob.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("profile archive {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode profile: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no profile for book {0}")]
    Missing(BookId),
}

/// Everything a profiling job or a query can fail with.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Language(#[from] LanguageError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl ProfileError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Language(LanguageError::NotFound(_)) => 404,
            Self::Storage(StorageError::BookNotFound(_)) => 404,
            Self::Archive(ArchiveError::Missing(_)) => 404,
            _ => 500,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Engine(EngineError::Cancelled))
    }
}

pub type Result<T, E = ProfileError> = std::result::Result<T, E>;
