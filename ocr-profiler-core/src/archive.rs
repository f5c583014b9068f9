//! Compressed full-fidelity copy of a profile, one per book.
//!
//! The archive keeps candidates the cutoff filters out of the relational
//! rows. It is written to a temporary file next to the destination and
//! renamed into place, so readers never see a partial blob.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use crate::error::ArchiveError;
use crate::types::{Book, Profile};

pub const ARCHIVE_FILE_NAME: &str = "profile.json.gz";

/// `<project_root>/<book directory>/profile.json.gz`
pub fn archive_path(project_root: &Path, book: &Book) -> PathBuf {
    project_root.join(&book.directory).join(ARCHIVE_FILE_NAME)
}

/// Write `profile` as gzip-compressed JSON to `dest`.
pub fn write_profile(dest: &Path, profile: &Profile) -> Result<(), ArchiveError> {
    let write_err = |source| ArchiveError::Io {
        path: dest.to_path_buf(),
        source,
    };
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(write_err)?;

    let tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    let mut gz = GzEncoder::new(BufWriter::new(tmp), Compression::default());
    serde_json::to_writer(&mut gz, profile)?;
    gz.write_all(b"\n").map_err(write_err)?;
    let tmp = gz
        .finish()
        .map_err(write_err)?
        .into_inner()
        .map_err(|e| write_err(e.into_error()))?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(dest).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Raw (still compressed) archive bytes for `book`.
pub async fn read_archive(project_root: &Path, book: &Book) -> Result<Vec<u8>, ArchiveError> {
    let path = archive_path(project_root, book);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ArchiveError::Missing(book.book_id))
        }
        Err(source) => Err(ArchiveError::Io { path, source }),
    }
}
