//! Language configurations available to the profiler.
//!
//! Each `<name>.ini` file in the language directory is one configuration;
//! the file stem is the language name.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::LanguageError;

const CONFIG_EXTENSION: &str = "ini";

/// A language the engine can profile, with the path to its resources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LanguageConfig {
    pub language: String,
    pub path: PathBuf,
}

/// List all configurations in `dir`, sorted by language name.
pub fn list_languages(dir: &Path) -> Result<Vec<LanguageConfig>, LanguageError> {
    let io_err = |source| LanguageError::Io {
        dir: dir.to_path_buf(),
        source,
    };
    let mut configs = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(CONFIG_EXTENSION) {
            continue;
        }
        if let Some(language) = path.file_stem().and_then(|s| s.to_str()) {
            configs.push(LanguageConfig {
                language: language.to_string(),
                path: path.clone(),
            });
        }
    }
    configs.sort_by(|a, b| a.language.cmp(&b.language));
    Ok(configs)
}

/// Find the configuration for `language` (exact, case-sensitive).
pub fn find_language(dir: &Path, language: &str) -> Result<LanguageConfig, LanguageError> {
    list_languages(dir)?
        .into_iter()
        .find(|c| c.language == language)
        .ok_or_else(|| LanguageError::NotFound(language.to_string()))
}
