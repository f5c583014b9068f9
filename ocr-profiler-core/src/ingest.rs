//! Transactional write path from an engine [`Profile`] into the relational
//! store.
//!
//! One call to [`ingest`] is one transaction: the book's previous
//! suggestions, patterns and type counts are removed and the new ones
//! inserted, or nothing changes at all.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::store::{IngestTx, NewSuggestion, ProfileStore};
use crate::types::{BookId, BookStatus, Candidate, Pattern, Profile, TypeId};

/// Interning of surface strings for the lifetime of one ingestion.
///
/// Strings already seen are answered from the cache; the rest are upserted
/// through the transaction, so an id is valid whether the type is new or
/// was created by an earlier run.
#[derive(Debug, Default)]
pub struct InternSession {
    cache: HashMap<String, TypeId>,
}

impl InternSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &mut self,
        tx: &mut dyn IngestTx,
        typ: &str,
    ) -> Result<TypeId, StorageError> {
        if let Some(id) = self.cache.get(typ) {
            return Ok(*id);
        }
        let id = tx.upsert_type(typ).await?;
        self.cache.insert(typ.to_string(), id);
        Ok(id)
    }

    /// Distinct strings resolved so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// What one ingestion wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub book_id: BookId,
    /// OCR types with at least one candidate.
    pub types: usize,
    pub suggestions: usize,
    /// Candidates dropped by the weight cutoff.
    pub skipped: usize,
    pub patterns: usize,
    pub status_advanced: bool,
}

/// Replace the stored profile of `profile.book_id` with `profile`.
///
/// Candidates with `weight <= cutoff` are not stored.
pub async fn ingest(
    store: &dyn ProfileStore,
    profile: &Profile,
    cutoff: f64,
) -> Result<IngestSummary, StorageError> {
    let book_id = profile.book_id;
    let mut tx = store.begin().await?;
    let mut interned = InternSession::new();
    let mut summary = IngestSummary {
        book_id,
        ..Default::default()
    };

    tx.clear_book(book_id).await?;

    // BTreeMap: sorted by OCR string
    for interp in profile.profile.values() {
        if interp.candidates.is_empty() {
            continue;
        }
        let token_type = interned.resolve(tx.as_mut(), &interp.ocr).await?;
        tx.add_type_count(token_type, book_id, interp.n).await?;
        summary.types += 1;

        for (rank, candidate) in interp.candidates.iter().enumerate() {
            if candidate.weight <= cutoff {
                summary.skipped += 1;
                continue;
            }
            summary.patterns += insert_candidate(
                tx.as_mut(),
                &mut interned,
                book_id,
                token_type,
                candidate,
                rank == 0,
            )
            .await?;
            summary.suggestions += 1;
        }
    }

    summary.status_advanced = tx.advance_status(book_id, BookStatus::Profiled).await?;
    tx.commit().await?;

    info!(
        book_id,
        types = summary.types,
        suggestions = summary.suggestions,
        skipped = summary.skipped,
        patterns = summary.patterns,
        status_advanced = summary.status_advanced,
        interned = interned.len(),
        "profile ingested"
    );
    Ok(summary)
}

/// Insert one suggestion and its patterns. Returns the number of patterns.
async fn insert_candidate(
    tx: &mut dyn IngestTx,
    interned: &mut InternSession,
    book_id: BookId,
    token_type: TypeId,
    candidate: &Candidate,
    top: bool,
) -> Result<usize, StorageError> {
    let suggestion_type = interned.resolve(tx, &candidate.suggestion).await?;
    let modern_type = interned.resolve(tx, &candidate.modern).await?;
    let id = tx
        .insert_suggestion(&NewSuggestion {
            book_id,
            token_type,
            suggestion_type,
            modern_type,
            dict: candidate.dict,
            weight: candidate.weight,
            distance: candidate.distance,
            top,
            hist_patterns: Pattern::join(&candidate.hist_patterns),
            ocr_patterns: Pattern::join(&candidate.ocr_patterns),
        })
        .await?;

    let sides = [(&candidate.hist_patterns, false), (&candidate.ocr_patterns, true)];
    let mut n = 0;
    for (patterns, ocr) in sides {
        for p in patterns {
            tx.insert_pattern(id, book_id, &p.key(), ocr).await?;
            n += 1;
        }
    }
    debug!(book_id, suggestion_id = id, suggestion = %candidate.suggestion, top, patterns = n, "suggestion stored");
    Ok(n)
}
