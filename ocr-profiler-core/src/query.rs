//! Read-only queries over ingested profiles.
//!
//! Nothing here opens a transaction; every function may be called
//! concurrently with an ingestion of the same book.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::casing::apply_casing;
use crate::error::StorageError;
use crate::store::{ProfileStore, SuggestionRow};
use crate::tokenizer::tokens;
use crate::types::{Book, BookId, Pattern};

type Result<T> = std::result::Result<T, StorageError>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub token: String,
    pub suggestion: String,
    pub modern: String,
    pub dict: bool,
    pub weight: f64,
    pub distance: i32,
    pub top: bool,
    pub hist_patterns: Vec<Pattern>,
    pub ocr_patterns: Vec<Pattern>,
}

impl From<SuggestionRow> for Suggestion {
    fn from(row: SuggestionRow) -> Self {
        Self {
            hist_patterns: Pattern::split(&row.hist_patterns),
            ocr_patterns: Pattern::split(&row.ocr_patterns),
            token: row.token,
            suggestion: row.suggestion,
            modern: row.modern,
            dict: row.dict,
            weight: row.weight,
            distance: row.distance,
            top: row.top,
        }
    }
}

impl Suggestion {
    /// Copy the casing of `model` onto every surface form.
    fn cased_like(mut self, model: &str) -> Self {
        self.token = apply_casing(model, &self.token);
        self.suggestion = apply_casing(model, &self.suggestion);
        self.modern = apply_casing(model, &self.modern);
        self
    }
}

/// Suggestions keyed by the query string as it was asked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    pub book_id: BookId,
    pub suggestions: BTreeMap<String, Vec<Suggestion>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternCounts {
    pub book_id: BookId,
    pub ocr: bool,
    pub counts: BTreeMap<String, u64>,
}

/// Suggestions keyed by pattern.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patterns {
    pub book_id: BookId,
    pub ocr: bool,
    pub patterns: BTreeMap<String, Vec<Suggestion>>,
}

/// Answer of [`patterns`]: a tally without keys, a lookup with them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternQuery {
    Counts(PatternCounts),
    Suggestions(Patterns),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousWords {
    pub book_id: BookId,
    pub counts: BTreeMap<String, u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveTokens {
    pub book_id: BookId,
    pub adaptive_tokens: Vec<String>,
}

/// Load a book or fail with [`StorageError::BookNotFound`].
pub async fn require_book(store: &dyn ProfileStore, book_id: BookId) -> Result<Book> {
    store
        .load_book(book_id)
        .await?
        .ok_or(StorageError::BookNotFound(book_id))
}

/// Exact lookup. Each query is matched in lowercase; results carry the
/// query's casing. Unknown queries map to an empty list.
pub async fn suggestions<S: AsRef<str>>(
    store: &dyn ProfileStore,
    book_id: BookId,
    queries: &[S],
) -> Result<Suggestions> {
    let mut out = Suggestions {
        book_id,
        ..Default::default()
    };
    for q in queries {
        let q = q.as_ref();
        if out.suggestions.contains_key(q) {
            continue;
        }
        let found = match store.find_type(&q.to_lowercase()).await? {
            Some(type_id) => store
                .suggestions_for_type(book_id, type_id)
                .await?
                .into_iter()
                .map(|row| Suggestion::from(row).cased_like(q))
                .collect(),
            None => Vec::new(),
        };
        debug!(book_id, query = q, found = found.len(), "suggestion lookup");
        out.suggestions.insert(q.to_string(), found);
    }
    Ok(out)
}

/// Pattern tally on one side, or the suggestions carrying each given key.
pub async fn patterns<S: AsRef<str>>(
    store: &dyn ProfileStore,
    book_id: BookId,
    keys: &[S],
    ocr: bool,
) -> Result<PatternQuery> {
    if keys.is_empty() {
        let counts = store.pattern_counts(book_id, ocr).await?;
        return Ok(PatternQuery::Counts(PatternCounts {
            book_id,
            ocr,
            counts,
        }));
    }
    let mut patterns = BTreeMap::new();
    for key in keys {
        let key = key.as_ref();
        let rows = store.suggestions_for_pattern(book_id, key, ocr).await?;
        patterns.insert(
            key.to_string(),
            rows.into_iter().map(Suggestion::from).collect(),
        );
    }
    Ok(PatternQuery::Suggestions(Patterns {
        book_id,
        ocr,
        patterns,
    }))
}

pub async fn suspicious(store: &dyn ProfileStore, book_id: BookId) -> Result<SuspiciousWords> {
    Ok(SuspiciousWords {
        book_id,
        counts: store.suspicious_types(book_id).await?,
    })
}

/// Lowercased corrections of fully corrected tokens, first occurrence
/// first.
pub async fn adaptive(store: &dyn ProfileStore, book_id: BookId) -> Result<AdaptiveTokens> {
    let rows = store.load_chars(book_id).await?;
    let mut seen = HashSet::new();
    let adaptive_tokens = tokens(rows)
        .filter(|t| t.fully_corrected && !t.cor.is_empty())
        .map(|t| t.cor.to_lowercase())
        .filter(|cor| seen.insert(cor.clone()))
        .collect();
    Ok(AdaptiveTokens {
        book_id,
        adaptive_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest;
    use crate::ingest::tests::{book, candidate, interp, pattern, profile, teh_profile};
    use crate::store_memory::MemoryStore;
    use crate::tokenizer::tests::line;
    use crate::types::BookStatus;

    async fn ingested() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_book(book(1, BookStatus::Empty));
        let mut vnd = candidate("und", 0.8, 1);
        vnd.modern = "und".into();
        vnd.hist_patterns = vec![pattern("u", "v", 0)];
        vnd.ocr_patterns = vec![pattern("n", "u", 1)];
        let mut teh = teh_profile(1);
        teh.profile.extend(
            profile(
                1,
                vec![
                    interp("vnd", 5, vec![vnd, candidate("vnd", 0.2, 0)]),
                    interp("und", 9, vec![candidate("und", 0.99, 0)]),
                ],
            )
            .profile,
        );
        ingest(&store, &teh, 0.1).await.unwrap();
        store
    }

    #[tokio::test]
    async fn exact_lookup_transfers_casing() {
        let store = ingested().await;
        let res = suggestions(&store, 1, &["Teh", "TEH", "missing"]).await.unwrap();
        assert_eq!(res.book_id, 1);
        let first = &res.suggestions["Teh"][0];
        assert_eq!(first.token, "Teh");
        assert_eq!(first.suggestion, "The");
        assert_eq!(first.modern, "The");
        assert!(first.top);
        assert_eq!(first.ocr_patterns, vec![pattern("eh", "he", 1)]);
        assert_eq!(res.suggestions["TEH"][0].suggestion, "THE");
        assert!(res.suggestions["missing"].is_empty());
    }

    #[tokio::test]
    async fn exact_lookup_returns_all_kept_candidates_in_rank_order() {
        let store = ingested().await;
        let res = suggestions(&store, 1, &["vnd"]).await.unwrap();
        let forms: Vec<(&str, bool)> = res.suggestions["vnd"]
            .iter()
            .map(|s| (s.suggestion.as_str(), s.top))
            .collect();
        assert_eq!(forms, vec![("und", true), ("vnd", false)]);
    }

    #[tokio::test]
    async fn exact_lookup_is_scoped_to_the_book() {
        let store = ingested().await;
        let res = suggestions(&store, 2, &["teh"]).await.unwrap();
        assert!(res.suggestions["teh"].is_empty());
    }

    #[tokio::test]
    async fn pattern_tally_respects_side() {
        let store = ingested().await;
        let PatternQuery::Counts(ocr) = patterns::<&str>(&store, 1, &[], true).await.unwrap()
        else {
            panic!("expected counts");
        };
        assert_eq!(
            ocr.counts,
            BTreeMap::from([("eh:he".to_string(), 1), ("n:u".to_string(), 1)])
        );
        let PatternQuery::Counts(hist) = patterns::<&str>(&store, 1, &[], false).await.unwrap()
        else {
            panic!("expected counts");
        };
        assert_eq!(
            hist.counts,
            BTreeMap::from([("th:t".to_string(), 1), ("u:v".to_string(), 1)])
        );
    }

    #[tokio::test]
    async fn pattern_lookup_by_key() {
        let store = ingested().await;
        let PatternQuery::Suggestions(res) =
            patterns(&store, 1, &["n:u", "u:v", "x:y"], true).await.unwrap()
        else {
            panic!("expected suggestions");
        };
        assert_eq!(res.patterns["n:u"].len(), 1);
        assert_eq!(res.patterns["n:u"][0].token, "vnd");
        // "u:v" is a historical pattern only
        assert!(res.patterns["u:v"].is_empty());
        assert!(res.patterns["x:y"].is_empty());
    }

    #[tokio::test]
    async fn suspicious_words_have_nonzero_top_distance() {
        let store = ingested().await;
        let res = suspicious(&store, 1).await.unwrap();
        assert_eq!(
            res.counts,
            BTreeMap::from([("teh".to_string(), 1), ("vnd".to_string(), 5)])
        );
    }

    #[tokio::test]
    async fn adaptive_tokens_are_lowercase_unique_and_ordered() {
        let store = MemoryStore::new();
        store.insert_chars(1, line(1, 1, "Teh cat Dog", Some("The cat D?g")));
        store.insert_chars(1, line(1, 2, "teh dog", Some("the dog")));
        let res = adaptive(&store, 1).await.unwrap();
        assert_eq!(res.adaptive_tokens, vec!["the", "cat", "dog"]);
    }

    #[tokio::test]
    async fn unknown_book_is_not_found() {
        let store = MemoryStore::new();
        let err = require_book(&store, 7).await.unwrap_err();
        assert!(matches!(err, StorageError::BookNotFound(7)));
    }

    #[test]
    fn suggestion_json_shape() {
        let s = Suggestion::from(SuggestionRow {
            token: "teh".into(),
            suggestion: "the".into(),
            modern: "the".into(),
            dict: true,
            weight: 0.5,
            distance: 1,
            top: true,
            hist_patterns: String::new(),
            ocr_patterns: "eh:he:1".into(),
        });
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["token"], "teh");
        assert_eq!(v["ocrPatterns"][0]["Left"], "eh");
        assert_eq!(v["histPatterns"].as_array().map(Vec::len), Some(0));
    }
}
