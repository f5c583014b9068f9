use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::*;

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

/// A suggestion as read back from storage, with type ids resolved to strings.
#[derive(Clone, Debug, PartialEq)]
pub struct SuggestionRow {
    pub token: String,
    pub suggestion: String,
    pub modern: String,
    pub dict: bool,
    pub weight: f64,
    pub distance: i32,
    pub top: bool,
    /// Archival `left:right:pos,...` lists.
    pub hist_patterns: String,
    pub ocr_patterns: String,
}

/// A suggestion about to be inserted.
#[derive(Clone, Debug, PartialEq)]
pub struct NewSuggestion {
    pub book_id: BookId,
    pub token_type: TypeId,
    pub suggestion_type: TypeId,
    pub modern_type: TypeId,
    pub dict: bool,
    pub weight: f64,
    pub distance: i32,
    pub top: bool,
    pub hist_patterns: String,
    pub ocr_patterns: String,
}

/// Read side of the relational store plus the entry point for ingestion.
///
/// Reads run on independent connections and may observe a book either
/// before or after a concurrent ingestion, never in between.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    // ── Books ──

    async fn load_book(&self, book_id: BookId) -> Result<Option<Book>>;

    /// All character rows of a book, ordered by page, line and sequence.
    async fn load_chars(&self, book_id: BookId) -> Result<Vec<CharRow>>;

    // ── Ingestion ──

    /// Open a write transaction. Nothing it does is visible until
    /// [`IngestTx::commit`]; dropping it rolls back.
    async fn begin(&self) -> Result<Box<dyn IngestTx>>;

    // ── Queries ──

    async fn find_type(&self, typ: &str) -> Result<Option<TypeId>>;

    /// Suggestions for one token type, in engine rank order.
    async fn suggestions_for_type(
        &self,
        book_id: BookId,
        type_id: TypeId,
    ) -> Result<Vec<SuggestionRow>>;

    /// Distinct patterns on one side with their number of occurrences.
    async fn pattern_counts(&self, book_id: BookId, ocr: bool) -> Result<BTreeMap<String, u64>>;

    /// Suggestions carrying `pattern` on the given side, each at most once.
    async fn suggestions_for_pattern(
        &self,
        book_id: BookId,
        pattern: &str,
        ocr: bool,
    ) -> Result<Vec<SuggestionRow>>;

    /// Token types whose top suggestion has a non-zero distance, with their
    /// corpus frequency.
    async fn suspicious_types(&self, book_id: BookId) -> Result<BTreeMap<String, u64>>;
}

/// Writes of one ingestion, all-or-nothing.
#[async_trait]
pub trait IngestTx: Send {
    /// Remove every suggestion, pattern and type count of `book_id`.
    async fn clear_book(&mut self, book_id: BookId) -> Result<()>;

    /// Insert `typ` unless present; return its id either way.
    async fn upsert_type(&mut self, typ: &str) -> Result<TypeId>;

    /// Add `n` to the count of (type, book), creating the row if needed.
    async fn add_type_count(&mut self, type_id: TypeId, book_id: BookId, n: u64) -> Result<()>;

    async fn insert_suggestion(&mut self, suggestion: &NewSuggestion) -> Result<SuggestionId>;

    async fn insert_pattern(
        &mut self,
        suggestion_id: SuggestionId,
        book_id: BookId,
        pattern: &str,
        ocr: bool,
    ) -> Result<()>;

    /// Move the book to `status` if its current status precedes it.
    /// Returns whether the status changed.
    async fn advance_status(&mut self, book_id: BookId, status: BookStatus) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
