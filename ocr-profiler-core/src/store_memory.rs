//! In-memory [`ProfileStore`], used by tests and local runs without Postgres.
//!
//! A transaction records its writes and replays them onto the shared state
//! under the lock on commit, so an abandoned transaction leaves nothing
//! behind and transactions for different books never overwrite each other.
//! Type and suggestion ids are drawn from shared counters when first asked
//! for, like database sequences, and are not reused after a rollback.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::schema::{Table, PROFILE_TABLES};
use crate::store::{IngestTx, NewSuggestion, ProfileStore, Result, SuggestionRow};
use crate::types::*;

#[derive(Clone, Debug)]
struct StoredSuggestion {
    id: SuggestionId,
    row: NewSuggestion,
}

#[derive(Clone, Debug)]
struct StoredPattern {
    suggestion_id: SuggestionId,
    book_id: BookId,
    pattern: String,
    ocr: bool,
}

#[derive(Clone, Debug, Default)]
struct State {
    books: BTreeMap<BookId, Book>,
    contents: BTreeMap<BookId, Vec<CharRow>>,
    types: BTreeMap<TypeId, String>,
    type_ids: HashMap<String, TypeId>,
    last_type_id: TypeId,
    typcounts: BTreeMap<(TypeId, BookId), u64>,
    suggestions: Vec<StoredSuggestion>,
    patterns: Vec<StoredPattern>,
    last_suggestion_id: SuggestionId,
}

impl State {
    fn typ(&self, id: TypeId) -> String {
        self.types.get(&id).cloned().unwrap_or_default()
    }

    fn clear_book(&mut self, book_id: BookId) -> Result<()> {
        for table in PROFILE_TABLES {
            match table {
                Table::ErrorPatterns => self.patterns.retain(|p| p.book_id != book_id),
                Table::Suggestions => self.suggestions.retain(|x| x.row.book_id != book_id),
                Table::TypCounts => self.typcounts.retain(|(_, b), _| *b != book_id),
                other => return Err(anyhow!("{} is not a profile table", other.name()).into()),
            }
        }
        Ok(())
    }

    fn advance_status(&mut self, book_id: BookId, status: BookStatus) -> bool {
        match self.books.get_mut(&book_id) {
            Some(book) if book.status < status => {
                book.status = status;
                true
            }
            _ => false,
        }
    }

    fn resolve(&self, s: &StoredSuggestion) -> SuggestionRow {
        SuggestionRow {
            token: self.typ(s.row.token_type),
            suggestion: self.typ(s.row.suggestion_type),
            modern: self.typ(s.row.modern_type),
            dict: s.row.dict,
            weight: s.row.weight,
            distance: s.row.distance,
            top: s.row.top,
            hist_patterns: s.row.hist_patterns.clone(),
            ocr_patterns: s.row.ocr_patterns.clone(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    fail_after: Option<usize>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transaction of the returned handle fails on its `n + 1`-th
    /// suggestion insert.
    #[cfg(test)]
    pub(crate) fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    // ── Seeding ──

    pub fn insert_book(&self, book: Book) {
        self.lock().books.insert(book.book_id, book);
    }

    /// Append rows to a book's contents; kept in (page, line, seq) order.
    pub fn insert_chars(&self, book_id: BookId, rows: impl IntoIterator<Item = CharRow>) {
        let mut state = self.lock();
        let contents = state.contents.entry(book_id).or_default();
        contents.extend(rows);
        contents.sort_by_key(|r| (r.page_id, r.line_id, r.seq));
    }

    // ── Inspection ──

    pub fn book_status(&self, book_id: BookId) -> Option<BookStatus> {
        self.lock().books.get(&book_id).map(|b| b.status)
    }

    pub fn type_id(&self, typ: &str) -> Option<TypeId> {
        self.lock().type_ids.get(typ).copied()
    }

    pub fn type_count(&self, book_id: BookId, typ: &str) -> Option<u64> {
        let state = self.lock();
        let id = *state.type_ids.get(typ)?;
        state.typcounts.get(&(id, book_id)).copied()
    }

    /// Number of type-count rows for a book.
    pub fn type_count_rows(&self, book_id: BookId) -> usize {
        self.lock()
            .typcounts
            .keys()
            .filter(|(_, b)| *b == book_id)
            .count()
    }

    /// All suggestions of a book in insertion order.
    pub fn suggestion_rows(&self, book_id: BookId) -> Vec<SuggestionRow> {
        let state = self.lock();
        state
            .suggestions
            .iter()
            .filter(|s| s.row.book_id == book_id)
            .map(|s| state.resolve(s))
            .collect()
    }

    /// All (pattern, ocr) rows of a book in insertion order.
    pub fn pattern_rows(&self, book_id: BookId) -> Vec<(String, bool)> {
        self.lock()
            .patterns
            .iter()
            .filter(|p| p.book_id == book_id)
            .map(|p| (p.pattern.clone(), p.ocr))
            .collect()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load_book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.lock().books.get(&book_id).cloned())
    }

    async fn load_chars(&self, book_id: BookId) -> Result<Vec<CharRow>> {
        Ok(self
            .lock()
            .contents
            .get(&book_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn begin(&self) -> Result<Box<dyn IngestTx>> {
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.state),
            writes: Vec::new(),
            new_types: HashMap::new(),
            fail_after: self.fail_after,
            inserted: 0,
        }))
    }

    async fn find_type(&self, typ: &str) -> Result<Option<TypeId>> {
        Ok(self.type_id(typ))
    }

    async fn suggestions_for_type(
        &self,
        book_id: BookId,
        type_id: TypeId,
    ) -> Result<Vec<SuggestionRow>> {
        let state = self.lock();
        Ok(state
            .suggestions
            .iter()
            .filter(|s| s.row.book_id == book_id && s.row.token_type == type_id)
            .map(|s| state.resolve(s))
            .collect())
    }

    async fn pattern_counts(&self, book_id: BookId, ocr: bool) -> Result<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for p in self.lock().patterns.iter() {
            if p.book_id == book_id && p.ocr == ocr {
                *counts.entry(p.pattern.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn suggestions_for_pattern(
        &self,
        book_id: BookId,
        pattern: &str,
        ocr: bool,
    ) -> Result<Vec<SuggestionRow>> {
        let state = self.lock();
        let ids: BTreeSet<SuggestionId> = state
            .patterns
            .iter()
            .filter(|p| p.book_id == book_id && p.ocr == ocr && p.pattern == pattern)
            .map(|p| p.suggestion_id)
            .collect();
        Ok(state
            .suggestions
            .iter()
            .filter(|s| ids.contains(&s.id))
            .map(|s| state.resolve(s))
            .collect())
    }

    async fn suspicious_types(&self, book_id: BookId) -> Result<BTreeMap<String, u64>> {
        let state = self.lock();
        let mut out = BTreeMap::new();
        for s in &state.suggestions {
            if s.row.book_id != book_id || !s.row.top || s.row.distance == 0 {
                continue;
            }
            if let Some(n) = state.typcounts.get(&(s.row.token_type, book_id)) {
                out.insert(state.typ(s.row.token_type), *n);
            }
        }
        Ok(out)
    }
}

/// A write recorded by a transaction, replayed on commit.
#[derive(Debug)]
enum Write {
    ClearBook(BookId),
    TypeCount {
        type_id: TypeId,
        book_id: BookId,
        n: u64,
    },
    Suggestion(StoredSuggestion),
    Pattern(StoredPattern),
    Status {
        book_id: BookId,
        status: BookStatus,
    },
}

struct MemoryTx {
    shared: Arc<Mutex<State>>,
    writes: Vec<Write>,
    /// Types first created by this transaction.
    new_types: HashMap<String, TypeId>,
    fail_after: Option<usize>,
    inserted: usize,
}

#[async_trait]
impl IngestTx for MemoryTx {
    async fn clear_book(&mut self, book_id: BookId) -> Result<()> {
        self.writes.push(Write::ClearBook(book_id));
        Ok(())
    }

    async fn upsert_type(&mut self, typ: &str) -> Result<TypeId> {
        if let Some(id) = self.new_types.get(typ) {
            return Ok(*id);
        }
        let mut shared = lock(&self.shared);
        if let Some(id) = shared.type_ids.get(typ) {
            return Ok(*id);
        }
        shared.last_type_id += 1;
        let id = shared.last_type_id;
        self.new_types.insert(typ.to_string(), id);
        Ok(id)
    }

    async fn add_type_count(&mut self, type_id: TypeId, book_id: BookId, n: u64) -> Result<()> {
        self.writes.push(Write::TypeCount {
            type_id,
            book_id,
            n,
        });
        Ok(())
    }

    async fn insert_suggestion(&mut self, suggestion: &NewSuggestion) -> Result<SuggestionId> {
        if self.fail_after.is_some_and(|n| self.inserted >= n) {
            return Err(anyhow!("injected failure after {} suggestions", self.inserted).into());
        }
        self.inserted += 1;
        let id = {
            let mut shared = lock(&self.shared);
            shared.last_suggestion_id += 1;
            shared.last_suggestion_id
        };
        self.writes.push(Write::Suggestion(StoredSuggestion {
            id,
            row: suggestion.clone(),
        }));
        Ok(id)
    }

    async fn insert_pattern(
        &mut self,
        suggestion_id: SuggestionId,
        book_id: BookId,
        pattern: &str,
        ocr: bool,
    ) -> Result<()> {
        self.writes.push(Write::Pattern(StoredPattern {
            suggestion_id,
            book_id,
            pattern: pattern.to_string(),
            ocr,
        }));
        Ok(())
    }

    async fn advance_status(&mut self, book_id: BookId, status: BookStatus) -> Result<bool> {
        let staged = self.writes.iter().rev().find_map(|w| match w {
            Write::Status { book_id: b, status } if *b == book_id => Some(*status),
            _ => None,
        });
        let current = staged.or_else(|| lock(&self.shared).books.get(&book_id).map(|b| b.status));
        let advanced = current.is_some_and(|s| s < status);
        if advanced {
            self.writes.push(Write::Status { book_id, status });
        }
        Ok(advanced)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            shared,
            writes,
            new_types,
            ..
        } = *self;
        let mut state = lock(&shared);

        // a concurrent commit may have created the same type first
        let mut remap = HashMap::new();
        for (typ, id) in new_types {
            match state.type_ids.get(&typ) {
                Some(existing) => {
                    remap.insert(id, *existing);
                }
                None => {
                    state.types.insert(id, typ.clone());
                    state.type_ids.insert(typ, id);
                }
            }
        }
        let ty = |id: TypeId| remap.get(&id).copied().unwrap_or(id);

        for write in writes {
            match write {
                Write::ClearBook(book_id) => state.clear_book(book_id)?,
                Write::TypeCount {
                    type_id,
                    book_id,
                    n,
                } => *state.typcounts.entry((ty(type_id), book_id)).or_insert(0) += n,
                Write::Suggestion(mut s) => {
                    s.row.token_type = ty(s.row.token_type);
                    s.row.suggestion_type = ty(s.row.suggestion_type);
                    s.row.modern_type = ty(s.row.modern_type);
                    state.suggestions.push(s);
                }
                Write::Pattern(p) => state.patterns.push(p),
                Write::Status { book_id, status } => {
                    state.advance_status(book_id, status);
                }
            }
        }
        Ok(())
    }
}
