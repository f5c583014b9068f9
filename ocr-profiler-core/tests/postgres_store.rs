//! Integration tests of the Postgres store: schema, upserts, the monotonic
//! status update and the read queries, driven through ingestion and a full
//! profiling job.
//!
//! Requires a running PostgreSQL database; the schema is created if missing.
//! Run with: DATABASE_URL="postgresql:///ocr_profiler_test" cargo test -p ocr-profiler-core --features postgres --test postgres_store -- --ignored --nocapture
#![cfg(feature = "postgres")]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ocr_profiler_core::engine::{cancel_pair, CancelSignal, ProfileEngine};
use ocr_profiler_core::error::EngineError;
use ocr_profiler_core::language::LanguageConfig;
use ocr_profiler_core::query::{self, PatternQuery};
use ocr_profiler_core::store::ProfileStore;
use ocr_profiler_core::{
    ingest, BookId, BookStatus, Candidate, Interpretation, Pattern, PgProfileStore, Profile,
    Profiler, Token,
};

// ── Fixtures ───────────────────────────────────────────────────

async fn connect() -> PgProfileStore {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let store = PgProfileStore::connect(&database_url, 5)
        .await
        .expect("failed to connect to test database");
    store.ensure_schema().await.expect("failed to create schema");
    store
}

/// Drop everything stored for `book_id` and recreate the book row.
async fn reset_book(store: &PgProfileStore, book_id: BookId, status: BookStatus) {
    for table in ["errorpatterns", "suggestions", "typcounts", "contents", "books"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE bookid = $1"))
            .bind(book_id)
            .execute(store.pool())
            .await
            .unwrap();
    }
    sqlx::query("INSERT INTO books (bookid, statusid, lang, directory) VALUES ($1, $2, 'latin', $3)")
        .bind(book_id)
        .bind(status.id())
        .bind(format!("book-{book_id}"))
        .execute(store.pool())
        .await
        .unwrap();
}

/// One line of fully confirmed characters.
async fn insert_line(store: &PgProfileStore, book_id: BookId, ocr: &str, cor: &str) {
    for (seq, (o, c)) in ocr.chars().zip(cor.chars()).enumerate() {
        sqlx::query(
            "INSERT INTO contents (bookid, pageid, lineid, seq, ocr, cor) VALUES ($1, 1, 1, $2, $3, $4)",
        )
        .bind(book_id)
        .bind(seq as i32)
        .bind(o as i32)
        .bind(c as i32)
        .execute(store.pool())
        .await
        .unwrap();
    }
}

async fn type_count(store: &PgProfileStore, book_id: BookId, typ: &str) -> Option<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT c.counts FROM typcounts c JOIN types t ON t.id = c.typid WHERE c.bookid = $1 AND t.typ = $2",
    )
    .bind(book_id)
    .bind(typ)
    .fetch_optional(store.pool())
    .await
    .unwrap()
}

async fn count_rows(store: &PgProfileStore, table: &str, book_id: BookId) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table} WHERE bookid = $1"))
        .bind(book_id)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

async fn status(store: &PgProfileStore, book_id: BookId) -> BookStatus {
    store.load_book(book_id).await.unwrap().unwrap().status
}

fn candidate(suggestion: &str, weight: f64, distance: i32) -> Candidate {
    Candidate {
        suggestion: suggestion.into(),
        modern: suggestion.into(),
        dict: true,
        weight,
        distance,
        ..Default::default()
    }
}

fn profile(book_id: BookId, ocr: &str, n: u64, candidates: Vec<Candidate>) -> Profile {
    let interp = Interpretation {
        ocr: ocr.into(),
        n,
        candidates,
    };
    Profile {
        book_id,
        profile: BTreeMap::from([(ocr.to_string(), interp)]),
    }
}

/// "teh" -> "the" with one pattern on each side, plus a weak second guess.
fn teh_profile(book_id: BookId) -> Profile {
    let mut the = candidate("the", 0.9, 1);
    the.ocr_patterns = vec![Pattern {
        left: "eh".into(),
        right: "he".into(),
        pos: 1,
    }];
    the.hist_patterns = vec![Pattern {
        left: "th".into(),
        right: "t".into(),
        pos: 0,
    }];
    profile(book_id, "teh", 1, vec![the, candidate("ten", 0.05, 1)])
}

struct FixedEngine;

#[async_trait]
impl ProfileEngine for FixedEngine {
    async fn profile(
        &self,
        _config: &LanguageConfig,
        _tokens: &[Token],
        _cancel: CancelSignal,
    ) -> Result<BTreeMap<String, Interpretation>, EngineError> {
        Ok(profile(0, "teh", 1, vec![candidate("the", 0.9, 1)]).profile)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn job_profiles_two_row_book() {
    let store = connect().await;
    let book_id = 910_001;
    reset_book(&store, book_id, BookStatus::Empty).await;
    insert_line(&store, book_id, "teh", "the").await;

    let root = tempfile::tempdir().unwrap();
    let project = root.path().join("project-data");
    let language = root.path().join("language-data");
    std::fs::create_dir_all(&project).unwrap();
    std::fs::create_dir_all(&language).unwrap();
    std::fs::write(language.join("latin.ini"), "").unwrap();
    let profiler = Profiler::new(Arc::new(store.clone()), Arc::new(FixedEngine), &project, &language);

    let job = profiler.prepare(book_id).await.unwrap();
    let (_tx, rx) = cancel_pair();
    let summary = profiler.run(&job, rx).await.unwrap();
    assert_eq!(summary.suggestions, 1);

    assert_eq!(type_count(&store, book_id, "teh").await, Some(1));
    assert_eq!(count_rows(&store, "typcounts", book_id).await, 1);
    assert_eq!(status(&store, book_id).await, BookStatus::Profiled);

    let found = query::suggestions(&store, book_id, &["teh"]).await.unwrap();
    let rows = &found.suggestions["teh"];
    assert_eq!(rows.len(), 1);
    assert!(rows[0].top);
    assert_eq!(rows[0].weight, 0.9);
    assert_eq!(rows[0].distance, 1);
    assert_eq!(rows[0].suggestion, "the");
}

#[tokio::test]
#[ignore]
async fn reingestion_replaces_instead_of_adding() {
    let store = connect().await;
    let book_id = 910_002;
    reset_book(&store, book_id, BookStatus::Empty).await;

    ingest(&store, &teh_profile(book_id), 0.1).await.unwrap();
    ingest(&store, &teh_profile(book_id), 0.1).await.unwrap();

    assert_eq!(type_count(&store, book_id, "teh").await, Some(1));
    assert_eq!(count_rows(&store, "suggestions", book_id).await, 1);
    assert_eq!(count_rows(&store, "errorpatterns", book_id).await, 2);

    let teh = store.find_type("teh").await.unwrap();
    assert!(teh.is_some());
    ingest(&store, &teh_profile(book_id), 0.1).await.unwrap();
    assert_eq!(store.find_type("teh").await.unwrap(), teh);
}

#[tokio::test]
#[ignore]
async fn cutoff_is_exclusive() {
    let store = connect().await;
    let book_id = 910_003;
    reset_book(&store, book_id, BookStatus::Empty).await;

    let p = profile(
        book_id,
        "vnd",
        2,
        vec![candidate("und", 0.25, 1), candidate("vnnd", 0.25 + 1e-9, 1)],
    );
    let summary = ingest(&store, &p, 0.25).await.unwrap();
    assert_eq!(summary.suggestions, 1);
    assert_eq!(summary.skipped, 1);

    let found = query::suggestions(&store, book_id, &["vnd"]).await.unwrap();
    let rows = &found.suggestions["vnd"];
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].suggestion, "vnnd");
    // rank 0 was cut, so nothing stored is top
    assert!(!rows[0].top);
    assert_eq!(type_count(&store, book_id, "vnd").await, Some(2));
}

#[tokio::test]
#[ignore]
async fn status_never_moves_backward() {
    let store = connect().await;
    let book_id = 910_004;
    reset_book(&store, book_id, BookStatus::PostCorrected).await;

    let summary = ingest(&store, &teh_profile(book_id), 0.1).await.unwrap();
    assert!(!summary.status_advanced);
    assert_eq!(status(&store, book_id).await, BookStatus::PostCorrected);
}

#[tokio::test]
#[ignore]
async fn pattern_and_suspicious_queries() {
    let store = connect().await;
    let book_id = 910_005;
    reset_book(&store, book_id, BookStatus::Empty).await;
    ingest(&store, &teh_profile(book_id), 0.1).await.unwrap();

    match query::patterns::<&str>(&store, book_id, &[], true).await.unwrap() {
        PatternQuery::Counts(c) => assert_eq!(c.counts, BTreeMap::from([("eh:he".to_string(), 1)])),
        other => panic!("expected counts, got {other:?}"),
    }
    match query::patterns(&store, book_id, &["th:t", "eh:he"], false).await.unwrap() {
        PatternQuery::Suggestions(p) => {
            assert_eq!(p.patterns["th:t"].len(), 1);
            assert_eq!(p.patterns["th:t"][0].token, "teh");
            assert!(p.patterns["eh:he"].is_empty());
        }
        other => panic!("expected suggestions, got {other:?}"),
    }

    let suspicious = query::suspicious(&store, book_id).await.unwrap();
    assert_eq!(suspicious.counts, BTreeMap::from([("teh".to_string(), 1)]));
}
