//! Postgres implementation of [`ProfileStore`].
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) to avoid a
//! compile-time database requirement.

use std::collections::BTreeMap;

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::schema::{PROFILE_TABLES, SCHEMA_SQL};
use crate::store::{IngestTx, NewSuggestion, ProfileStore, Result, SuggestionRow};
use crate::types::*;

const SELECT_SUGGESTIONS: &str = r#"
    SELECT tt.typ, st.typ, mt.typ,
           s.dict, s.weight, s.distance, s.topsuggestion,
           s.histpatterns, s.ocrpatterns
    FROM suggestions s
    JOIN types tt ON s.tokentypid = tt.id
    JOIN types st ON s.suggestiontypid = st.id
    JOIN types mt ON s.moderntypid = mt.id
"#;

type SuggestionTuple = (String, String, String, bool, f64, i32, bool, String, String);

fn suggestion_row(t: SuggestionTuple) -> SuggestionRow {
    let (token, suggestion, modern, dict, weight, distance, top, hist_patterns, ocr_patterns) = t;
    SuggestionRow {
        token,
        suggestion,
        modern,
        dict,
        weight,
        distance,
        top,
        hist_patterns,
        ocr_patterns,
    }
}

fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

/// Postgres-backed profile store. Cheap to clone.
#[derive(Clone, Debug)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!(max_connections, "connected to database");
        Ok(Self::new(pool))
    }

    /// Create missing tables and indexes.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        debug!("schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn load_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query_as::<_, (i32, String, String)>(
            "SELECT statusid, lang, directory FROM books WHERE bookid = $1",
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(status, lang, directory)| -> Result<Book> {
            let status = BookStatus::from_id(status)
                .ok_or_else(|| anyhow!("book {book_id}: unknown status id {status}"))?;
            Ok(Book {
                book_id,
                lang,
                directory,
                status,
            })
        })
        .transpose()
    }

    async fn load_chars(&self, book_id: BookId) -> Result<Vec<CharRow>> {
        let rows = sqlx::query_as::<_, (i32, i32, i32, i32, i32)>(
            r#"
            SELECT pageid, lineid, seq, ocr, cor
            FROM contents
            WHERE bookid = $1
            ORDER BY pageid, lineid, seq
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(page, line, seq, ocr, cor)| CharRow::from_codes(page, line, seq, ocr, cor))
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn IngestTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgIngestTx { tx }))
    }

    async fn find_type(&self, typ: &str) -> Result<Option<TypeId>> {
        Ok(
            sqlx::query_scalar::<_, i32>("SELECT id FROM types WHERE typ = $1")
                .bind(typ)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn suggestions_for_type(
        &self,
        book_id: BookId,
        type_id: TypeId,
    ) -> Result<Vec<SuggestionRow>> {
        let stmt = format!("{SELECT_SUGGESTIONS} WHERE s.bookid = $1 AND s.tokentypid = $2 ORDER BY s.id");
        let rows = sqlx::query_as::<_, SuggestionTuple>(&stmt)
            .bind(book_id)
            .bind(type_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(suggestion_row).collect())
    }

    async fn pattern_counts(&self, book_id: BookId, ocr: bool) -> Result<BTreeMap<String, u64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT pattern, COUNT(*)
            FROM errorpatterns
            WHERE bookid = $1 AND ocr = $2
            GROUP BY pattern
            "#,
        )
        .bind(book_id)
        .bind(ocr)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(p, n)| (p, count(n))).collect())
    }

    async fn suggestions_for_pattern(
        &self,
        book_id: BookId,
        pattern: &str,
        ocr: bool,
    ) -> Result<Vec<SuggestionRow>> {
        let stmt = format!(
            r#"{SELECT_SUGGESTIONS}
            WHERE s.bookid = $1
              AND s.id IN (
                  SELECT suggestionid FROM errorpatterns
                  WHERE bookid = $1 AND ocr = $2 AND pattern = $3
              )
            ORDER BY s.id"#
        );
        let rows = sqlx::query_as::<_, SuggestionTuple>(&stmt)
            .bind(book_id)
            .bind(ocr)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(suggestion_row).collect())
    }

    async fn suspicious_types(&self, book_id: BookId) -> Result<BTreeMap<String, u64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT t.typ, c.counts
            FROM suggestions s
            JOIN types t ON s.tokentypid = t.id
            JOIN typcounts c ON c.typid = s.tokentypid AND c.bookid = s.bookid
            WHERE s.bookid = $1
              AND s.topsuggestion
              AND s.distance > 0
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(t, n)| (t, count(n))).collect())
    }
}

/// One ingestion transaction. Rolled back by sqlx when dropped uncommitted.
struct PgIngestTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl IngestTx for PgIngestTx {
    async fn clear_book(&mut self, book_id: BookId) -> Result<()> {
        for table in PROFILE_TABLES {
            let res = sqlx::query(&table.delete_by_book())
                .bind(book_id)
                .execute(&mut *self.tx)
                .await?;
            debug!(book_id, table = table.name(), rows = res.rows_affected(), "cleared");
        }
        Ok(())
    }

    async fn upsert_type(&mut self, typ: &str) -> Result<TypeId> {
        // DO UPDATE (not DO NOTHING) so RETURNING also yields existing rows
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO types (typ) VALUES ($1)
            ON CONFLICT (typ) DO UPDATE SET typ = EXCLUDED.typ
            RETURNING id
            "#,
        )
        .bind(typ)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn add_type_count(&mut self, type_id: TypeId, book_id: BookId, n: u64) -> Result<()> {
        let n = i64::try_from(n).map_err(|e| anyhow!(e))?;
        sqlx::query(
            r#"
            INSERT INTO typcounts (typid, bookid, counts) VALUES ($1, $2, $3)
            ON CONFLICT (typid, bookid) DO UPDATE SET counts = typcounts.counts + EXCLUDED.counts
            "#,
        )
        .bind(type_id)
        .bind(book_id)
        .bind(n)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_suggestion(&mut self, s: &NewSuggestion) -> Result<SuggestionId> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO suggestions (
                bookid, tokentypid, suggestiontypid, moderntypid,
                dict, weight, distance, topsuggestion,
                histpatterns, ocrpatterns
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(s.book_id)
        .bind(s.token_type)
        .bind(s.suggestion_type)
        .bind(s.modern_type)
        .bind(s.dict)
        .bind(s.weight)
        .bind(s.distance)
        .bind(s.top)
        .bind(&s.hist_patterns)
        .bind(&s.ocr_patterns)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_pattern(
        &mut self,
        suggestion_id: SuggestionId,
        book_id: BookId,
        pattern: &str,
        ocr: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO errorpatterns (suggestionid, bookid, pattern, ocr) VALUES ($1, $2, $3, $4)",
        )
        .bind(suggestion_id)
        .bind(book_id)
        .bind(pattern)
        .bind(ocr)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn advance_status(&mut self, book_id: BookId, status: BookStatus) -> Result<bool> {
        let res = sqlx::query("UPDATE books SET statusid = $1 WHERE bookid = $2 AND statusid < $1")
            .bind(status.id())
            .bind(book_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
