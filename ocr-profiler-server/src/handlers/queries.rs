//! Read-only per-book queries.
//!
//! GET /profile/patterns/books/:bid?ocr=bool&p=key...
//! GET /profile/suspicious/books/:bid
//! GET /profile/adaptive/books/:bid

use axum::{
    extract::{Path, Query, State},
    Json,
};
use ocr_profiler_core::query::{self, AdaptiveTokens, PatternQuery, SuspiciousWords};
use ocr_profiler_core::BookId;

use super::values;
use crate::error::AppError;
use crate::state::AppState;

pub async fn patterns(
    State(state): State<AppState>,
    Path(book_id): Path<BookId>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<PatternQuery>, AppError> {
    let ocr = match values(&params, "ocr").last() {
        None => false,
        Some(v) => v
            .parse::<bool>()
            .map_err(|_| AppError::BadRequest(format!("ocr: invalid boolean {v:?}")))?,
    };
    let keys: Vec<&str> = values(&params, "p").collect();

    let store = state.profiler.store.as_ref();
    query::require_book(store, book_id).await?;
    Ok(Json(query::patterns(store, book_id, &keys, ocr).await?))
}

pub async fn suspicious(
    State(state): State<AppState>,
    Path(book_id): Path<BookId>,
) -> Result<Json<SuspiciousWords>, AppError> {
    let store = state.profiler.store.as_ref();
    query::require_book(store, book_id).await?;
    Ok(Json(query::suspicious(store, book_id).await?))
}

pub async fn adaptive(
    State(state): State<AppState>,
    Path(book_id): Path<BookId>,
) -> Result<Json<AdaptiveTokens>, AppError> {
    let store = state.profiler.store.as_ref();
    query::require_book(store, book_id).await?;
    Ok(Json(query::adaptive(store, book_id).await?))
}
