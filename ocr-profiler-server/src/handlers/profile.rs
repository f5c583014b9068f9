//! Whole-profile download and exact suggestion lookup.
//!
//! GET /profile/books/:bid          : gzip archive of the last profile
//! GET /profile/books/:bid?q=a&q=b  : suggestions for the given tokens

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use ocr_profiler_core::{query, BookId};

use super::values;
use crate::error::AppError;
use crate::state::AppState;

pub async fn get_profile(
    State(state): State<AppState>,
    Path(book_id): Path<BookId>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let queries: Vec<&str> = values(&params, "q").collect();
    if queries.is_empty() {
        let bytes = state.profiler.whole_profile(book_id).await?;
        return Ok((
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CONTENT_ENCODING, "gzip"),
            ],
            bytes,
        )
            .into_response());
    }

    let store = state.profiler.store.as_ref();
    query::require_book(store, book_id).await?;
    let suggestions = query::suggestions(store, book_id, &queries).await?;
    Ok(Json(suggestions).into_response())
}
