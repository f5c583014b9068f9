//! GET /profile/languages

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Languages {
    pub languages: Vec<String>,
}

pub async fn list_languages(State(state): State<AppState>) -> Result<Json<Languages>, AppError> {
    let configs = state.profiler.languages()?;
    Ok(Json(Languages {
        languages: configs.into_iter().map(|c| c.language).collect(),
    }))
}
