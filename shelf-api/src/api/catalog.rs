//! Catalog endpoints

use axum::{extract::State, Json};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ApiResult;
use crate::AppState;

/// GET /audiobooks
///
/// `{books, genres, map}`: books keyed by id with resolved media URLs, genre
/// facets with the parent/child maps, and the static genre table.
pub async fn audiobooks(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.audiobooks().await?))
}

/// GET /chapters
pub async fn chapters(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.chapters().await?))
}

/// GET /all_achievements
pub async fn all_achievements(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.achievements().await?))
}

/// GET /book_sponsors
pub async fn book_sponsors(
    State(state): State<AppState>,
) -> ApiResult<Json<IndexMap<String, Vec<String>>>> {
    Ok(Json(state.catalog.book_sponsors().await?))
}
