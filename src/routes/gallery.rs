use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{Artifact, Stats};
use crate::error::AppResult;
use crate::state::AppState;
use crate::store::artifacts;

const GALLERY_LIMIT: usize = 50;
const SEARCH_LIMIT: usize = 20;

#[derive(Deserialize)]
pub struct GalleryQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/gallery", get(gallery))
        .route("/stats", get(stats))
}

/// GET /gallery?q=: public artifacts, optionally filtered
async fn gallery(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> AppResult<Json<Vec<Artifact>>> {
    let apps = match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => artifacts::search(&state.db, q, Some(query.limit.unwrap_or(SEARCH_LIMIT)))?,
        None => artifacts::list_public(&state.db, Some(query.limit.unwrap_or(GALLERY_LIMIT)))?,
    };
    Ok(Json(apps))
}

/// GET /stats
async fn stats(State(state): State<AppState>) -> AppResult<Json<Stats>> {
    Ok(Json(artifacts::stats(&state.db)?))
}
