use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::Artifact;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::state::AppState;
use crate::store::artifacts::{self, ArtifactUpdate, NewArtifact};

#[derive(Deserialize)]
pub struct SaveBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt: String,
    pub code: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Deserialize)]
pub struct UpdateBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Serialize)]
struct ArtifactView {
    #[serde(flatten)]
    artifact: Artifact,
    liked: bool,
}

#[derive(Serialize)]
struct LikeResponse {
    liked: bool,
    likes: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/apps", get(list_mine).post(save))
        .route("/apps/{id}", get(show).patch(update).delete(remove))
        .route("/apps/{id}/like", post(toggle_like))
}

/// Load an artifact the viewer may read: public ones, or their own.
/// Private artifacts of others look exactly like missing ones.
fn readable(state: &AppState, id: &str, viewer: Option<&str>) -> AppResult<Artifact> {
    let artifact = artifacts::get_by_id(&state.db, id)?.ok_or(AppError::NotFound)?;
    if artifact.is_public || viewer == Some(artifact.owner_id.as_str()) {
        Ok(artifact)
    } else {
        Err(AppError::NotFound)
    }
}

/// GET /apps: the caller's artifacts, newest first
async fn list_mine(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Artifact>>> {
    Ok(Json(artifacts::list_by_owner(&state.db, &user.account.id)?))
}

/// POST /apps: save code explicitly, without a generation run
async fn save(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<SaveBody>,
) -> AppResult<impl IntoResponse> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    if body.code.trim().is_empty() {
        return Err(AppError::BadRequest("Code is required".into()));
    }

    let id = artifacts::create(
        &state.db,
        &NewArtifact {
            owner_id: &user.account.id,
            name,
            description: &body.description,
            prompt: &body.prompt,
            code: &body.code,
            is_public: body.is_public,
        },
    )?;
    let artifact = artifacts::get_by_id(&state.db, &id)?
        .ok_or_else(|| AppError::Internal(format!("artifact {} missing after insert", id)))?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// GET /apps/{id}. Reads by anyone but the owner count as views.
async fn show(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Json<ArtifactView>> {
    let viewer = user.as_ref().map(|u| u.account.id.as_str());
    let mut artifact = readable(&state, &id, viewer)?;

    if viewer != Some(artifact.owner_id.as_str()) {
        artifacts::record_view(&state.db, &id)?;
        artifact.views += 1;
    }

    let liked = match viewer {
        Some(account_id) => artifacts::has_liked(&state.db, &id, account_id)?,
        None => false,
    };

    Ok(Json(ArtifactView { artifact, liked }))
}

/// PATCH /apps/{id}: rename, re-describe or change visibility
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> AppResult<Json<Artifact>> {
    let changes = ArtifactUpdate {
        name: body.name,
        description: body.description,
        is_public: body.is_public,
    };
    let artifact = artifacts::update(&state.db, &id, &user.account.id, &changes)?;
    Ok(Json(artifact))
}

/// DELETE /apps/{id}
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let artifact = artifacts::get_by_id(&state.db, &id)?.ok_or(AppError::NotFound)?;
    if artifact.owner_id != user.account.id {
        return Err(AppError::Forbidden);
    }
    artifacts::delete(&state.db, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /apps/{id}/like
async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<LikeResponse>> {
    readable(&state, &id, Some(user.account.id.as_str()))?;
    let liked = artifacts::toggle_like(&state.db, &id, &user.account.id)?;
    let likes = artifacts::get_by_id(&state.db, &id)?
        .map(|a| a.likes)
        .ok_or(AppError::NotFound)?;
    Ok(Json(LikeResponse { liked, likes }))
}
