use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::workflow::{FixRequest, GenerationRequest, Workflow};

#[derive(Deserialize)]
pub struct GenerateBody {
    pub prompt: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub api_key: Option<String>,
}

#[derive(Deserialize)]
pub struct FixBody {
    #[serde(default)]
    pub prompt: String,
    pub code: String,
    pub error: String,
    pub name: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub api_key: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/generate/fix", post(fix))
}

fn workflow(state: &AppState) -> Workflow<'_> {
    Workflow::new(&state.db, state.generator.as_ref(), &state.config.generation)
}

/// POST /generate
async fn generate(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<GenerateBody>,
) -> AppResult<impl IntoResponse> {
    let generated = workflow(&state)
        .generate(
            &user.account,
            GenerationRequest {
                prompt: body.prompt,
                name: body.name,
                description: body.description,
                is_public: body.is_public,
                api_key: body.api_key,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

/// POST /generate/fix
async fn fix(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<FixBody>,
) -> AppResult<impl IntoResponse> {
    let generated = workflow(&state)
        .fix(
            &user.account,
            FixRequest {
                prompt: body.prompt,
                code: body.code,
                error: body.error,
                name: body.name,
                is_public: body.is_public,
                api_key: body.api_key,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(generated)))
}
