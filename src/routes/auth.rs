use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::session;
use crate::db::models::{Account, ProfileSummary};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::store::accounts;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
struct MeResponse {
    account: Account,
    summary: ProfileSummary,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/me", get(me))
}

/// Respond with the account and a fresh session cookie.
fn signed_in(state: &AppState, status: StatusCode, account: Account) -> AppResult<Response> {
    let token = session::create_session(&state.db, &account.id, state.config.auth.session_hours)?;
    let cookie = session::session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );
    Ok((status, [(header::SET_COOKIE, cookie)], Json(account)).into_response())
}

/// POST /auth/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    let account = accounts::register(
        &state.db,
        &state.config.accounts,
        &req.email,
        &req.password,
        &req.display_name,
    )?;
    signed_in(&state, StatusCode::CREATED, account)
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let account = accounts::authenticate(&state.db, &req.email, &req.password)?;
    tracing::info!(account_id = %account.id, "Signed in");
    signed_in(&state, StatusCode::OK, account)
}

/// POST /auth/logout
async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    session::delete_session(&state.db, &user.session_token)?;
    let cookie = session::clear_session_cookie(&state.config.auth.cookie_name);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

/// GET /me: account plus dashboard figures
async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<impl IntoResponse> {
    let summary = accounts::profile_summary(&state.db, &user.account.id)?;
    Ok(Json(MeResponse {
        account: user.account,
        summary,
    }))
}
