pub mod apps;
pub mod auth;
pub mod gallery;
pub mod generate;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full HTTP surface with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(generate::router())
        .merge(apps::router())
        .merge(gallery::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
