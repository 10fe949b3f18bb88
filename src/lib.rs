pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod files;
pub mod limits;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod tokens;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full route surface over a prepared state. Split out of `main` so
/// integration tests can drive the exact router the binary serves.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::accounts::router())
        .merge(routes::users::router())
        .merge(routes::posts::router())
        .merge(routes::images::router())
        .merge(routes::social::router())
        .merge(routes::admin::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
