//! Profiles and search.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::ok;
use crate::error::AppResult;
use crate::extractors::SessionToken;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/{uid}", get(user))
        .route("/me", get(me))
        .route("/account", post(account))
        .route("/search/users", get(search_users))
        .route("/search/posts", get(search_posts))
}

async fn user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let profile = state.pipeline.get_user(&uid)?;
    Ok(Json(json!({ "success": 1, "user": profile })))
}

#[derive(Deserialize)]
struct MeQuery {
    #[serde(default)]
    concise: bool,
}

async fn me(
    State(state): State<AppState>,
    session: SessionToken,
    Query(query): Query<MeQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let profile = state
        .pipeline
        .get_my_user(&session.require()?, query.concise)?;
    Ok(Json(json!({ "success": 1, "user": profile })))
}

/// Partial profile update: each present field is applied in order, and the
/// first failure aborts the rest.
#[derive(Deserialize)]
struct AccountForm {
    status: Option<String>,
    username: Option<String>,
    pfp: Option<String>,
    email: Option<String>,
}

async fn account(
    State(state): State<AppState>,
    session: SessionToken,
    Form(form): Form<AccountForm>,
) -> AppResult<Json<serde_json::Value>> {
    let session = session.require()?;
    if let Some(ref status) = form.status {
        state.pipeline.change_status(&session, status)?;
    }
    if let Some(ref username) = form.username {
        state.pipeline.change_username(&session, username)?;
    }
    if let Some(ref pfp) = form.pfp {
        state.pipeline.change_picture(&session, pfp)?;
    }
    if let Some(ref email) = form.email {
        state.pipeline.change_email(&session, email)?;
    }
    Ok(ok())
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    page: i64,
}

async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let hits = state.pipeline.search_users(&query.q, query.page)?;
    Ok(Json(json!({ "success": 1, "users": hits })))
}

async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let hits = state.pipeline.search_posts(&query.q, query.page)?;
    Ok(Json(json!({ "success": 1, "posts": hits })))
}
