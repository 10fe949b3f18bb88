//! Friendships and bug reports.

use axum::extract::{Path, State};
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
        .route("/friend/{uid}", post(friend))
        .route("/unfriend/{uid}", post(unfriend))
        .route("/acceptfriend/{uid}", post(accept))
        .route("/friendreqs", get(friend_reqs))
        .route("/bugreport", post(bug_report))
}

async fn friend(
    State(state): State<AppState>,
    session: SessionToken,
    Path(uid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.friend_request(&session.require()?, &uid)?;
    Ok(ok())
}

async fn unfriend(
    State(state): State<AppState>,
    session: SessionToken,
    Path(uid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.unfriend(&session.require()?, &uid)?;
    Ok(ok())
}

async fn accept(
    State(state): State<AppState>,
    session: SessionToken,
    Path(uid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.accept_friend_req(&session.require()?, &uid)?;
    Ok(ok())
}

async fn friend_reqs(
    State(state): State<AppState>,
    session: SessionToken,
) -> AppResult<Json<serde_json::Value>> {
    let reqs = state.pipeline.view_friend_reqs(&session.require()?)?;
    Ok(Json(json!({ "success": 1, "requests": reqs })))
}

#[derive(Deserialize)]
struct ReportForm {
    content: String,
}

async fn bug_report(
    State(state): State<AppState>,
    session: SessionToken,
    Form(form): Form<ReportForm>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.bug_report(&session.require()?, &form.content)?;
    Ok(ok())
}
