//! Posts, comments and votes.

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
        .route("/post/{pid}", get(view))
        .route("/write", post(write))
        .route("/editpost/{pid}", post(edit))
        .route("/deletepost/{pid}", post(delete))
        .route("/comment", post(comment))
        .route("/deletecomment/{cid}", post(delete_comment))
        .route("/like/{pid}", post(like))
        .route("/unlike/{pid}", post(unlike))
        .route("/dislike/{pid}", post(dislike))
}

async fn view(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let post = state.pipeline.get_post(&pid)?;
    Ok(Json(json!({ "success": 1, "post": post })))
}

#[derive(Deserialize)]
struct PostForm {
    title: String,
    content: String,
}

async fn write(
    State(state): State<AppState>,
    session: SessionToken,
    Form(form): Form<PostForm>,
) -> AppResult<Json<serde_json::Value>> {
    let pid = state
        .pipeline
        .write_post(&session.require()?, &form.title, &form.content)?;
    Ok(Json(json!({ "success": 1, "pid": pid })))
}

async fn edit(
    State(state): State<AppState>,
    session: SessionToken,
    Path(pid): Path<String>,
    Form(form): Form<PostForm>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .pipeline
        .edit_post(&session.require()?, &pid, &form.title, &form.content)?;
    Ok(ok())
}

async fn delete(
    State(state): State<AppState>,
    session: SessionToken,
    Path(pid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.delete_post(&session.require()?, &pid)?;
    Ok(ok())
}

#[derive(Deserialize)]
struct CommentForm {
    pid: String,
    content: String,
}

async fn comment(
    State(state): State<AppState>,
    session: SessionToken,
    Form(form): Form<CommentForm>,
) -> AppResult<Json<serde_json::Value>> {
    let cid = state
        .pipeline
        .comment(&session.require()?, &form.pid, &form.content)?;
    Ok(Json(json!({ "success": 1, "cid": cid })))
}

async fn delete_comment(
    State(state): State<AppState>,
    session: SessionToken,
    Path(cid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.delete_comment(&session.require()?, &cid)?;
    Ok(ok())
}

async fn like(
    State(state): State<AppState>,
    session: SessionToken,
    Path(pid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.like(&session.require()?, &pid)?;
    Ok(ok())
}

async fn unlike(
    State(state): State<AppState>,
    session: SessionToken,
    Path(pid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.unlike(&session.require()?, &pid)?;
    Ok(ok())
}

async fn dislike(
    State(state): State<AppState>,
    session: SessionToken,
    Path(pid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.dislike(&session.require()?, &pid)?;
    Ok(ok())
}
