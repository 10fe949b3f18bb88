//! Moderation endpoints. Authorization is enforced by the pipeline, not
//! here.

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
        .route("/admin/user/{uid}", get(view_user))
        .route("/admin/suspend/{uid}", post(suspend))
        .route("/admin/unsuspend/{uid}", post(unsuspend))
        .route("/admin/delete/{uid}", post(delete))
}

async fn view_user(
    State(state): State<AppState>,
    session: SessionToken,
    Path(uid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let profile = state.pipeline.admin_get_user(&session.require()?, &uid)?;
    Ok(Json(json!({ "success": 1, "user": profile })))
}

async fn suspend(
    State(state): State<AppState>,
    session: SessionToken,
    Path(uid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.admin_suspend(&session.require()?, &uid)?;
    Ok(ok())
}

async fn unsuspend(
    State(state): State<AppState>,
    session: SessionToken,
    Path(uid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.admin_unsuspend(&session.require()?, &uid)?;
    Ok(ok())
}

#[derive(Deserialize)]
struct PasswordForm {
    password: String,
}

async fn delete(
    State(state): State<AppState>,
    session: SessionToken,
    Path(uid): Path<String>,
    Form(form): Form<PasswordForm>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .pipeline
        .admin_delete(&session.require()?, &uid, &form.password)?;
    Ok(ok())
}
