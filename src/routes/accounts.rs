//! Account lifecycle: join, confirmation links, sessions, deletion,
//! recovery, email changes. Confirmation endpoints are GET because they
//! are opened from email links.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse};
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
        .route("/join", post(join))
        .route("/confirm/{token}", get(confirm))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/deleteaccount", post(delete_account))
        .route("/confirmdelete/{token}", get(confirm_delete))
        .route("/recover", post(recover))
        .route("/backup/{code}", post(backup))
        .route("/confirmrecover/{token}", post(confirm_recover))
        .route("/confirmemail/{token}", get(confirm_email))
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct JoinForm {
    email: String,
    username: String,
    password: String,
    /// Terms acceptance. A refusal still validates the inputs but creates
    /// nothing.
    #[serde(default = "default_true")]
    acceptable: bool,
}

async fn join(State(state): State<AppState>, Form(form): Form<JoinForm>) -> AppResult<Json<serde_json::Value>> {
    let backup = state.pipeline.create_account(
        &form.email,
        &form.username,
        &form.password,
        form.acceptable,
    )?;
    // The backup code is shown exactly once, here.
    Ok(Json(json!({ "success": 1, "backup": backup })))
}

async fn confirm(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.confirm_create(&token)?;
    Ok(ok())
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<impl IntoResponse> {
    let token = state.pipeline.login(&form.username, &form.password)?;
    let cookie = format!("session={}; HttpOnly; SameSite=Strict; Path=/", token);
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), ok()))
}

async fn logout(
    State(state): State<AppState>,
    session: SessionToken,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.logout(&session.require()?)?;
    Ok(ok())
}

#[derive(Deserialize)]
struct PasswordForm {
    password: String,
}

async fn delete_account(
    State(state): State<AppState>,
    session: SessionToken,
    Form(form): Form<PasswordForm>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .pipeline
        .delete_account(&session.require()?, &form.password)?;
    Ok(ok())
}

async fn confirm_delete(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.confirm_delete(&token)?;
    Ok(ok())
}

#[derive(Deserialize)]
struct EmailForm {
    email: String,
}

async fn recover(
    State(state): State<AppState>,
    Form(form): Form<EmailForm>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.recover_account(&form.email)?;
    Ok(ok())
}

async fn backup(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Form(form): Form<EmailForm>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.backup_recover(&code, &form.email)?;
    Ok(ok())
}

async fn confirm_recover(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Form(form): Form<PasswordForm>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.confirm_recover(&token, &form.password)?;
    Ok(ok())
}

async fn confirm_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.confirm_email(&token)?;
    Ok(ok())
}
