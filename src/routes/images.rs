//! Image upload, deletion and serving. Images are publicly addressable by
//! access id only; on-disk filenames stay internal.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use super::ok;
use crate::error::{AppError, AppResult};
use crate::extractors::SessionToken;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/deleteimg/{imgid}", post(delete))
        .route("/userimg/{accessid}", get(serve))
        .route("/images", get(list))
}

/// Multipart upload: the `file` part's filename doubles as the image title
/// and carries the extension.
async fn upload(
    State(state): State<AppState>,
    session: SessionToken,
    mut multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let session = session.require()?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::BadImage)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let title = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|_| AppError::BadImage)?;
        let accessid = state.pipeline.upload_image(&session, &title, &bytes)?;
        return Ok(Json(json!({ "success": 1, "imgid": accessid })));
    }
    Err(AppError::BadImage)
}

async fn delete(
    State(state): State<AppState>,
    session: SessionToken,
    Path(imgid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.pipeline.delete_image(&session.require()?, &imgid)?;
    Ok(ok())
}

async fn serve(
    State(state): State<AppState>,
    Path(accessid): Path<String>,
) -> AppResult<Response> {
    let path = state.pipeline.get_image(&accessid)?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    // Uploads are capped at 1 MB, so reading whole files is fine.
    let bytes = tokio::fs::read(&path).await?;
    Ok((
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        Body::from(bytes),
    )
        .into_response())
}

async fn list(
    State(state): State<AppState>,
    session: SessionToken,
) -> AppResult<Json<serde_json::Value>> {
    let images = state.pipeline.list_images(&session.require()?)?;
    Ok(Json(json!({ "success": 1, "images": images })))
}
