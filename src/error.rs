use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// One variant per pipeline rule, plus internal failures that must never be
/// confused with user-input errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid email address")]
    InvalidEmail,

    #[error("invalid username")]
    InvalidUsername,

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid status text")]
    InvalidStatus,

    #[error("invalid post body")]
    InvalidPost,

    #[error("invalid title")]
    InvalidTitle,

    #[error("image rejected")]
    BadImage,

    #[error("invalid comment")]
    InvalidComment,

    #[error("invalid bug report")]
    InvalidReport,

    #[error("invalid search query")]
    InvalidQuery,

    #[error("no such user")]
    NoSuchUser,

    #[error("no such post")]
    NoSuchPost,

    #[error("no such image")]
    NoSuchImage,

    #[error("not authorized")]
    NotAuthorized,

    #[error("account suspended")]
    AccountSuspended,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable identifier surfaced on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidEmail => "invalid-email",
            AppError::InvalidUsername => "invalid-username",
            AppError::InvalidPassword => "invalid-password",
            AppError::InvalidToken => "invalid-token",
            AppError::InvalidStatus => "invalid-status",
            AppError::InvalidPost => "invalid-post",
            AppError::InvalidTitle => "invalid-title",
            AppError::BadImage => "bad-image",
            AppError::InvalidComment => "invalid-comment",
            AppError::InvalidReport => "invalid-report",
            AppError::InvalidQuery => "invalid-query",
            AppError::NoSuchUser => "no-such-user",
            AppError::NoSuchPost => "no-such-post",
            AppError::NoSuchImage => "no-such-image",
            AppError::NotAuthorized => "not-authorized",
            AppError::AccountSuspended => "account-suspended",
            AppError::RateLimitExceeded => "rate-limit-exceeded",
            AppError::Database(_) | AppError::Pool(_) | AppError::Io(_) | AppError::Internal(_) => {
                "internal-error"
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidEmail
            | AppError::InvalidUsername
            | AppError::InvalidPassword
            | AppError::InvalidStatus
            | AppError::InvalidPost
            | AppError::InvalidTitle
            | AppError::BadImage
            | AppError::InvalidComment
            | AppError::InvalidReport
            | AppError::InvalidQuery => StatusCode::BAD_REQUEST,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::NoSuchUser | AppError::NoSuchPost | AppError::NoSuchImage => {
                StatusCode::NOT_FOUND
            }
            AppError::NotAuthorized | AppError::AccountSuspended => StatusCode::FORBIDDEN,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Pool(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(e) => tracing::error!("database error: {}", e),
            AppError::Pool(e) => tracing::error!("pool error: {}", e),
            AppError::Io(e) => tracing::error!("io error: {}", e),
            AppError::Internal(msg) => tracing::error!("internal error: {}", msg),
            _ => {}
        }

        let body = Json(json!({ "success": 0, "error": self.kind() }));
        (self.status(), body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
