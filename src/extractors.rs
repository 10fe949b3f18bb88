use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// The raw session cookie, if the request carries one. No validation
/// happens here; the pipeline owns that.
pub struct SessionToken(pub Option<String>);

impl SessionToken {
    /// The token, or the invalid-token error every authenticated
    /// operation raises for a missing session.
    pub fn require(self) -> Result<String, AppError> {
        self.0.ok_or(AppError::InvalidToken)
    }
}

impl FromRequestParts<AppState> for SessionToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|s| s.split(';'))
            .map(|s| s.trim())
            .find_map(|cookie| {
                let (key, val) = cookie.split_once('=')?;
                if key.trim() == "session" {
                    Some(val.trim().to_string())
                } else {
                    None
                }
            });
        Ok(SessionToken(token))
    }
}
