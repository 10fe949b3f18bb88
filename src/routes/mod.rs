pub mod accounts;
pub mod admin;
pub mod images;
pub mod posts;
pub mod social;
pub mod users;

use serde_json::{json, Value};

/// The bare success body; handlers with payload extend it.
pub(crate) fn ok() -> axum::Json<Value> {
    axum::Json(json!({ "success": 1 }))
}
