use std::sync::Arc;

use axum::extract::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::ApiError,
    state::AppState,
    validation::{derive_page_name, sanitize_filename},
};
use pagehub_db::pages as db_pages;

#[derive(Debug, Deserialize)]
pub struct CheckExistingRequest {
    pub filename: String,
}

/// Pre-flight lookup for the upload form: given the filename the client is
/// about to submit, report whether that page already exists and return the
/// stored fields so the form can pre-populate. Read-only.
pub async fn check_existing(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<CheckExistingRequest>,
) -> Result<Json<Value>, ApiError> {
    // Same normalization as the upload path, so the key we probe is the key
    // an upload of this filename would write.
    let name = derive_page_name(&sanitize_filename(&req.filename));

    let mut conn = state.db_pool.acquire().await.map_err(ApiError::from)?;
    let existing = db_pages::find_by_name(&mut *conn, &name)
        .await
        .map_err(ApiError::from)?;

    match existing {
        Some(row) => Ok(Json(json!({
            "exists": true,
            "name": row.name,
            "title": row.title,
            "content": row.content,
            "date": row.date,
        }))),
        None => Ok(Json(json!({ "exists": false }))),
    }
}
