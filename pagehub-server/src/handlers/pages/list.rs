use std::sync::Arc;

use axum::extract::{Extension, Json};
use serde_json::Value;

use crate::{error::ApiError, handlers::utils::page_to_payload, state::AppState};
use pagehub_db::pages as db_pages;

/// The index shows the most recent handful of pages, not the full archive.
pub const RECENT_PAGE_LIMIT: i64 = 5;

pub async fn list(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let mut conn = state.db_pool.acquire().await.map_err(ApiError::from)?;
    let rows = db_pages::find_recent(&mut *conn, RECENT_PAGE_LIMIT)
        .await
        .map_err(ApiError::from)?;

    let pages: Vec<Value> = rows.iter().map(page_to_payload).collect();
    Ok(Json(serde_json::json!({ "pages": pages })))
}
