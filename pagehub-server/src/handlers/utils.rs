use axum::http::HeaderMap;
use serde_json::{json, Value};

use pagehub_db::pages::PagesRow;

/// AJAX callers are detected by the header their form script sets; they get
/// JSON bodies where browser navigation gets redirects.
pub fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false)
}

/// Public JSON shape of a page. The password hash never leaves the store.
pub fn page_to_payload(row: &PagesRow) -> Value {
    json!({
        "name": row.name,
        "title": row.title,
        "content": row.content,
        "date": row.date,
        "filename": row.filename,
        "images": row.image_list(),
    })
}
