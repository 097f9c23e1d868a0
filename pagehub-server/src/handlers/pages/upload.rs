use std::sync::Arc;

use axum::extract::{Extension, Multipart};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::utils::is_ajax;
use crate::rewrite::rewrite_image_sources;
use crate::state::AppState;
use crate::validation::{
    derive_page_name, has_allowed_extension, parse_publish_date, sanitize_filename,
    ALLOWED_HTML_EXTENSIONS, ALLOWED_IMAGE_EXTENSIONS,
};
use pagehub_db::pages as db_pages;
use pagehub_github::PublishContent;

/// Repository prefixes beneath the published site's public root.
pub const PAGES_PREFIX: &str = "public/pages";
pub const IMAGES_PREFIX: &str = "public/images";

const UPLOAD_FORM_HTML: &str = include_str!("../../../assets/upload.html");

/// Serve the embedded upload form.
pub async fn form() -> Html<&'static str> {
    Html(UPLOAD_FORM_HTML)
}

/// Multipart fields collected into an explicit shape before any of them is
/// acted on. Unknown fields are ignored.
#[derive(Debug, Default)]
struct UploadForm {
    html_file: Option<(String, Vec<u8>)>,
    image_files: Vec<(String, Vec<u8>)>,
    title: Option<String>,
    content: Option<String>,
    date: Option<String>,
    password: Option<String>,
}

async fn collect_form(multipart: &mut Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "html_file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                form.html_file = Some((filename, data.to_vec()));
            }
            "image_files" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                // browsers submit one empty part when no file was picked
                if filename.is_empty() && data.is_empty() {
                    continue;
                }
                form.image_files.push((filename, data.to_vec()));
            }
            "title" => form.title = Some(text_field(field).await?),
            "content" => form.content = Some(text_field(field).await?),
            "date" => form.date = Some(text_field(field).await?),
            "password" => form.password = Some(text_field(field).await?),
            _ => {}
        }
    }

    Ok(form)
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Validation / publish failure reply: 400 JSON for AJAX callers, a plain
/// redirect back to the form otherwise (flash messaging is deliberately
/// absent).
fn failure(ajax: bool, message: &str) -> Response {
    if ajax {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": message })),
        )
            .into_response()
    } else {
        Redirect::to("/upload").into_response()
    }
}

fn success(
    ajax: bool,
    message: &str,
    name: &str,
    images: &[String],
    image_results: Vec<Value>,
) -> Response {
    if ajax {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": message,
                "name": name,
                "images": images,
                "image_results": image_results,
            })),
        )
            .into_response()
    } else {
        Redirect::to("/").into_response()
    }
}

/// Handle a page upload: validate, rewrite image paths, publish HTML then
/// images to the repository, and upsert the page document.
///
/// There is no rollback across the publish/upsert boundary; a failure
/// between the two leaves already-pushed files in the repository.
pub async fn upload(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let ajax = is_ajax(&headers);
    let form = collect_form(&mut multipart).await?;

    let Some((raw_filename, html_bytes)) = form.html_file else {
        return Ok(failure(ajax, "HTML file is missing."));
    };
    if raw_filename.is_empty() || html_bytes.is_empty() {
        return Ok(failure(ajax, "No HTML file selected."));
    }
    if !has_allowed_extension(&raw_filename, ALLOWED_HTML_EXTENSIONS) {
        return Ok(failure(ajax, "File type not allowed."));
    }
    let password = match form.password.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => return Ok(failure(ajax, "A password is required.")),
    };

    let html_filename = sanitize_filename(&raw_filename);
    if html_filename.is_empty() {
        return Ok(failure(ajax, "Invalid HTML filename."));
    }
    let html_text = match String::from_utf8(html_bytes) {
        Ok(t) => t,
        Err(_) => return Ok(failure(ajax, "HTML file is not valid UTF-8.")),
    };

    let rewritten = match rewrite_image_sources(&html_text) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!(error = %e, filename = %html_filename, "uploaded HTML could not be rewritten");
            return Ok(failure(ajax, "HTML file could not be parsed."));
        }
    };

    let publisher = state.publisher();
    let html_path = format!("{PAGES_PREFIX}/{html_filename}");
    if let Err(e) = publisher
        .publish(
            &html_path,
            PublishContent::Text(rewritten),
            &format!("Add/update HTML file: {html_filename}"),
        )
        .await
    {
        tracing::warn!(error = %e, path = %html_path, "publishing HTML failed");
        return Ok(failure(ajax, &format!("GitHub upload failed: {e}")));
    }

    // Images are best-effort: each failure is recorded and siblings continue.
    let mut uploaded_images: Vec<String> = Vec::new();
    let mut image_results: Vec<Value> = Vec::new();
    for (raw_image_name, bytes) in form.image_files {
        if !has_allowed_extension(&raw_image_name, ALLOWED_IMAGE_EXTENSIONS) {
            tracing::warn!(filename = %raw_image_name, "rejected image with disallowed extension");
            image_results.push(json!({
                "filename": raw_image_name,
                "success": false,
                "message": "file type not allowed",
            }));
            continue;
        }
        let image_filename = sanitize_filename(&raw_image_name);
        if image_filename.is_empty() {
            image_results.push(json!({
                "filename": raw_image_name,
                "success": false,
                "message": "invalid filename",
            }));
            continue;
        }

        let image_path = format!("{IMAGES_PREFIX}/{image_filename}");
        match publisher
            .publish(
                &image_path,
                PublishContent::Binary(bytes),
                &format!("Add/update image file: {image_filename}"),
            )
            .await
        {
            Ok(_) => {
                uploaded_images.push(image_filename.clone());
                image_results.push(json!({ "filename": image_filename, "success": true }));
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %image_path, "publishing image failed");
                image_results.push(json!({
                    "filename": image_filename,
                    "success": false,
                    "message": e.to_string(),
                }));
            }
        }
    }

    let name = derive_page_name(&html_filename);
    let date = parse_publish_date(form.date.as_deref());
    let password_hash =
        pagehub_auth::hash_password(&password).map_err(|e| ApiError::Unexpected(e.to_string()))?;

    let now = chrono::Utc::now().to_rfc3339();
    let row = db_pages::PagesRow {
        name: name.clone(),
        title: form.title.unwrap_or_default(),
        content: form.content.unwrap_or_default(),
        date,
        filename: html_filename,
        images: db_pages::PagesRow::encode_images(&uploaded_images),
        password_hash,
        created_at: now.clone(),
        updated_at: now,
    };

    let mut conn = state.db_pool.acquire().await.map_err(ApiError::from)?;
    let outcome = db_pages::upsert_by_name(&mut conn, &row)
        .await
        .map_err(ApiError::from)?;

    let message = match outcome {
        db_pages::UpsertOutcome::Inserted => "Files uploaded; page record created.",
        db_pages::UpsertOutcome::Updated => "Files uploaded; page record updated.",
    };
    tracing::info!(page = %name, images = uploaded_images.len(), ?outcome, "upload complete");

    Ok(success(ajax, message, &name, &uploaded_images, image_results))
}
