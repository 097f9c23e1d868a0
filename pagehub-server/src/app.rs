use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::handlers::pages;
use crate::state::AppState;

// Default body limit: 50 MB (an HTML page plus a handful of images)
const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Build the primary axum router with the provided shared application state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(pages::list::list))
        .route(
            "/upload",
            get(pages::upload::form).post(pages::upload::upload),
        )
        .route("/check_existing", post(pages::check_existing::check_existing))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(Extension(state))
}

async fn health_handler() -> impl IntoResponse {
    // Liveness: always return 200 OK when process is alive.
    (axum::http::StatusCode::OK, "OK")
}

async fn ready_handler() -> impl IntoResponse {
    // Readiness: this router only exists when startup reached a usable
    // repository; the maintenance router answers 503 otherwise.
    (axum::http::StatusCode::OK, "OK")
}
