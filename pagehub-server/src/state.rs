use std::sync::Arc;

use pagehub_github::Publisher;

/// Shared application state passed to every route handler.
///
/// Constructed once in `main` and injected via `Extension`; handlers never
/// touch process-global clients. The publisher is held behind `Arc<dyn _>`
/// so tests can substitute a double.
pub struct AppState {
    pub db_pool: Arc<pagehub_db::DbPool>,
    publisher: Arc<dyn Publisher>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            db_pool: Arc::clone(&self.db_pool),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl AppState {
    /// Build a fully initialised state container from its constituent parts.
    pub fn new(db_pool: pagehub_db::DbPool, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            db_pool: Arc::new(db_pool),
            publisher,
        }
    }

    pub fn publisher(&self) -> Arc<dyn Publisher> {
        Arc::clone(&self.publisher)
    }
}
