//! Query functions for the `pages` collection.
//!
//! A page is keyed by its derived name (upload filename minus extension).
//! Upserts replace every document field; only `name` and `created_at`
//! survive from the stored row.

use sqlx::Executor;

use crate::DbBackend;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct PagesRow {
    pub name: String,
    pub title: String,
    pub content: String,
    /// Publish date as `YYYY-MM-DD` (ISO dates sort lexicographically).
    pub date: String,
    pub filename: String,
    /// JSON array of sanitized image filenames, upload order preserved.
    pub images: String,
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PagesRow {
    /// Decode the stored `images` JSON array. A row written by this crate
    /// always holds a valid array; anything else decodes to empty.
    pub fn image_list(&self) -> Vec<String> {
        serde_json::from_str::<Vec<String>>(&self.images).unwrap_or_default()
    }

    pub fn encode_images(images: &[String]) -> String {
        serde_json::to_string(images).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Whether an upsert stored a fresh document or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

const SELECT_COLUMNS: &str = "name, title, content, date, filename, images, password_hash, created_at, updated_at";

pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<PagesRow>, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query_as::<_, PagesRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM pages WHERE name = ?"
    ))
    .bind(name)
    .fetch_optional(executor)
    .await
}

/// Up to `limit` pages, newest publish date first. Ties on `date` resolve
/// by `created_at` ascending so the ordering stays deterministic.
pub async fn find_recent<'e, E>(executor: E, limit: i64) -> Result<Vec<PagesRow>, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query_as::<_, PagesRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM pages ORDER BY date DESC, created_at ASC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(executor)
    .await
}

pub async fn insert_page<'e, E>(executor: E, row: &PagesRow) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query(
        "INSERT INTO pages (name, title, content, date, filename, images, password_hash, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&row.name)
    .bind(&row.title)
    .bind(&row.content)
    .bind(&row.date)
    .bind(&row.filename)
    .bind(&row.images)
    .bind(&row.password_hash)
    .bind(&row.created_at)
    .bind(&row.updated_at)
    .execute(executor)
    .await
    .map(|_| ())
}

/// Full-document replace of the row matching `name`. `created_at` is left
/// untouched; it records first insertion and orders `find_recent` ties.
pub async fn update_by_name<'e, E>(
    executor: E,
    name: &str,
    row: &PagesRow,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query(
        "UPDATE pages SET title = ?, content = ?, date = ?, filename = ?, images = ?, \
         password_hash = ?, updated_at = ? WHERE name = ?",
    )
    .bind(&row.title)
    .bind(&row.content)
    .bind(&row.date)
    .bind(&row.filename)
    .bind(&row.images)
    .bind(&row.password_hash)
    .bind(&row.updated_at)
    .bind(name)
    .execute(executor)
    .await
    .map(|r| r.rows_affected())
}

/// Insert-if-absent, else full-document replace, keyed by `name`.
///
/// Two statements on one connection; concurrent writers to the same name
/// are resolved by the store's per-row atomicity, nothing stronger.
pub async fn upsert_by_name(
    conn: &mut sqlx::pool::PoolConnection<DbBackend>,
    row: &PagesRow,
) -> Result<UpsertOutcome, sqlx::Error> {
    let existing = find_by_name(&mut **conn, &row.name).await?;
    match existing {
        Some(_) => {
            update_by_name(&mut **conn, &row.name, row).await?;
            Ok(UpsertOutcome::Updated)
        }
        None => {
            insert_page(&mut **conn, row).await?;
            Ok(UpsertOutcome::Inserted)
        }
    }
}
