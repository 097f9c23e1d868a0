//! Commit-based file publishing through the GitHub contents API.
//!
//! Each publish fetches the current blob SHA for the target path (the
//! revision handle), then either updates in place with that SHA or creates
//! the file when the fetch reports 404. Re-publishing a path overwrites it
//! with a new revision; a stale SHA is rejected by GitHub with 409 and
//! surfaces as [`PublishError::Conflict`] so callers can retry instead of
//! silently losing a concurrent write.

use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Errors surfaced by the publisher.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("network error: {0}")]
    Network(String),
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("revision conflict publishing {path}: the file changed underneath us")]
    Conflict { path: String },
    #[error("failed to parse GitHub response: {0}")]
    Parse(String),
}

/// File payload handed to the publisher. Binary data is base64-encoded for
/// transmission; text is handed over as a string (the contents API carries
/// both base64-encoded on the wire).
#[derive(Debug, Clone)]
pub enum PublishContent {
    Text(String),
    Binary(Vec<u8>),
}

impl PublishContent {
    /// Encode for the contents API `content` field.
    pub fn encode(&self) -> String {
        let engine = base64::engine::general_purpose::STANDARD;
        match self {
            PublishContent::Text(s) => engine.encode(s.as_bytes()),
            PublishContent::Binary(b) => engine.encode(b),
        }
    }
}

/// Whether a publish created the file or replaced an existing revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Created,
    Updated,
}

/// Object-safe publishing interface so handlers can hold an
/// `Arc<dyn Publisher>` and tests can substitute a double.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Create or overwrite the file at `path` with a new commit.
    async fn publish(
        &self,
        path: &str,
        content: PublishContent,
        message: &str,
    ) -> Result<PublishOutcome, PublishError>;

    /// Check that the configured repository is reachable.
    async fn verify_repo(&self) -> Result<(), PublishError>;
}

/// Response structure for the contents API metadata fetch.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
}

/// Publisher backed by the GitHub contents API.
#[derive(Debug, Clone)]
pub struct GithubPublisher {
    client: Client,
    token: String,
    repo: String,
    branch: String,
    api_base: String,
}

impl GithubPublisher {
    pub fn new(
        token: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("pagehub/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("failed to build HTTP client"),
            token: token.into(),
            repo: repo.into(),
            branch: branch.into(),
            api_base: GITHUB_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API root. Test hook.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.api_base, self.repo, path)
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    /// Fetch the current blob SHA for `path`, or `None` when the file does
    /// not exist on the configured branch. Any status other than success or
    /// 404 propagates as a publish failure.
    async fn fetch_sha(&self, path: &str) -> Result<Option<String>, PublishError> {
        let url = self.contents_url(path);
        let response = self
            .request(self.client.get(&url))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Parse(e.to_string()))?;
        Ok(Some(contents.sha))
    }
}

#[async_trait::async_trait]
impl Publisher for GithubPublisher {
    async fn publish(
        &self,
        path: &str,
        content: PublishContent,
        message: &str,
    ) -> Result<PublishOutcome, PublishError> {
        let sha = self.fetch_sha(path).await?;
        let outcome = match sha {
            Some(_) => PublishOutcome::Updated,
            None => PublishOutcome::Created,
        };

        let mut body = json!({
            "message": message,
            "content": content.encode(),
            "branch": self.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }

        debug!(%path, branch = %self.branch, ?outcome, "publishing file");

        let response = self
            .request(self.client.put(self.contents_url(path)))
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(outcome),
            StatusCode::CONFLICT => {
                warn!(%path, "stale revision handle rejected by GitHub");
                Err(PublishError::Conflict {
                    path: path.to_string(),
                })
            }
            _ => Err(api_error(response).await),
        }
    }

    async fn verify_repo(&self) -> Result<(), PublishError> {
        let url = format!("{}/repos/{}", self.api_base, self.repo);
        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }
}

/// Turn a failed response into an API error, preferring the provider's own
/// `message` field when the body is JSON.
async fn api_error(response: reqwest::Response) -> PublishError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or(body);
    PublishError::Api { status, message }
}

// ============================================================================
// Test Publisher
// ============================================================================

/// In-memory publisher double used by handler tests. Records every publish
/// and reproduces the create-then-update distinction of the real client.
#[derive(Debug)]
pub struct RecordingPublisher {
    published: std::sync::Mutex<Vec<PublishedFile>>,
    repo_ok: bool,
    fail_paths_containing: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PublishedFile {
    pub path: String,
    pub content: PublishContent,
    pub message: String,
    pub outcome: PublishOutcome,
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            published: std::sync::Mutex::new(Vec::new()),
            repo_ok: true,
            fail_paths_containing: None,
        }
    }

    /// Make every publish whose path contains `needle` fail with an API error.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_paths_containing = Some(needle.into());
        self
    }

    pub fn unreachable_repo() -> Self {
        Self {
            published: std::sync::Mutex::new(Vec::new()),
            repo_ok: false,
            fail_paths_containing: None,
        }
    }

    pub fn published(&self) -> Vec<PublishedFile> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_paths(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.path.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        path: &str,
        content: PublishContent,
        message: &str,
    ) -> Result<PublishOutcome, PublishError> {
        if let Some(needle) = &self.fail_paths_containing {
            if path.contains(needle.as_str()) {
                return Err(PublishError::Api {
                    status: 422,
                    message: format!("refused by test double: {path}"),
                });
            }
        }
        let mut published = self.published.lock().unwrap();
        let outcome = if published.iter().any(|f| f.path == path) {
            PublishOutcome::Updated
        } else {
            PublishOutcome::Created
        };
        published.push(PublishedFile {
            path: path.to_string(),
            content,
            message: message.to_string(),
            outcome,
        });
        Ok(outcome)
    }

    async fn verify_repo(&self) -> Result<(), PublishError> {
        if self.repo_ok {
            Ok(())
        } else {
            Err(PublishError::Api {
                status: 404,
                message: "repository unreachable".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_content_is_base64_encoded() {
        let content = PublishContent::Binary(vec![0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(content.encode(), "iVBORw==");
    }

    #[test]
    fn text_content_round_trips_through_base64() {
        let content = PublishContent::Text("<html></html>".to_string());
        let engine = base64::engine::general_purpose::STANDARD;
        let decoded = engine.decode(content.encode()).expect("decode");
        assert_eq!(decoded, b"<html></html>");
    }

    #[tokio::test]
    async fn recording_publisher_distinguishes_create_from_update() {
        let publisher = RecordingPublisher::new();
        let first = publisher
            .publish(
                "public/pages/page1.html",
                PublishContent::Text("<p>1</p>".into()),
                "Add HTML file: page1.html",
            )
            .await
            .expect("first publish");
        assert_eq!(first, PublishOutcome::Created);

        let second = publisher
            .publish(
                "public/pages/page1.html",
                PublishContent::Text("<p>2</p>".into()),
                "Update HTML file: page1.html",
            )
            .await
            .expect("second publish");
        assert_eq!(second, PublishOutcome::Updated);

        // overwrite, not duplicate: two records, one path
        let published = publisher.published();
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|f| f.path == "public/pages/page1.html"));
    }

    #[tokio::test]
    async fn recording_publisher_failure_is_scoped_to_matching_paths() {
        let publisher = RecordingPublisher::new().failing_on("broken.png");
        let err = publisher
            .publish(
                "public/images/broken.png",
                PublishContent::Binary(vec![1]),
                "Add/update image file: broken.png",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Api { status: 422, .. }));

        publisher
            .publish(
                "public/images/fine.png",
                PublishContent::Binary(vec![2]),
                "Add/update image file: fine.png",
            )
            .await
            .expect("sibling publish still works");
        assert_eq!(publisher.published_paths(), vec!["public/images/fine.png"]);
    }
}
