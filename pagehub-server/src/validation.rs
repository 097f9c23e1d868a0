//! Upload input checks and filename normalization.
//!
//! Everything here is pure so the boundary validation in the upload handler
//! stays a straight-line read.

use chrono::{NaiveDate, Utc};

pub const ALLOWED_HTML_EXTENSIONS: &[&str] = &["html", "htm"];
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg"];

/// Extension check, case-insensitive. A bare name or a dotfile with no stem
/// never passes.
pub fn has_allowed_extension(filename: &str, allowed: &[&str]) -> bool {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            allowed.iter().any(|a| ext.eq_ignore_ascii_case(a))
        }
        _ => false,
    }
}

/// Reduce an uploaded filename to a safe basename: path components dropped,
/// whitespace collapsed to `_`, anything outside `[A-Za-z0-9._-]` removed,
/// leading/trailing dots stripped.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
        } else if c.is_whitespace() {
            out.push('_');
        }
    }
    out.trim_matches('.').to_string()
}

/// A page's unique key: the sanitized filename minus its extension.
pub fn derive_page_name(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => filename.to_string(),
    }
}

/// Parse a `YYYY-MM-DD` form value; missing or malformed input falls back
/// to the current UTC date.
pub fn parse_publish_date(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or_else(|| Utc::now().date_naive())
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_checks_are_case_insensitive() {
        assert!(has_allowed_extension("page.html", ALLOWED_HTML_EXTENSIONS));
        assert!(has_allowed_extension("page.HTM", ALLOWED_HTML_EXTENSIONS));
        assert!(has_allowed_extension("photo.PNG", ALLOWED_IMAGE_EXTENSIONS));
        assert!(!has_allowed_extension("notes.txt", ALLOWED_HTML_EXTENSIONS));
        assert!(!has_allowed_extension("noextension", ALLOWED_HTML_EXTENSIONS));
        assert!(!has_allowed_extension(".html", ALLOWED_HTML_EXTENSIONS));
    }

    #[test]
    fn sanitize_strips_paths_and_unsafe_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("dir\\sub\\page one.html"), "page_one.html");
        assert_eq!(sanitize_filename("café photo!.png"), "caf_photo.png");
        assert_eq!(sanitize_filename("..hidden.html"), "hidden.html");
    }

    #[test]
    fn page_name_drops_only_the_extension() {
        assert_eq!(derive_page_name("page1.html"), "page1");
        assert_eq!(derive_page_name("archive.2024.htm"), "archive.2024");
        assert_eq!(derive_page_name("noextension"), "noextension");
    }

    #[test]
    fn publish_date_falls_back_to_today() {
        assert_eq!(parse_publish_date(Some("2024-05-17")), "2024-05-17");
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(parse_publish_date(Some("not-a-date")), today);
        assert_eq!(parse_publish_date(None), today);
    }
}
