//! Image path normalization for uploaded HTML.
//!
//! Every `img` with a non-empty `src` is rewritten to `/images/<basename>`
//! so the published page resolves its images from the canonical images
//! prefix no matter how the author organized files locally.

use lol_html::{element, rewrite_str, RewriteStrSettings};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("html rewrite failed: {0}")]
    Rewriting(String),
}

/// Rewrite all image references to `/images/<basename>`. Pure and
/// deterministic; elements without a `src`, or with an empty one, pass
/// through untouched.
pub fn rewrite_image_sources(html: &str) -> Result<String, RewriteError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img[src]", |el| {
                if let Some(src) = el.get_attribute("src") {
                    if !src.is_empty() {
                        el.set_attribute("src", &format!("/images/{}", image_basename(&src)))?;
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| RewriteError::Rewriting(e.to_string()))
}

/// Basename of an image reference: query string and fragment cut off,
/// directory components (either separator) dropped.
fn image_basename(src: &str) -> &str {
    let src = src.split(['?', '#']).next().unwrap_or(src);
    src.rsplit(['/', '\\']).next().unwrap_or(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_directories_are_discarded() {
        let html = r#"<p>hi</p><img src="sub/dir/photo.png">"#;
        let out = rewrite_image_sources(html).expect("rewrite");
        assert!(out.contains(r#"src="/images/photo.png""#));
        assert!(out.contains("<p>hi</p>"));
    }

    #[test]
    fn query_strings_are_discarded() {
        let html = r#"<img src="assets/photo.png?v=3&cache=no">"#;
        let out = rewrite_image_sources(html).expect("rewrite");
        assert!(out.contains(r#"src="/images/photo.png""#));
    }

    #[test]
    fn absolute_urls_keep_only_the_basename() {
        let html = r#"<img src="https://cdn.example.com/a/b/logo.svg">"#;
        let out = rewrite_image_sources(html).expect("rewrite");
        assert!(out.contains(r#"src="/images/logo.svg""#));
    }

    #[test]
    fn bare_filenames_still_move_under_images() {
        let html = r#"<img src="photo.png" alt="x">"#;
        let out = rewrite_image_sources(html).expect("rewrite");
        assert!(out.contains(r#"src="/images/photo.png""#));
        assert!(out.contains(r#"alt="x""#));
    }

    #[test]
    fn images_without_src_are_untouched() {
        let html = r#"<img alt="no source"><img src="">"#;
        let out = rewrite_image_sources(html).expect("rewrite");
        assert!(out.contains(r#"<img alt="no source">"#));
        assert!(out.contains(r#"<img src="">"#));
    }

    #[test]
    fn multiple_images_all_rewritten() {
        let html = r#"<img src="a/one.png"><div><img src="b/c/two.jpg"></div>"#;
        let out = rewrite_image_sources(html).expect("rewrite");
        assert!(out.contains(r#"src="/images/one.png""#));
        assert!(out.contains(r#"src="/images/two.jpg""#));
    }
}
