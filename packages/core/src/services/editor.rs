//! Editor Configuration
//!
//! Content items carry two parallel representations: `content_markup` (the
//! editable source) and `content_html` (the rendered output). Which one is
//! authoritative depends on the editor the host application gives its users,
//! so saving and URL renaming take an [`EditorConfig`] value describing that
//! editor: an optional markup renderer and an optional rewrite-pattern pair
//! for rewriting stored URL references when a page moves.
//!
//! The config is plain data passed into each call. Hosts build one at
//! startup and thread it through; two hosts with different editors can share
//! one core without global state.
//!
//! # Examples
//!
//! ```rust
//! use fiber_core::services::editor::EditorConfig;
//!
//! // Markdown editing: markup is authoritative, HTML is re-rendered on save
//! let markdown = EditorConfig::markdown();
//! assert!(markdown.renderer.is_some());
//!
//! // Plain-HTML editing: content_html is edited directly
//! let plain = EditorConfig::default();
//! assert!(plain.renderer.is_none());
//! ```

use regex::Regex;

use crate::services::FiberServiceError;
use crate::utils::render_markdown;

/// Renderer that turns `content_markup` into `content_html`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupRenderer {
    /// CommonMark via pulldown-cmark
    Markdown,
}

impl MarkupRenderer {
    /// Render markup to HTML
    pub fn render(&self, markup: &str) -> String {
        match self {
            Self::Markdown => render_markdown(markup),
        }
    }
}

/// Rewrite-pattern pair for URL references inside `content_markup`
///
/// Both sides are templates with a `{url}` placeholder. When a page's
/// absolute URL changes from `old` to `new`, the find side receives the
/// regex-escaped `old` URL and is compiled as a regex; the replace side
/// receives the literal `new` URL. Because the find regex matches the URL as
/// a prefix, a reference to a descendant path keeps its remainder:
/// `](/a/b/c/` rewritten with old `/a/b/` and new `/x/` becomes `](/x/c/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameUrlExpressions {
    /// Regex template matching a reference to the old URL
    pub find: String,
    /// Replacement template producing the reference to the new URL
    pub replace: String,
}

impl RenameUrlExpressions {
    /// Create a pattern pair from find/replace templates
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }

    /// Rewrite references to `old_url` into references to `new_url`
    ///
    /// Returns the rewritten content; equal output means nothing matched.
    ///
    /// # Errors
    ///
    /// Returns `FiberServiceError::QueryFailed` if the find template does not
    /// compile as a regex once the URL is substituted.
    pub fn rewrite(
        &self,
        content: &str,
        old_url: &str,
        new_url: &str,
    ) -> Result<String, FiberServiceError> {
        let pattern = self.find.replace("{url}", &regex::escape(old_url));
        let regex = Regex::new(&pattern).map_err(|e| {
            FiberServiceError::query_failed(format!(
                "Failed to compile rename pattern '{}': {}",
                pattern, e
            ))
        })?;
        let replacement = self.replace.replace("{url}", &escape_replacement(new_url));

        Ok(regex.replace_all(content, replacement.as_str()).into_owned())
    }
}

/// Editor description passed into save and rename operations
///
/// - `renderer` present: `content_markup` is authoritative; `content_html`
///   is re-rendered from it on every save, and URL renames rewrite the
///   markup through `rename_url_expressions` (no pair configured leaves the
///   markup untouched).
/// - `renderer` absent: `content_html` is edited directly and URL renames
///   rewrite its `href` attributes.
#[derive(Debug, Clone, Default)]
pub struct EditorConfig {
    /// Markup renderer; `None` means plain-HTML editing
    pub renderer: Option<MarkupRenderer>,
    /// Pattern pair for rewriting URL references in markup
    pub rename_url_expressions: Option<RenameUrlExpressions>,
}

impl EditorConfig {
    /// Markdown editing mode
    ///
    /// Bundles the markdown renderer with a pattern pair matching inline
    /// link destinations (`](/old/url/`).
    pub fn markdown() -> Self {
        Self {
            renderer: Some(MarkupRenderer::Markdown),
            rename_url_expressions: Some(RenameUrlExpressions::new(r"\]\({url}", r"]({url}")),
        }
    }
}

/// Rewrite `href` attribute references to `old_url` inside HTML
///
/// The built-in pattern pair for plain-HTML editing: matches
/// `href="old_url` or `href='old_url` (preceded by whitespace) as a prefix,
/// so descendant paths keep their remainder. The quote character is
/// preserved.
///
/// # Errors
///
/// Returns `FiberServiceError::QueryFailed` if the composed regex fails to
/// compile.
pub fn rewrite_href_attributes(
    html: &str,
    old_url: &str,
    new_url: &str,
) -> Result<String, FiberServiceError> {
    let pattern = format!(r#"(\s)href=(["']){}"#, regex::escape(old_url));
    let regex = Regex::new(&pattern).map_err(|e| {
        FiberServiceError::query_failed(format!(
            "Failed to compile href rename pattern '{}': {}",
            pattern, e
        ))
    })?;
    let replacement = format!("${{1}}href=${{2}}{}", escape_replacement(new_url));

    Ok(regex.replace_all(html, replacement.as_str()).into_owned())
}

// `$` in a replacement string is a capture reference; URLs must stay literal.
fn escape_replacement(url: &str) -> String {
    url.replace('$', "$$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_preset_rewrites_link_destinations() -> Result<(), FiberServiceError> {
        let config = EditorConfig::markdown();
        let expressions = config.rename_url_expressions.unwrap();

        let markup = "See [abc](/section1/abc/) and [xyz](/section1/abc/xyz/).";
        let rewritten = expressions.rewrite(markup, "/section1/abc/", "/section2/abc/")?;

        assert_eq!(
            rewritten,
            "See [abc](/section2/abc/) and [xyz](/section2/abc/xyz/)."
        );
        Ok(())
    }

    #[test]
    fn test_markup_rewrite_leaves_other_urls_alone() -> Result<(), FiberServiceError> {
        let expressions = RenameUrlExpressions::new(r"\]\({url}", r"]({url}");

        let markup = "[other](/section1/abcdef/) and [plain text](/about/)";
        let rewritten = expressions.rewrite(markup, "/section1/abc/", "/new/")?;

        // "/section1/abcdef/" starts with "/section1/abc" but renames match
        // the full old URL including its trailing slash
        assert_eq!(rewritten, markup);
        Ok(())
    }

    #[test]
    fn test_href_rewrite_preserves_quote_style_and_remainder() -> Result<(), FiberServiceError> {
        let html = r#"<a href="/section1/abc/">abc</a> <a href='/section1/abc/xyz/'>xyz</a>"#;
        let rewritten = rewrite_href_attributes(html, "/section1/abc/", "/section1/a_b_c/")?;

        assert_eq!(
            rewritten,
            r#"<a href="/section1/a_b_c/">abc</a> <a href='/section1/a_b_c/xyz/'>xyz</a>"#
        );
        Ok(())
    }

    #[test]
    fn test_href_rewrite_requires_attribute_position() -> Result<(), FiberServiceError> {
        // Bare text mentioning the URL is not an href attribute
        let html = r#"<p>see /old/ or <a data-href="/old/">x</a></p>"#;
        let rewritten = rewrite_href_attributes(html, "/old/", "/new/")?;

        assert_eq!(rewritten, html);
        Ok(())
    }

    #[test]
    fn test_regex_metacharacters_in_old_url_are_literal() -> Result<(), FiberServiceError> {
        let expressions = RenameUrlExpressions::new(r"\]\({url}", r"]({url}");

        // An unescaped '.' would also match "/docs/v1x0/"
        let markup = "[q](/docs/v1.0/) [other](/docs/v1x0/)";
        let rewritten = expressions.rewrite(markup, "/docs/v1.0/", "/docs/v2.0/")?;

        assert_eq!(rewritten, "[q](/docs/v2.0/) [other](/docs/v1x0/)");
        Ok(())
    }

    #[test]
    fn test_dollar_signs_in_new_url_stay_literal() -> Result<(), FiberServiceError> {
        let html = r#"<a href="/old/">x</a>"#;
        let rewritten = rewrite_href_attributes(html, "/old/", "/pricing/$10/")?;

        assert_eq!(rewritten, r#"<a href="/pricing/$10/">x</a>"#);
        Ok(())
    }

    #[test]
    fn test_markdown_renderer_renders() {
        let config = EditorConfig::markdown();
        let renderer = config.renderer.unwrap();

        assert_eq!(
            renderer.render("[home](/home/)"),
            "<p><a href=\"/home/\">home</a></p>\n"
        );
    }
}
