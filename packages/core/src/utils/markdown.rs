//! Markdown rendering and stripping utilities
//!
//! This module provides the markup-to-HTML renderer used when content items
//! are saved in markdown mode, and a stripping function that reduces content
//! to plain text for display labels in admin listings.

use pulldown_cmark::{html, Parser};
use regex::Regex;
use std::sync::LazyLock;

/// Render markdown markup to HTML
///
/// Uses pulldown-cmark with default options (CommonMark). The output is the
/// `content_html` representation stored alongside the markup.
///
/// # Arguments
///
/// * `markup` - The markdown source
///
/// # Returns
///
/// The rendered HTML string
///
/// # Examples
///
/// ```
/// use fiber_core::utils::render_markdown;
///
/// let html = render_markdown("[home](/home/)");
/// assert_eq!(html, "<p><a href=\"/home/\">home</a></p>\n");
/// ```
pub fn render_markdown(markup: &str) -> String {
    let parser = Parser::new(markup);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Compiled regex patterns for markup stripping
///
/// The order of these patterns matters:
/// 1. Images first (to not conflict with links or italic)
/// 2. Links (before italic since links use brackets)
/// 3. Bold (before italic since ** conflicts with *)
/// 4. Other inline styles
/// 5. Line-start patterns (headers, lists, etc.)
static MARKUP_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // Remove images FIRST: ![alt](url) -> alt
        (Regex::new(r"!\[([^\]]*)\]\([^)]+\)").unwrap(), "$1"),
        // Remove markdown links, keeping link text: [text](url) -> text
        (Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap(), "$1"),
        // Remove inline code: `code` -> code
        (Regex::new(r"`([^`]+)`").unwrap(), "$1"),
        // Remove bold: **text** or __text__ -> text (process before italic)
        (Regex::new(r"\*\*([^*]+)\*\*").unwrap(), "$1"),
        (Regex::new(r"__([^_]+)__").unwrap(), "$1"),
        // Remove italic: *text* or _text_ -> text
        (Regex::new(r"\*([^*]+)\*").unwrap(), "$1"),
        (Regex::new(r"_([^_]+)_").unwrap(), "$1"),
        // Remove headers: # Header -> Header (up to 6 levels)
        (Regex::new(r"^#{1,6}\s+").unwrap(), ""),
        // Remove blockquote markers: > quote -> quote
        (Regex::new(r"^>\s*").unwrap(), ""),
        // Remove ordered list markers: 1. item -> item
        (Regex::new(r"^\d+\.\s+").unwrap(), ""),
        // Remove unordered list markers: - item or * item -> item
        (Regex::new(r"^[-*+]\s+").unwrap(), ""),
        // Remove HTML tags
        (Regex::new(r"<[^>]+>").unwrap(), ""),
    ]
});

/// Compiled regex for whitespace normalization
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip markdown and HTML formatting from content to produce plain text
///
/// Used to derive display labels for content items that have no name: the
/// admin listing shows the stripped content prefix instead.
///
/// # Arguments
///
/// * `content` - The markup or HTML content to strip
///
/// # Returns
///
/// Plain text with formatting removed and whitespace collapsed
///
/// # Examples
///
/// ```
/// use fiber_core::utils::strip_markup;
///
/// assert_eq!(strip_markup("# Hello World"), "Hello World");
/// assert_eq!(strip_markup("<p>Some <b>bold</b> text</p>"), "Some bold text");
/// assert_eq!(strip_markup("[link](/about/)"), "link");
/// ```
pub fn strip_markup(content: &str) -> String {
    let mut result = content.to_string();

    for (pattern, replacement) in MARKUP_PATTERNS.iter() {
        // For line-start patterns, process line by line
        if replacement.is_empty() && pattern.as_str().starts_with('^') {
            result = result
                .lines()
                .map(|line| pattern.replace_all(line, *replacement).to_string())
                .collect::<Vec<_>>()
                .join("\n");
        } else {
            result = pattern.replace_all(&result, *replacement).to_string();
        }
    }

    result = WHITESPACE_RE.replace_all(&result, " ").to_string();
    result.trim().to_string()
}
