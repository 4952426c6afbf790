//! Content Item Data Structures
//!
//! A content item is a reusable block of content that pages place into named
//! blocks. It carries two parallel representations: `content_markup` (the
//! authored source) and `content_html` (the rendered form). Which one is
//! authoritative depends on the editor configuration the caller passes to
//! save and rename operations.
//!
//! `used_on_pages` is a denormalized read model: a JSON list of
//! `{title, url}` entries naming the pages that currently place the item.
//! It is regenerated on demand and is never consulted by the engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::page::ValidationError;
use crate::utils::strip_markup;

/// One entry of the used-on-pages read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedOnPage {
    /// Title of the placing page
    pub title: String,
    /// Absolute URL of the placing page
    pub url: String,
}

/// A reusable block of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Unique identifier (UUID v4 string)
    pub id: String,

    /// Optional display name; blank items are labeled by their content
    pub name: String,

    /// Authored source markup
    pub content_markup: String,

    /// Rendered HTML
    pub content_html: String,

    /// Denormalized `{title, url}` list of placing pages; `None` until first
    /// computed
    pub used_on_pages: Option<serde_json::Value>,

    /// Free-form JSON metadata
    pub metadata: serde_json::Value,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// Create a new ContentItem with an auto-generated UUID.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use fiber_core::models::ContentItem;
    /// let item = ContentItem::new(
    ///     "welcome".to_string(),
    ///     "Welcome to *our* site".to_string(),
    ///     "<p>Welcome to <em>our</em> site</p>".to_string(),
    /// );
    /// assert_eq!(item.display_label(), "welcome");
    /// ```
    pub fn new(name: String, content_markup: String, content_html: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            name,
            content_markup,
            content_html,
            used_on_pages: None,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate field-level constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if !self.metadata.is_object() {
            return Err(ValidationError::InvalidMetadata(
                "metadata must be a JSON object".to_string(),
            ));
        }

        Ok(())
    }

    /// Human-readable label for admin listings.
    ///
    /// The name when set; otherwise the rendered content stripped of markup,
    /// truncated to 50 characters; `[ EMPTY ]` when nothing remains.
    pub fn display_label(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }

        let contents = strip_markup(&self.content_html);
        if contents.is_empty() {
            "[ EMPTY ]".to_string()
        } else if contents.chars().count() > 50 {
            let prefix: String = contents.chars().take(50).collect();
            format!("{}...", prefix)
        } else {
            contents
        }
    }
}

/// Partial content-item update for PATCH-style edits.
///
/// Only provided fields are written. Whether `content_html` is taken from
/// the update or re-rendered from markup depends on the editor
/// configuration passed to the save operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItemUpdate {
    /// Update the display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Update the source markup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_markup: Option<String>,

    /// Update the rendered HTML
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,

    /// Replace the metadata object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ContentItemUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a name update.
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Set a markup update.
    pub fn with_content_markup(mut self, content_markup: String) -> Self {
        self.content_markup = Some(content_markup);
        self
    }

    /// Set an HTML update.
    pub fn with_content_html(mut self, content_html: String) -> Self {
        self.content_html = Some(content_html);
        self
    }

    /// Whether the update contains any change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.content_markup.is_none()
            && self.content_html.is_none()
            && self.metadata.is_none()
    }
}
