//! Page Data Structures
//!
//! This module defines the `Page` struct and related types for Fiber's
//! nested-set page tree.
//!
//! # Architecture
//!
//! - **Nested set**: every page carries a preorder interval `[left, right]`,
//!   a `tree_id` grouping the pages of one root, and a `level` (depth)
//! - **Forest**: each root page starts its own tree; `tree_id` keeps trees
//!   independent so mutations in one tree never touch another
//! - **Derived URLs**: a page's absolute URL is computed from its ancestor
//!   chain, never stored
//!
//! Tree coordinates are owned by the tree engine: `left`, `right`, `tree_id`
//! and `level` are assigned on insert and rewritten on move, never edited
//! directly.
//!
//! # Examples
//!
//! ```rust
//! use fiber_core::models::Page;
//!
//! let home = Page::new("home".to_string(), "".to_string());
//! let section = Page::new("section1".to_string(), "section1".to_string());
//! assert!(home.validate().is_ok());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for Page and ContentItem fields
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid URL value: {0}")]
    InvalidUrl(String),

    #[error("A root page cannot use the relative URL segment '{0}'")]
    RootRequiresAbsoluteUrl(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Metadata validation failed: {0}")]
    InvalidMetadata(String),
}

/// How a stored `url` value is interpreted when deriving absolute URLs.
///
/// Mirrors the derivation rules: empty and slash/scheme-prefixed values are
/// used verbatim, quoted values go through the named-route resolver, and
/// everything else is a relative segment appended to the parent's URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Empty `url` field; the absolute URL is the empty string.
    Empty,
    /// Starts with `/`; root-relative, used verbatim.
    Absolute,
    /// Starts with `http://` or `https://`; external, used verbatim.
    External,
    /// Quoted (`"name"`); resolved through the named-route resolver.
    NamedRoute,
    /// Bare relative segment; appended to the parent's absolute URL.
    Relative,
}

/// Classify a raw `url` field value.
pub fn url_kind(url: &str) -> UrlKind {
    if url.is_empty() {
        UrlKind::Empty
    } else if url.starts_with('/') {
        UrlKind::Absolute
    } else if url.starts_with("http://") || url.starts_with("https://") {
        UrlKind::External
    } else if url.len() >= 2 && url.starts_with('"') && url.ends_with('"') {
        UrlKind::NamedRoute
    } else {
        UrlKind::Relative
    }
}

/// Extract the route name from a quoted `url` value.
///
/// Returns `None` when the value is not quoted.
pub fn quoted_route_name(url: &str) -> Option<&str> {
    if url_kind(url) == UrlKind::NamedRoute {
        Some(url.trim_matches('"'))
    } else {
        None
    }
}

/// A page in the hierarchical tree.
///
/// # Fields
///
/// - `id`: Unique identifier (UUID v4 string)
/// - `parent_id`: Reference to the parent page; `None` only for roots
/// - `redirect_page_id`: Optional page this one redirects to; cleared when
///   the referenced page is deleted
/// - `title`: Display title (may be blank, e.g. for menu roots)
/// - `url`: Raw URL field, interpreted per [`UrlKind`]
/// - `left`/`right`: Preorder interval bounds; ancestor relation is interval
///   containment
/// - `tree_id`: Groups the pages of one root-level tree
/// - `level`: Depth; 0 for roots, parent's level + 1 otherwise
/// - `show_in_menu`/`is_public`: Menu visibility flags
/// - `metadata`: Free-form JSON attached by the host application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Unique identifier (UUID v4 string)
    pub id: String,

    /// Parent page ID; `None` only for root pages
    pub parent_id: Option<String>,

    /// Optional redirect target
    pub redirect_page_id: Option<String>,

    /// Display title
    pub title: String,

    /// Raw URL field (empty, absolute, external, quoted or relative segment)
    pub url: String,

    /// Preorder interval lower bound
    pub left: i64,

    /// Preorder interval upper bound
    pub right: i64,

    /// Tree membership; each root starts its own tree
    pub tree_id: i64,

    /// Depth in the tree (roots are 0)
    pub level: i64,

    /// Whether menus should list this page
    pub show_in_menu: bool,

    /// Whether the page is publicly visible
    pub is_public: bool,

    /// Free-form JSON metadata
    pub metadata: serde_json::Value,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// Create a new Page with an auto-generated UUID.
    ///
    /// Tree coordinates (`left`, `right`, `tree_id`, `level`) and `parent_id`
    /// are placeholders until the tree engine inserts the page; they must not
    /// be relied upon before that.
    ///
    /// # Arguments
    ///
    /// * `title` - Display title (may be blank)
    /// * `url` - Raw URL field value
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use fiber_core::models::Page;
    /// let page = Page::new("section1".to_string(), "section1".to_string());
    /// assert_eq!(page.title, "section1");
    /// assert!(page.parent_id.is_none());
    /// ```
    pub fn new(title: String, url: String) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        Self {
            id,
            parent_id: None,
            redirect_page_id: None,
            title,
            url,
            left: 0,
            right: 0,
            tree_id: 0,
            level: 0,
            show_in_menu: true,
            is_public: true,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new Page with a specified ID.
    pub fn new_with_id(id: String, title: String, url: String) -> Self {
        let mut page = Self::new(title, url);
        page.id = id;
        page
    }

    /// Classify this page's raw `url` field.
    pub fn url_kind(&self) -> UrlKind {
        url_kind(&self.url)
    }

    /// Validate field-level constraints.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - `id` is empty
    /// - `metadata` is not a JSON object
    /// - the page references itself as parent or redirect target
    /// - a root page carries a bare relative `url` segment (its absolute URL
    ///   would be undefined)
    /// - a quoted `url` has an empty route name
    ///
    /// Named-route resolution is checked by the page service, which has the
    /// resolver; this method only checks the value's shape.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if !self.metadata.is_object() {
            return Err(ValidationError::InvalidMetadata(
                "metadata must be a JSON object".to_string(),
            ));
        }

        if let Some(parent_id) = &self.parent_id {
            if parent_id == &self.id {
                return Err(ValidationError::InvalidParent(
                    "Page cannot be its own parent".to_string(),
                ));
            }
        }

        if let Some(redirect_id) = &self.redirect_page_id {
            if redirect_id == &self.id {
                return Err(ValidationError::InvalidParent(
                    "Page cannot redirect to itself".to_string(),
                ));
            }
        }

        match self.url_kind() {
            UrlKind::Relative if self.parent_id.is_none() => {
                return Err(ValidationError::RootRequiresAbsoluteUrl(self.url.clone()));
            }
            UrlKind::NamedRoute => {
                if self.url.trim_matches('"').is_empty() {
                    return Err(ValidationError::InvalidUrl(
                        "quoted URL has an empty route name".to_string(),
                    ));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Whether this page is a root (no parent).
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether this page has no children.
    pub fn is_leaf(&self) -> bool {
        self.right == self.left + 1
    }

    /// Number of descendants, derived from the interval width.
    pub fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    /// Whether this page is an ancestor of `other`.
    ///
    /// Pure interval arithmetic: same tree, and `other`'s interval strictly
    /// inside this one.
    pub fn is_ancestor_of(&self, other: &Page) -> bool {
        self.tree_id == other.tree_id && self.left < other.left && self.right > other.right
    }

    /// Whether this page is a descendant of `other`.
    pub fn is_descendant_of(&self, other: &Page) -> bool {
        other.is_ancestor_of(self)
    }

    /// Whether this page is the first child of `parent`.
    pub fn is_first_child_of(&self, parent: &Page) -> bool {
        self.left == parent.left + 1
    }

    /// Whether this page is the last child of `parent`.
    pub fn is_last_child_of(&self, parent: &Page) -> bool {
        self.right + 1 == parent.right
    }
}

/// Where a new page is spliced into the forest.
///
/// `Root` starts a new tree; the other positions splice relative to an
/// existing anchor page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "position", content = "anchorId")]
pub enum InsertPosition {
    /// New root: fresh `tree_id`, `left = 1`, `right = 2`, `level = 0`.
    Root,
    /// First child of the anchor page.
    FirstChildOf(String),
    /// Last child of the anchor page.
    LastChildOf(String),
    /// Immediately before the anchor, as its sibling.
    BeforeSibling(String),
    /// Immediately after the anchor, as its sibling.
    AfterSibling(String),
}

impl InsertPosition {
    /// The anchor page id, if this position has one.
    pub fn anchor_id(&self) -> Option<&str> {
        match self {
            InsertPosition::Root => None,
            InsertPosition::FirstChildOf(id)
            | InsertPosition::LastChildOf(id)
            | InsertPosition::BeforeSibling(id)
            | InsertPosition::AfterSibling(id) => Some(id),
        }
    }
}

/// Where an existing subtree lands relative to the move target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MovePosition {
    /// Before the target, as its sibling.
    Before,
    /// After the target, as its sibling.
    After,
    /// First child of the target.
    InsideAsFirstChild,
}

/// Custom deserializer for optional fields that accepts both plain values
/// and nulls.
///
/// Maps three input formats to the double-Option pattern:
/// - Missing field → None (don't update)
/// - null → Some(None) (set to NULL)
/// - "value" → Some(Some("value")) (set to value)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial page update for PATCH-style edits.
///
/// Only provided fields are written. `redirect_page_id` uses the
/// double-`Option` pattern to distinguish "don't change" (`None`) from
/// "clear the redirect" (`Some(None)`).
///
/// Tree coordinates are deliberately absent: position changes go through the
/// tree engine's move operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageUpdate {
    /// Update the display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Update the raw URL field (re-validated, may trigger the rename
    /// cascade)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Update the redirect target
    ///
    /// - `None`: don't change
    /// - `Some(None)`: clear the redirect
    /// - `Some(Some(id))`: redirect to the given page
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub redirect_page_id: Option<Option<String>>,

    /// Update menu visibility
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_in_menu: Option<bool>,

    /// Update public visibility
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,

    /// Replace the metadata object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl PageUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a title update.
    pub fn with_title(mut self, title: String) -> Self {
        self.title = Some(title);
        self
    }

    /// Set a URL update.
    pub fn with_url(mut self, url: String) -> Self {
        self.url = Some(url);
        self
    }

    /// Set a menu-visibility update.
    pub fn with_show_in_menu(mut self, show_in_menu: bool) -> Self {
        self.show_in_menu = Some(show_in_menu);
        self
    }

    /// Set a public-visibility update.
    pub fn with_is_public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }

    /// Whether the update contains any change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.url.is_none()
            && self.redirect_page_id.is_none()
            && self.show_in_menu.is_none()
            && self.is_public.is_none()
            && self.metadata.is_none()
    }
}

/// Result of a delete operation
///
/// Distinguishes between successful deletion of an existing record and
/// idempotent deletion of a record that was already gone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResult {
    /// Whether the record existed before deletion
    ///
    /// - `true`: Record existed and was deleted
    /// - `false`: Record didn't exist (idempotent no-op)
    pub existed: bool,
}

impl DeleteResult {
    /// Create a DeleteResult indicating the record existed
    pub fn existed() -> Self {
        Self { existed: true }
    }

    /// Create a DeleteResult indicating the record didn't exist
    pub fn not_found() -> Self {
        Self { existed: false }
    }
}
