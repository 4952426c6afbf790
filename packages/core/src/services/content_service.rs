//! Content Item Service
//!
//! CRUD over reusable content items plus the two derived features that hang
//! off them:
//!
//! - The **rename cascade**: when a page's absolute URL changes, stored
//!   content referencing the old URL as a prefix is rewritten to the new
//!   one. Which representation gets rewritten depends on the
//!   [`EditorConfig`] passed at call time: with a renderer the markup is
//!   rewritten and the HTML re-rendered from it, without one the HTML's
//!   `href` attributes are rewritten directly.
//! - The **used-on-pages read model**: a denormalized `{title, url}` list of
//!   the pages currently placing an item, filled lazily and refreshed after
//!   placement changes.
//!
//! Content rewriting is best-effort per item. One item failing to rewrite or
//! save never aborts the cascade; failures are collected in the returned
//! [`RenameOutcome`] and logged.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::db::FiberStore;
use crate::models::{
    ContentItem, ContentItemUpdate, DeleteResult, Page, UrlKind, UsedOnPage,
};
use crate::services::editor::{rewrite_href_attributes, EditorConfig};
use crate::services::error::FiberServiceError;
use crate::services::routes::NamedRouteResolver;
use crate::services::urls::derive_absolute_url;

/// Result of a rename cascade over all content items
///
/// `renamed` holds the ids of items whose content changed and was saved.
/// `failed` pairs item ids with the failure that skipped them; the cascade
/// kept going past each one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameOutcome {
    /// Items rewritten and saved
    pub renamed: Vec<String>,
    /// Items skipped by a rewrite or save failure, with the reason
    pub failed: Vec<(String, String)>,
}

/// One entry of an admin content-group listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentGroupEntry {
    /// Content item id
    pub id: String,
    /// Display label: the name, else a stripped content prefix
    pub label: String,
    /// The item's used-on-pages read model, if ever computed
    pub used_on_pages: Option<serde_json::Value>,
}

/// A named group of content items for admin listings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentGroup {
    /// Stable group key (`multiple`, `unused`, `once`, `recently_changed`)
    pub id: String,
    /// Human-readable group label
    pub label: String,
    /// Items in the group, in name order
    pub children: Vec<ContentGroupEntry>,
}

/// Service for content item CRUD, the rename cascade, and read models
#[derive(Clone)]
pub struct ContentItemService {
    /// Store for all persistence operations
    store: Arc<dyn FiberStore>,

    /// Resolver for quoted named-route URLs
    routes: Arc<dyn NamedRouteResolver>,
}

impl ContentItemService {
    /// Create a new ContentItemService
    pub fn new(store: Arc<dyn FiberStore>, routes: Arc<dyn NamedRouteResolver>) -> Self {
        Self { store, routes }
    }

    // ------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------

    /// Create a content item
    ///
    /// With a renderer in the editor config, `content_html` is rendered from
    /// `content_markup` and whatever the caller put in `content_html` is
    /// replaced. Without one, both representations are stored as provided.
    pub async fn create_content_item(
        &self,
        mut item: ContentItem,
        editor: &EditorConfig,
    ) -> Result<ContentItem, FiberServiceError> {
        if let Some(renderer) = &editor.renderer {
            item.content_html = renderer.render(&item.content_markup);
        }
        item.validate()?;

        let created = self
            .store
            .create_content_item(item)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        tracing::info!(
            "Created content item '{}' ({})",
            created.display_label(),
            created.id
        );
        Ok(created)
    }

    /// Get a content item by ID
    pub async fn get_content_item(
        &self,
        id: &str,
    ) -> Result<Option<ContentItem>, FiberServiceError> {
        self.store
            .get_content_item(id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))
    }

    /// All content items, ordered by name
    pub async fn get_all_content_items(&self) -> Result<Vec<ContentItem>, FiberServiceError> {
        self.store
            .get_all_content_items()
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))
    }

    /// Update a content item's editable fields
    ///
    /// With a renderer, `content_html` is re-rendered from the (possibly
    /// updated) markup on every save, keeping the two representations in
    /// step. Without one, the update is applied as provided.
    ///
    /// # Errors
    ///
    /// Returns `ContentItemNotFound` if the item does not exist.
    pub async fn update_content_item(
        &self,
        id: &str,
        mut update: ContentItemUpdate,
        editor: &EditorConfig,
    ) -> Result<ContentItem, FiberServiceError> {
        let current = self
            .store
            .get_content_item(id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::content_item_not_found(id))?;

        if update.is_empty() {
            return Ok(current);
        }

        if let Some(renderer) = &editor.renderer {
            let markup = update
                .content_markup
                .as_deref()
                .unwrap_or(&current.content_markup);
            update.content_html = Some(renderer.render(markup));
        }

        let updated = self
            .store
            .update_content_item(id, update)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        tracing::debug!("Updated content item {}", updated.id);
        Ok(updated)
    }

    /// Delete a content item and its placements
    ///
    /// Deleting a non-existent item succeeds with `existed = false`.
    pub async fn delete_content_item(
        &self,
        id: &str,
    ) -> Result<DeleteResult, FiberServiceError> {
        let result = self
            .store
            .delete_content_item(id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        if result.existed {
            tracing::info!("Deleted content item {}", id);
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // RENAME CASCADE
    // ------------------------------------------------------------------

    /// Rewrite references to `old_url` across all content items
    ///
    /// Every item whose content references `old_url` as a prefix gets that
    /// prefix replaced with `new_url`, the path remainder preserved. With a
    /// renderer configured, the markup pattern pair rewrites the markup and
    /// the HTML is re-rendered from it; without one, `href` attributes in
    /// the stored HTML are rewritten directly. Items whose content does not
    /// change are not saved.
    ///
    /// Per-item failures are logged, recorded in the outcome and skipped;
    /// they never abort the cascade.
    pub async fn rename_url(
        &self,
        old_url: &str,
        new_url: &str,
        editor: &EditorConfig,
    ) -> Result<RenameOutcome, FiberServiceError> {
        let mut outcome = RenameOutcome::default();
        if old_url.is_empty() || old_url == new_url {
            return Ok(outcome);
        }

        let items = self
            .store
            .get_all_content_items()
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        for item in items {
            match self.rewrite_item(&item, old_url, new_url, editor).await {
                Ok(true) => outcome.renamed.push(item.id),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Failed to rewrite content item {}: {}", item.id, e);
                    outcome.failed.push((item.id, e.to_string()));
                }
            }
        }

        if !outcome.renamed.is_empty() {
            tracing::info!(
                "Rewrote {} content items from '{}' to '{}'",
                outcome.renamed.len(),
                old_url,
                new_url
            );
        }
        Ok(outcome)
    }

    /// Rewrite one item's content; returns whether anything was saved
    async fn rewrite_item(
        &self,
        item: &ContentItem,
        old_url: &str,
        new_url: &str,
        editor: &EditorConfig,
    ) -> Result<bool, FiberServiceError> {
        let update = match (&editor.renderer, &editor.rename_url_expressions) {
            (Some(renderer), Some(expressions)) => {
                let rewritten = expressions.rewrite(&item.content_markup, old_url, new_url)?;
                if rewritten == item.content_markup {
                    return Ok(false);
                }
                let html = renderer.render(&rewritten);
                ContentItemUpdate::new()
                    .with_content_markup(rewritten)
                    .with_content_html(html)
            }
            (Some(_), None) => {
                // A renderer without a pattern pair gives no safe way to
                // find URL references in the markup; rewriting only the
                // HTML would be undone by the next render.
                tracing::debug!(
                    "No markup rewrite patterns configured; leaving content item {} untouched",
                    item.id
                );
                return Ok(false);
            }
            (None, _) => {
                let rewritten = rewrite_href_attributes(&item.content_html, old_url, new_url)?;
                if rewritten == item.content_html {
                    return Ok(false);
                }
                ContentItemUpdate::new().with_content_html(rewritten)
            }
        };

        self.store
            .update_content_item(&item.id, update)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // USED-ON-PAGES READ MODEL
    // ------------------------------------------------------------------

    /// The item's used-on-pages read model, computing it on first access
    ///
    /// Once computed the stored value is returned as-is; placement changes
    /// refresh it through [`refresh_used_on_pages`](Self::refresh_used_on_pages).
    pub async fn used_on_pages(
        &self,
        item: &ContentItem,
    ) -> Result<Vec<UsedOnPage>, FiberServiceError> {
        match &item.used_on_pages {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| FiberServiceError::serialization_error(e.to_string())),
            None => self.refresh_used_on_pages(&item.id).await,
        }
    }

    /// Recompute and persist the item's used-on-pages read model
    ///
    /// One `{title, url}` entry per page currently placing the item, in tree
    /// order. A page whose URL cannot be derived is logged and left out
    /// rather than failing the refresh.
    ///
    /// # Errors
    ///
    /// Returns `ContentItemNotFound` if the item does not exist.
    pub async fn refresh_used_on_pages(
        &self,
        id: &str,
    ) -> Result<Vec<UsedOnPage>, FiberServiceError> {
        self.store
            .get_content_item(id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::content_item_not_found(id))?;

        let pages = self
            .store
            .get_pages_using_item(id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        let mut entries = Vec::with_capacity(pages.len());
        for page in &pages {
            match self.page_absolute_url(page).await {
                Ok(url) => entries.push(UsedOnPage {
                    title: page.title.clone(),
                    url,
                }),
                Err(e) => tracing::warn!(
                    "Leaving page {} out of used-on-pages of item {}: {}",
                    page.id,
                    id,
                    e
                ),
            }
        }

        self.store
            .set_used_on_pages(id, &entries)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        tracing::debug!("Refreshed used-on-pages for item {}: {} pages", id, entries.len());
        Ok(entries)
    }

    // ------------------------------------------------------------------
    // ADMIN LISTINGS
    // ------------------------------------------------------------------

    /// Classify all content items into admin listing groups
    ///
    /// Ordered groups: used more than once, unused, used once, recently
    /// changed (updated today, UTC). Empty groups are left out. An item
    /// lands in exactly one usage group and may additionally appear under
    /// recently changed.
    pub async fn get_content_groups(&self) -> Result<Vec<ContentGroup>, FiberServiceError> {
        let items = self
            .store
            .get_all_content_items()
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
        let counts = self
            .store
            .get_placement_counts()
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        let today = Utc::now().date_naive();
        let mut multiple = Vec::new();
        let mut unused = Vec::new();
        let mut once = Vec::new();
        let mut recently_changed = Vec::new();

        for item in &items {
            let entry = ContentGroupEntry {
                id: item.id.clone(),
                label: item.display_label(),
                used_on_pages: item.used_on_pages.clone(),
            };
            match counts.get(&item.id).copied().unwrap_or(0) {
                0 => unused.push(entry.clone()),
                1 => once.push(entry.clone()),
                _ => multiple.push(entry.clone()),
            }
            if item.updated_at.date_naive() == today {
                recently_changed.push(entry);
            }
        }

        let buckets = [
            ("multiple", "used more than once", multiple),
            ("unused", "unused", unused),
            ("once", "used once", once),
            ("recently_changed", "recently changed", recently_changed),
        ];

        Ok(buckets
            .into_iter()
            .filter(|(_, _, children)| !children.is_empty())
            .map(|(id, label, children)| ContentGroup {
                id: id.to_string(),
                label: label.to_string(),
                children,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // INTERNALS
    // ------------------------------------------------------------------

    /// Absolute URL of a page, resolving relative segments via its ancestors
    async fn page_absolute_url(&self, page: &Page) -> Result<String, FiberServiceError> {
        if page.url_kind() == UrlKind::Relative {
            let ancestors = self
                .store
                .get_ancestors(page)
                .await
                .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
            derive_absolute_url(self.routes.as_ref(), ancestors.iter().chain([page]))
        } else {
            derive_absolute_url(self.routes.as_ref(), [page])
        }
    }
}
