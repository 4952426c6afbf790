//! Page Service - Tree Engine
//!
//! This module provides the main business logic layer for the page tree:
//!
//! - Structural mutations (create_page, move_page, delete_page)
//! - Field edits with URL-rename cascades (update_page)
//! - Position queries (is_first_child, is_last_child, ancestors, siblings)
//! - Absolute URL derivation and URL-to-page resolution
//! - Menu reads and tree diagnostics (get_shown_pages, verify_tree)
//!
//! # Interval Scheme
//!
//! Every page carries `left`/`right` interval bounds, a `tree_id` and a
//! `level`. Ancestry is interval containment: A is an ancestor of B exactly
//! when both share a `tree_id` and `A.left < B.left && A.right > B.right`.
//! Each root page opens its own `tree_id`; inserting a sibling of a root
//! creates a new tree.
//!
//! **CRITICAL:** structural mutations shift the bounds of many rows at once.
//! Each mutation runs as one transaction in the store, but concurrent
//! structural writes against the same tree are not serialized here; callers
//! own that (one writer per tree at a time).
//!
//! # URL Side Effects
//!
//! Moving or updating a page can change its absolute URL. When it does, the
//! rename cascade rewrites stored content references to the old URL prefix
//! and the used-on-pages read models of content placed on the affected
//! subtree are refreshed. Both run after the structural change commits and
//! are best-effort: failures are logged, never turned into move failures.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::db::FiberStore;
use crate::models::{InsertPosition, MovePosition, Page, PageUpdate, UrlKind};
use crate::models::quoted_route_name;
use crate::services::content_service::ContentItemService;
use crate::services::editor::EditorConfig;
use crate::services::error::FiberServiceError;
use crate::services::routes::NamedRouteResolver;
use crate::services::urls::derive_absolute_url;

/// Parameters for creating a page
///
/// This struct is used by `PageService::create_page()` to encapsulate all
/// parameters needed for page creation.
///
/// # Examples
///
/// ```rust
/// use fiber_core::models::InsertPosition;
/// use fiber_core::services::CreatePageParams;
///
/// // A new root page (opens its own tree)
/// let root = CreatePageParams::new("home", "", InsertPosition::Root);
///
/// // A child appended under an existing page
/// let child = CreatePageParams::new(
///     "section1",
///     "section1",
///     InsertPosition::LastChildOf("home-id".to_string()),
/// );
/// assert!(child.show_in_menu);
/// # let _ = (root, child);
/// ```
#[derive(Debug, Clone)]
pub struct CreatePageParams {
    /// Optional ID for the page. If None, a UUID v4 is generated
    pub id: Option<String>,
    /// Display title (may be blank, e.g. for menu roots)
    pub title: String,
    /// Raw url field value (empty, absolute, external, quoted or segment)
    pub url: String,
    /// Where the page goes in the tree
    pub position: InsertPosition,
    /// Optional page this one redirects to
    pub redirect_page_id: Option<String>,
    /// Whether menus should list the page
    pub show_in_menu: bool,
    /// Whether the page is publicly visible
    pub is_public: bool,
    /// Free-form JSON metadata
    pub metadata: Value,
}

impl CreatePageParams {
    /// Create params with defaults: visible, public, empty metadata
    pub fn new(title: impl Into<String>, url: impl Into<String>, position: InsertPosition) -> Self {
        Self {
            id: None,
            title: title.into(),
            url: url.into(),
            position,
            redirect_page_id: None,
            show_in_menu: true,
            is_public: true,
            metadata: serde_json::json!({}),
        }
    }
}

/// Explicit cache of pages for ancestor-chain walks
///
/// Bulk operations (URL resolution, admin listings) load every page they
/// will touch once, prime a cache, and answer ancestor chains and URL
/// derivations from it without further queries. The cache is plain data the
/// caller owns; nothing invalidates it, so prime it fresh per operation.
///
/// # Examples
///
/// ```rust
/// use fiber_core::models::Page;
/// use fiber_core::services::AncestorCache;
///
/// let root = Page::new("root".to_string(), "".to_string());
/// let cache = AncestorCache::prime([root.clone()]);
/// assert_eq!(cache.get(&root.id).map(|p| p.title.as_str()), Some("root"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AncestorCache {
    pages: HashMap<String, Page>,
}

impl AncestorCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from a set of pages
    pub fn prime(pages: impl IntoIterator<Item = Page>) -> Self {
        let mut cache = Self::new();
        for page in pages {
            cache.insert(page);
        }
        cache
    }

    /// Add a page, replacing any cached copy with the same id
    pub fn insert(&mut self, page: Page) {
        self.pages.insert(page.id.clone(), page);
    }

    /// Look up a cached page by id
    pub fn get(&self, id: &str) -> Option<&Page> {
        self.pages.get(id)
    }

    /// Number of cached pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The ancestor chain of `page`, root first, excluding the page itself
    ///
    /// # Errors
    ///
    /// - `QueryFailed` when a parent link points at a page the cache does
    ///   not hold
    /// - `StructuralConsistency` when the parent links form a cycle
    pub fn ancestor_chain(&self, page: &Page) -> Result<Vec<&Page>, FiberServiceError> {
        let mut chain = Vec::new();
        let mut current_parent = page.parent_id.as_deref();

        while let Some(parent_id) = current_parent {
            if chain.len() > self.pages.len() {
                return Err(FiberServiceError::structural_consistency(format!(
                    "Parent links of page {} form a cycle",
                    page.id
                )));
            }
            let parent = self.pages.get(parent_id).ok_or_else(|| {
                FiberServiceError::query_failed(format!(
                    "Ancestor {} of page {} is not cached",
                    parent_id, page.id
                ))
            })?;
            chain.push(parent);
            current_parent = parent.parent_id.as_deref();
        }

        chain.reverse();
        Ok(chain)
    }
}

/// Core service for page tree mutations and queries
///
/// # Examples
///
/// ```no_run
/// use fiber_core::db::{DatabaseService, TursoStore};
/// use fiber_core::models::InsertPosition;
/// use fiber_core::services::{CreatePageParams, PageService, StaticRouteResolver};
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/site.db")).await?);
///     let store = Arc::new(TursoStore::new(db));
///     let routes = Arc::new(StaticRouteResolver::new());
///     let service = PageService::new(store, routes);
///
///     let home = service
///         .create_page(CreatePageParams::new("home", "", InsertPosition::Root))
///         .await?;
///     println!("Created page: {}", home.id);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct PageService {
    /// Store for all persistence operations
    store: Arc<dyn FiberStore>,

    /// Resolver for quoted named-route URLs
    routes: Arc<dyn NamedRouteResolver>,

    /// Content service driven by URL-change side effects
    content: ContentItemService,
}

impl PageService {
    /// Create a new PageService
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence backend
    /// * `routes` - Named-route resolver for quoted URLs
    pub fn new(store: Arc<dyn FiberStore>, routes: Arc<dyn NamedRouteResolver>) -> Self {
        tracing::info!("PageService initialized");
        Self {
            store: store.clone(),
            routes: routes.clone(),
            content: ContentItemService::new(store, routes),
        }
    }

    /// Get access to the underlying store
    pub fn store(&self) -> &Arc<dyn FiberStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // STRUCTURAL MUTATIONS
    // ------------------------------------------------------------------

    /// Create a page at the given position
    ///
    /// The splice point follows from the position: first/last child under an
    /// anchor, or immediately before/after it as a sibling. `Root` opens a
    /// new tree. Sibling positions relative to a root page create new roots.
    ///
    /// Validation happens before anything persists: field shape, the
    /// root-with-relative-url rule, and named-route resolution.
    ///
    /// # Errors
    ///
    /// - `PageNotFound` when the anchor page does not exist
    /// - `ValidationFailed` / `UnresolvedNamedRoute` for bad `url` values
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use fiber_core::db::{DatabaseService, TursoStore};
    /// # use fiber_core::models::InsertPosition;
    /// # use fiber_core::services::{CreatePageParams, PageService, StaticRouteResolver};
    /// # use std::path::PathBuf;
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let db = Arc::new(DatabaseService::new(PathBuf::from("./site.db")).await?);
    /// # let service = PageService::new(Arc::new(TursoStore::new(db)), Arc::new(StaticRouteResolver::new()));
    /// let home = service
    ///     .create_page(CreatePageParams::new("home", "", InsertPosition::Root))
    ///     .await?;
    /// let news = service
    ///     .create_page(CreatePageParams::new(
    ///         "news",
    ///         "news",
    ///         InsertPosition::FirstChildOf(home.id.clone()),
    ///     ))
    ///     .await?;
    /// assert_eq!(news.parent_id.as_deref(), Some(home.id.as_str()));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_page(
        &self,
        params: CreatePageParams,
    ) -> Result<Page, FiberServiceError> {
        let anchor = match params.position.anchor_id() {
            Some(anchor_id) => Some(
                self.store
                    .get_page(anchor_id)
                    .await
                    .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
                    .ok_or_else(|| FiberServiceError::page_not_found(anchor_id))?,
            ),
            None => None,
        };

        let mut page = match params.id {
            Some(id) => Page::new_with_id(id, params.title, params.url),
            None => Page::new(params.title, params.url),
        };
        page.redirect_page_id = params.redirect_page_id;
        page.show_in_menu = params.show_in_menu;
        page.is_public = params.is_public;
        page.metadata = params.metadata;

        // The store derives parentage from the position; set it here too so
        // validation sees whether the page will be a root
        page.parent_id = match (&params.position, anchor.as_ref()) {
            (InsertPosition::FirstChildOf(_), Some(anchor))
            | (InsertPosition::LastChildOf(_), Some(anchor)) => Some(anchor.id.clone()),
            (InsertPosition::BeforeSibling(_), Some(anchor))
            | (InsertPosition::AfterSibling(_), Some(anchor)) => anchor.parent_id.clone(),
            _ => None,
        };

        page.validate()?;
        self.validate_url(&page)?;

        let created = self
            .store
            .insert_page(page, params.position)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        tracing::info!("Created page '{}' ({})", created.title, created.id);
        Ok(created)
    }

    /// Move a page (with its whole subtree) relative to a target page
    ///
    /// Handles reordering within a tree and moves across trees; moving
    /// before or after a root page re-roots the subtree as a tree of its
    /// own. `tree_id` and `level` are rewritten for every moved node and the
    /// operation is atomic in the store.
    ///
    /// When the move changes the page's absolute URL, stored content
    /// references to the old URL prefix are rewritten and the used-on-pages
    /// read models of content on the moved subtree are refreshed. Both are
    /// best-effort after the move committed.
    ///
    /// # Errors
    ///
    /// - `PageNotFound` when the page or target does not exist
    /// - `InvalidPosition` when the target is the page itself or one of its
    ///   descendants (the move would create a cycle)
    pub async fn move_page(
        &self,
        page_id: &str,
        target_id: &str,
        position: MovePosition,
        editor: &EditorConfig,
    ) -> Result<Page, FiberServiceError> {
        let page = self
            .store
            .get_page(page_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::page_not_found(page_id))?;

        let target = self
            .store
            .get_page(target_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::page_not_found(target_id))?;

        if target.id == page.id {
            return Err(FiberServiceError::invalid_position(format!(
                "Cannot move page {} relative to itself",
                page_id
            )));
        }
        if page.is_ancestor_of(&target) {
            return Err(FiberServiceError::invalid_position(format!(
                "Cannot move page {} inside its descendant {}",
                page_id, target_id
            )));
        }

        let old_url = self.try_absolute_url(&page).await;

        self.store
            .move_subtree(page_id, target_id, position)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        let moved = self
            .store
            .get_page(page_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::page_not_found(page_id))?;

        tracing::info!(
            "Moved page '{}' ({}) {:?} page {}",
            moved.title,
            moved.id,
            position,
            target_id
        );

        self.handle_url_change(old_url, &moved, editor).await;
        Ok(moved)
    }

    /// Delete a page and its entire subtree
    ///
    /// Placements on any removed page are deleted with it and redirect
    /// references to removed pages are cleared; the interval gap closes so
    /// the remaining tree stays contiguous. Used-on-pages read models of
    /// content that was placed on the subtree are refreshed afterwards.
    ///
    /// # Returns
    ///
    /// The number of pages removed
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the page does not exist.
    pub async fn delete_page(&self, page_id: &str) -> Result<u64, FiberServiceError> {
        let page = self
            .store
            .get_page(page_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::page_not_found(page_id))?;

        // Capture affected content before the placement rows cascade away
        let item_ids = match self.subtree_content_ids(&page).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Failed to collect content of subtree {}: {}", page_id, e);
                HashSet::new()
            }
        };

        let removed = self
            .store
            .delete_subtree(&page)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        tracing::info!(
            "Deleted page '{}' ({}) and {} descendants",
            page.title,
            page.id,
            removed.saturating_sub(1)
        );

        for item_id in item_ids {
            if let Err(e) = self.content.refresh_used_on_pages(&item_id).await {
                tracing::warn!(
                    "Failed to refresh used-on-pages for item {}: {}",
                    item_id,
                    e
                );
            }
        }

        Ok(removed)
    }

    /// Update a page's editable fields
    ///
    /// Re-validates the `url` field (shape, root rule, named-route
    /// resolution) before persisting. When the update changes the page's
    /// absolute URL, the rename cascade rewrites stored content references
    /// and the used-on-pages read models of content on the page and its
    /// descendants are refreshed.
    ///
    /// # Errors
    ///
    /// - `PageNotFound` when the page does not exist
    /// - `ValidationFailed` / `UnresolvedNamedRoute` for bad `url` values
    pub async fn update_page(
        &self,
        page_id: &str,
        update: PageUpdate,
        editor: &EditorConfig,
    ) -> Result<Page, FiberServiceError> {
        let current = self
            .store
            .get_page(page_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::page_not_found(page_id))?;

        if update.is_empty() {
            return Ok(current);
        }

        let mut candidate = current.clone();
        if let Some(url) = &update.url {
            candidate.url = url.clone();
        }
        if let Some(metadata) = &update.metadata {
            candidate.metadata = metadata.clone();
        }
        if let Some(redirect) = &update.redirect_page_id {
            candidate.redirect_page_id = redirect.clone();
        }
        candidate.validate()?;
        self.validate_url(&candidate)?;

        let old_url = self.try_absolute_url(&current).await;

        let updated = self
            .store
            .update_page(page_id, update)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        tracing::info!("Updated page '{}' ({})", updated.title, updated.id);

        self.handle_url_change(old_url, &updated, editor).await;
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // POSITION QUERIES
    // ------------------------------------------------------------------

    /// Get a page by ID
    pub async fn get_page(&self, id: &str) -> Result<Option<Page>, FiberServiceError> {
        self.store
            .get_page(id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))
    }

    /// Whether the page is the first child of its parent
    ///
    /// Root pages count as first children.
    pub async fn is_first_child(&self, page: &Page) -> Result<bool, FiberServiceError> {
        let parent_id = match &page.parent_id {
            Some(id) => id,
            None => return Ok(true),
        };
        let parent = self
            .store
            .get_page(parent_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::page_not_found(parent_id))?;

        Ok(page.left == parent.left + 1)
    }

    /// Whether the page is the last child of its parent
    ///
    /// Root pages count as last children.
    pub async fn is_last_child(&self, page: &Page) -> Result<bool, FiberServiceError> {
        let parent_id = match &page.parent_id {
            Some(id) => id,
            None => return Ok(true),
        };
        let parent = self
            .store
            .get_page(parent_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::page_not_found(parent_id))?;

        Ok(page.right + 1 == parent.right)
    }

    /// Ancestors of a page, ordered root to parent
    pub async fn get_ancestors(&self, page: &Page) -> Result<Vec<Page>, FiberServiceError> {
        self.store
            .get_ancestors(page)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))
    }

    /// Ancestors of a page answered from a primed cache, root to parent
    ///
    /// No store queries; fails if the chain is not fully cached.
    pub fn get_ancestors_cached(
        &self,
        page: &Page,
        cache: &AncestorCache,
    ) -> Result<Vec<Page>, FiberServiceError> {
        Ok(cache
            .ancestor_chain(page)?
            .into_iter()
            .cloned()
            .collect())
    }

    /// Descendants of a page in preorder
    ///
    /// # Arguments
    ///
    /// * `max_level` - Optional inclusive absolute level cap
    pub async fn get_descendants(
        &self,
        page: &Page,
        max_level: Option<i64>,
    ) -> Result<Vec<Page>, FiberServiceError> {
        self.store
            .get_descendants(page, max_level)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))
    }

    /// Direct children of a page in tree order
    pub async fn get_children(&self, page: &Page) -> Result<Vec<Page>, FiberServiceError> {
        self.store
            .get_children(Some(&page.id))
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))
    }

    /// All root pages, one per tree, in tree sequence order
    pub async fn get_root_pages(&self) -> Result<Vec<Page>, FiberServiceError> {
        self.store
            .get_children(None)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))
    }

    /// Pages sharing the page's parent, in tree order
    ///
    /// For a root page the siblings are all root pages, ordered by tree
    /// sequence.
    ///
    /// # Arguments
    ///
    /// * `include_self` - Whether the page itself appears in the result
    pub async fn get_siblings(
        &self,
        page: &Page,
        include_self: bool,
    ) -> Result<Vec<Page>, FiberServiceError> {
        let siblings = self
            .store
            .get_children(page.parent_id.as_deref())
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        if include_self {
            Ok(siblings)
        } else {
            Ok(siblings.into_iter().filter(|p| p.id != page.id).collect())
        }
    }

    /// Menu-visible public pages of one tree within a level band
    ///
    /// Pages with `show_in_menu` or `is_public` unset are filtered out;
    /// per-user visibility beyond the flags belongs to the host layer.
    pub async fn get_shown_pages(
        &self,
        tree_id: i64,
        min_level: i64,
        max_level: i64,
    ) -> Result<Vec<Page>, FiberServiceError> {
        self.store
            .get_shown_pages(tree_id, min_level, max_level)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))
    }

    // ------------------------------------------------------------------
    // URL DERIVATION & RESOLUTION
    // ------------------------------------------------------------------

    /// Derive the page's absolute URL
    ///
    /// Relative segments are resolved against the ancestor chain; quoted
    /// values go through the named-route resolver; empty, absolute and
    /// external values need no queries.
    ///
    /// # Errors
    ///
    /// - `UnresolvedNamedRoute` when a quoted `url` in the chain cannot be
    ///   resolved
    /// - `ValidationFailed` when a root page carries a bare relative segment
    pub async fn absolute_url(&self, page: &Page) -> Result<String, FiberServiceError> {
        let absolute = if page.url_kind() == UrlKind::Relative {
            let ancestors = self
                .store
                .get_ancestors(page)
                .await
                .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
            derive_absolute_url(self.routes.as_ref(), ancestors.iter().chain([page]))?
        } else {
            derive_absolute_url(self.routes.as_ref(), [page])?
        };

        tracing::debug!("Derived URL '{}' for page {}", absolute, page.id);
        Ok(absolute)
    }

    /// Derive the page's absolute URL from a primed cache, without queries
    pub fn absolute_url_cached(
        &self,
        page: &Page,
        cache: &AncestorCache,
    ) -> Result<String, FiberServiceError> {
        if page.url_kind() != UrlKind::Relative {
            return derive_absolute_url(self.routes.as_ref(), [page]);
        }
        let ancestors = cache.ancestor_chain(page)?;
        derive_absolute_url(self.routes.as_ref(), ancestors.into_iter().chain([page]))
    }

    /// Resolve an absolute URL to a page
    ///
    /// Three stages:
    /// 1. a page whose raw `url` field equals the request verbatim,
    /// 2. pages whose `url` contains the last path segment, compared by
    ///    derived absolute URL (ancestor chains are bulk-loaded into an
    ///    [`AncestorCache`]; candidates whose derivation fails are skipped),
    /// 3. pages with a quoted `url` whose resolved route equals the request.
    ///
    /// Returns `None` when nothing matches.
    pub async fn find_by_url(&self, url: &str) -> Result<Option<Page>, FiberServiceError> {
        let exact = self
            .store
            .get_pages_by_exact_url(url)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
        if let Some(page) = exact.into_iter().next() {
            return Ok(Some(page));
        }

        let last_part = url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        if !last_part.is_empty() {
            let candidates = self
                .store
                .get_pages_by_url_fragment(last_part)
                .await
                .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

            if !candidates.is_empty() {
                let mut cache = AncestorCache::new();
                for candidate in &candidates {
                    let ancestors = self
                        .store
                        .get_ancestors(candidate)
                        .await
                        .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
                    for ancestor in ancestors {
                        cache.insert(ancestor);
                    }
                    cache.insert(candidate.clone());
                }

                for candidate in candidates {
                    match self.absolute_url_cached(&candidate, &cache) {
                        Ok(derived) if derived == url => return Ok(Some(candidate)),
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!("Skipping URL candidate {}: {}", candidate.id, e)
                        }
                    }
                }
            }
        }

        let quoted = self
            .store
            .get_quoted_url_pages()
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
        for page in quoted {
            if let Some(name) = quoted_route_name(&page.url) {
                if self.routes.resolve(name).as_deref() == Some(url) {
                    return Ok(Some(page));
                }
            }
        }

        Ok(None)
    }

    // ------------------------------------------------------------------
    // DIAGNOSTICS
    // ------------------------------------------------------------------

    /// Check the interval invariants of one tree
    ///
    /// Read-only pass: interval bounds well formed, endpoints forming the
    /// contiguous range `1..2N`, exactly one root, strict containment with
    /// `parent_id` links and `level` values matching the intervals.
    ///
    /// # Errors
    ///
    /// Returns `StructuralConsistency` describing the first violation.
    pub async fn verify_tree(&self, tree_id: i64) -> Result<(), FiberServiceError> {
        let pages = self
            .store
            .get_tree_pages(tree_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
        if pages.is_empty() {
            return Ok(());
        }

        for page in &pages {
            if page.left >= page.right {
                return Err(FiberServiceError::structural_consistency(format!(
                    "Page {} has inverted interval [{}, {}]",
                    page.id, page.left, page.right
                )));
            }
            if (page.right - page.left + 1) % 2 != 0 {
                return Err(FiberServiceError::structural_consistency(format!(
                    "Page {} has odd interval width [{}, {}]",
                    page.id, page.left, page.right
                )));
            }
        }

        let roots = pages.iter().filter(|p| p.parent_id.is_none()).count();
        if roots != 1 {
            return Err(FiberServiceError::structural_consistency(format!(
                "Tree {} has {} root pages",
                tree_id, roots
            )));
        }

        let mut endpoints: Vec<i64> = pages.iter().flat_map(|p| [p.left, p.right]).collect();
        endpoints.sort_unstable();
        for (index, value) in endpoints.iter().enumerate() {
            if *value != index as i64 + 1 {
                return Err(FiberServiceError::structural_consistency(format!(
                    "Tree {} endpoints are not the contiguous range 1..{}",
                    tree_id,
                    pages.len() * 2
                )));
            }
        }

        // Preorder walk with a stack of open intervals
        let mut stack: Vec<&Page> = Vec::new();
        for page in &pages {
            while let Some(top) = stack.last() {
                if top.right < page.left {
                    stack.pop();
                } else {
                    break;
                }
            }
            match stack.last() {
                Some(top) => {
                    if page.right > top.right {
                        return Err(FiberServiceError::structural_consistency(format!(
                            "Pages {} and {} have partially overlapping intervals",
                            top.id, page.id
                        )));
                    }
                    if page.parent_id.as_deref() != Some(top.id.as_str()) {
                        return Err(FiberServiceError::structural_consistency(format!(
                            "Page {} parent link does not match its enclosing interval",
                            page.id
                        )));
                    }
                }
                None => {
                    if page.parent_id.is_some() {
                        return Err(FiberServiceError::structural_consistency(format!(
                            "Page {} has a parent link but no enclosing interval",
                            page.id
                        )));
                    }
                }
            }
            if page.level != stack.len() as i64 {
                return Err(FiberServiceError::structural_consistency(format!(
                    "Page {} has level {} at depth {}",
                    page.id,
                    page.level,
                    stack.len()
                )));
            }
            stack.push(page);
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // INTERNALS
    // ------------------------------------------------------------------

    /// Check that a quoted url resolves; other kinds pass through
    fn validate_url(&self, page: &Page) -> Result<(), FiberServiceError> {
        if let Some(name) = quoted_route_name(&page.url) {
            if self.routes.resolve(name).is_none() {
                return Err(FiberServiceError::unresolved_named_route(name));
            }
        }
        Ok(())
    }

    /// Derive the absolute URL, logging instead of failing
    ///
    /// Used to capture the pre-mutation URL: a derivation failure (broken
    /// legacy chain) must not block the mutation that may well repair it.
    async fn try_absolute_url(&self, page: &Page) -> Option<String> {
        match self.absolute_url(page).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Failed to derive current URL for page {}: {}", page.id, e);
                None
            }
        }
    }

    /// Run URL-change side effects after a committed mutation
    ///
    /// Compares the captured old URL with the page's new one; on a change,
    /// rewrites stored content references and refreshes the used-on-pages
    /// read models of content placed on the page's subtree. Best-effort:
    /// failures are logged, never propagated.
    async fn handle_url_change(&self, old_url: Option<String>, page: &Page, editor: &EditorConfig) {
        let old_url = match old_url {
            Some(url) if !url.is_empty() => url,
            _ => return,
        };
        let new_url = match self.absolute_url(page).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Failed to derive new URL for page {}: {}", page.id, e);
                return;
            }
        };
        if old_url == new_url {
            return;
        }

        match self.content.rename_url(&old_url, &new_url, editor).await {
            Ok(outcome) => {
                if outcome.failed.is_empty() {
                    tracing::debug!(
                        "Rewrote {} content items from '{}' to '{}'",
                        outcome.renamed.len(),
                        old_url,
                        new_url
                    );
                } else {
                    tracing::warn!(
                        "URL rename from '{}' to '{}' failed for {} of {} content items",
                        old_url,
                        new_url,
                        outcome.failed.len(),
                        outcome.failed.len() + outcome.renamed.len()
                    );
                }
            }
            Err(e) => tracing::warn!(
                "URL rename cascade from '{}' to '{}' failed: {}",
                old_url,
                new_url,
                e
            ),
        }

        match self.subtree_content_ids(page).await {
            Ok(item_ids) => {
                for item_id in item_ids {
                    if let Err(e) = self.content.refresh_used_on_pages(&item_id).await {
                        tracing::warn!(
                            "Failed to refresh used-on-pages for item {}: {}",
                            item_id,
                            e
                        );
                    }
                }
            }
            Err(e) => tracing::warn!(
                "Failed to collect content of subtree {}: {}",
                page.id,
                e
            ),
        }
    }

    /// Distinct ids of content items placed on the page or its descendants
    async fn subtree_content_ids(
        &self,
        page: &Page,
    ) -> Result<HashSet<String>, FiberServiceError> {
        let mut pages = vec![page.clone()];
        pages.extend(
            self.store
                .get_descendants(page, None)
                .await
                .map_err(|e| FiberServiceError::query_failed(e.to_string()))?,
        );

        let mut item_ids = HashSet::new();
        for p in &pages {
            let placements = self
                .store
                .get_page_placements(&p.id)
                .await
                .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
            for placement in placements {
                item_ids.insert(placement.content_item_id);
            }
        }
        Ok(item_ids)
    }
}

#[cfg(test)]
#[path = "page_service_tree_test.rs"]
mod page_service_tree_test;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseService, TursoStore};
    use crate::services::routes::StaticRouteResolver;
    use tempfile::TempDir;

    async fn create_test_service() -> (PageService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
        let store = Arc::new(TursoStore::new(db));
        let routes = Arc::new(
            StaticRouteResolver::new().with_route("docs", "/documentation/"),
        );
        (PageService::new(store, routes), temp_dir)
    }

    async fn create_standard_site(service: &PageService) -> (Page, Page, Page) {
        let home = service
            .create_page(CreatePageParams::new("home", "", InsertPosition::Root))
            .await
            .unwrap();
        let section1 = service
            .create_page(CreatePageParams::new(
                "section1",
                "section1",
                InsertPosition::LastChildOf(home.id.clone()),
            ))
            .await
            .unwrap();
        let abc = service
            .create_page(CreatePageParams::new(
                "abc",
                "abc",
                InsertPosition::LastChildOf(section1.id.clone()),
            ))
            .await
            .unwrap();
        (home, section1, abc)
    }

    #[tokio::test]
    async fn test_create_page_missing_anchor_fails() {
        let (service, _temp) = create_test_service().await;

        let result = service
            .create_page(CreatePageParams::new(
                "stray",
                "stray",
                InsertPosition::LastChildOf("no-such-page".to_string()),
            ))
            .await;

        assert!(matches!(
            result,
            Err(FiberServiceError::PageNotFound { id }) if id == "no-such-page"
        ));
    }

    #[tokio::test]
    async fn test_create_root_with_relative_url_fails() {
        let (service, _temp) = create_test_service().await;

        let result = service
            .create_page(CreatePageParams::new(
                "stray",
                "section1",
                InsertPosition::Root,
            ))
            .await;

        assert!(matches!(
            result,
            Err(FiberServiceError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_create_page_with_unknown_named_route_fails() {
        let (service, _temp) = create_test_service().await;

        let result = service
            .create_page(CreatePageParams::new(
                "ghost",
                "\"ghost\"",
                InsertPosition::Root,
            ))
            .await;

        assert!(matches!(
            result,
            Err(FiberServiceError::UnresolvedNamedRoute { name }) if name == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_absolute_url_table() {
        let (service, _temp) = create_test_service().await;
        let (home, section1, abc) = create_standard_site(&service).await;

        let def = service
            .create_page(CreatePageParams::new(
                "def",
                "/def/",
                InsertPosition::LastChildOf(section1.id.clone()),
            ))
            .await
            .unwrap();
        let external = service
            .create_page(CreatePageParams::new(
                "elsewhere",
                "http://example.com",
                InsertPosition::AfterSibling(home.id.clone()),
            ))
            .await
            .unwrap();
        let docs = service
            .create_page(CreatePageParams::new(
                "docs",
                "\"docs\"",
                InsertPosition::AfterSibling(home.id.clone()),
            ))
            .await
            .unwrap();

        assert_eq!(service.absolute_url(&home).await.unwrap(), "");
        assert_eq!(service.absolute_url(&section1).await.unwrap(), "/section1/");
        assert_eq!(service.absolute_url(&abc).await.unwrap(), "/section1/abc/");
        assert_eq!(service.absolute_url(&def).await.unwrap(), "/def/");
        assert_eq!(
            service.absolute_url(&external).await.unwrap(),
            "http://example.com"
        );
        assert_eq!(
            service.absolute_url(&docs).await.unwrap(),
            "/documentation/"
        );
    }

    #[tokio::test]
    async fn test_update_page_revalidates_url() {
        let (service, _temp) = create_test_service().await;
        let (_home, _section1, abc) = create_standard_site(&service).await;

        let result = service
            .update_page(
                &abc.id,
                PageUpdate::new().with_url("\"missing-route\"".to_string()),
                &EditorConfig::default(),
            )
            .await;

        assert!(matches!(
            result,
            Err(FiberServiceError::UnresolvedNamedRoute { name }) if name == "missing-route"
        ));

        // The failed update must not have touched the stored page
        let unchanged = service.get_page(&abc.id).await.unwrap().unwrap();
        assert_eq!(unchanged.url, "abc");
    }

    #[tokio::test]
    async fn test_find_by_url_exact_stage() {
        let (service, _temp) = create_test_service().await;
        let (_home, section1, _abc) = create_standard_site(&service).await;

        let found = service.find_by_url("section1").await.unwrap().unwrap();
        assert_eq!(found.id, section1.id);
    }

    #[tokio::test]
    async fn test_find_by_url_derived_stage() {
        let (service, _temp) = create_test_service().await;
        let (_home, _section1, abc) = create_standard_site(&service).await;

        let found = service.find_by_url("/section1/abc/").await.unwrap().unwrap();
        assert_eq!(found.id, abc.id);
    }

    #[tokio::test]
    async fn test_find_by_url_named_route_stage() {
        let (service, _temp) = create_test_service().await;

        let docs = service
            .create_page(CreatePageParams::new(
                "docs",
                "\"docs\"",
                InsertPosition::Root,
            ))
            .await
            .unwrap();

        let found = service
            .find_by_url("/documentation/")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, docs.id);
    }

    #[tokio::test]
    async fn test_find_by_url_returns_none_for_strangers() {
        let (service, _temp) = create_test_service().await;
        create_standard_site(&service).await;

        assert!(service
            .find_by_url("/nowhere/at/all/")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_ancestor_cache_chain() {
        let mut root = Page::new("root".to_string(), "".to_string());
        root.tree_id = 1;
        root.left = 1;
        root.right = 6;

        let mut mid = Page::new("mid".to_string(), "mid".to_string());
        mid.parent_id = Some(root.id.clone());
        mid.tree_id = 1;
        mid.left = 2;
        mid.right = 5;

        let mut leaf = Page::new("leaf".to_string(), "leaf".to_string());
        leaf.parent_id = Some(mid.id.clone());
        leaf.tree_id = 1;
        leaf.left = 3;
        leaf.right = 4;

        let cache = AncestorCache::prime([root.clone(), mid.clone()]);
        let chain = cache.ancestor_chain(&leaf).unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].id, root.id);
        assert_eq!(chain[1].id, mid.id);
    }

    #[test]
    fn test_ancestor_cache_incomplete_chain_fails() {
        let root = Page::new("root".to_string(), "".to_string());
        let mut leaf = Page::new("leaf".to_string(), "leaf".to_string());
        leaf.parent_id = Some("missing-parent".to_string());

        let cache = AncestorCache::prime([root]);
        assert!(matches!(
            cache.ancestor_chain(&leaf),
            Err(FiberServiceError::QueryFailed(_))
        ));
    }

    #[test]
    fn test_ancestor_cache_detects_parent_cycle() {
        let mut a = Page::new("a".to_string(), "".to_string());
        let mut b = Page::new("b".to_string(), "".to_string());
        a.parent_id = Some(b.id.clone());
        b.parent_id = Some(a.id.clone());

        let cache = AncestorCache::prime([a.clone(), b]);
        assert!(matches!(
            cache.ancestor_chain(&a),
            Err(FiberServiceError::StructuralConsistency { .. })
        ));
    }

}
