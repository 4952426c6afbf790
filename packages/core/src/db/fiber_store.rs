//! FiberStore Trait - Database Abstraction Layer
//!
//! This module defines the `FiberStore` trait that abstracts persistence for
//! pages, content items, and placements. The trait separates the page-tree
//! and block services (business logic) from the database implementation.
//!
//! # Architecture
//!
//! - **Abstraction Point**: Between the services (tree rules, URL rules,
//!   block ordering) and the database implementation
//! - **Structural operations stay below the trait**: nested-set interval
//!   arithmetic and its transactions live in the implementation, so every
//!   backend guarantees the same atomicity
//! - **Validation stays above the trait**: anchor existence, cycle checks,
//!   and URL validation happen in the services before a store call
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async to support both embedded and
//!    network backends
//! 2. **Ownership Semantics**: Creation methods take ownership of values to
//!    avoid unnecessary cloning (caller can clone if needed)
//! 3. **Error Handling**: Uses `anyhow::Result` for flexible error context
//!
//! # Examples
//!
//! ```rust,no_run
//! use fiber_core::db::{DatabaseService, FiberStore, TursoStore};
//! use fiber_core::models::{InsertPosition, Page};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("fiber.db")).await?);
//!     let store: Arc<dyn FiberStore> = Arc::new(TursoStore::new(db));
//!
//!     let home = Page::new("Home".to_string(), "home".to_string());
//!     let created = store.insert_page(home, InsertPosition::Root).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::models::{
    ContentItem, ContentItemUpdate, DeleteResult, InsertPosition, MovePosition, Page,
    PageContentItem, PageUpdate, UsedOnPage,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Abstraction layer for page, content item, and placement persistence
///
/// Implementations own the nested-set bookkeeping: every structural method
/// (`insert_page`, `move_subtree`, `delete_subtree`) must apply its interval
/// shifts atomically, so the `lft`/`rght` encoding is consistent after every
/// call that returns `Ok`.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow usage in async contexts
/// where futures may be moved between threads.
///
/// # Method Categories
///
/// - **Page tree**: 14 methods (structural mutations and tree reads)
/// - **Content items**: 6 methods (CRUD plus the used-on-pages cache)
/// - **Placements**: 9 methods (block membership and ordering)
/// - **Lifecycle**: 1 method (resource management)
#[async_trait]
pub trait FiberStore: Send + Sync {
    //
    // PAGE TREE OPERATIONS
    //

    /// Insert a page at the requested position
    ///
    /// The page's tree coordinates (`left`, `right`, `tree_id`, `level`) and
    /// `parent_id` are computed from `position`; whatever the caller put in
    /// those fields is ignored. All other fields are stored as given.
    ///
    /// # Arguments
    ///
    /// * `page` - Page to insert (ownership transferred to avoid cloning)
    /// * `position` - Where the page goes: a new root, a first/last child of
    ///   an anchor page, or a sibling before/after an anchor page
    ///
    /// # Returns
    ///
    /// The stored page with its final tree coordinates and timestamps
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The anchor page doesn't exist
    /// - The page ID already exists (duplicate key)
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use fiber_core::db::FiberStore;
    /// # use fiber_core::models::{InsertPosition, Page};
    /// # async fn example(store: &dyn FiberStore) -> anyhow::Result<()> {
    /// let home = Page::new("Home".to_string(), "home".to_string());
    /// let home = store.insert_page(home, InsertPosition::Root).await?;
    ///
    /// let news = Page::new("News".to_string(), "news".to_string());
    /// let news = store
    ///     .insert_page(news, InsertPosition::LastChildOf(home.id.clone()))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn insert_page(&self, page: Page, position: InsertPosition) -> Result<Page>;

    /// Get page by ID
    ///
    /// # Returns
    ///
    /// - `Ok(Some(page))` if the page exists
    /// - `Ok(None)` if the page doesn't exist (not an error)
    /// - `Err(_)` if a database error occurs
    async fn get_page(&self, id: &str) -> Result<Option<Page>>;

    /// Update a page's own fields
    ///
    /// Sparse update: only the fields set in `update` are written. Tree
    /// coordinates are out of scope; position changes go through
    /// [`move_subtree`](FiberStore::move_subtree).
    ///
    /// # Returns
    ///
    /// The updated page with all fields
    ///
    /// # Errors
    ///
    /// Returns error if the page doesn't exist
    async fn update_page(&self, id: &str, update: PageUpdate) -> Result<Page>;

    /// Move a page and its whole subtree relative to a target page
    ///
    /// The subtree keeps its internal structure; its coordinates, `tree_id`,
    /// and `level` values are rewritten for the destination. Works across
    /// trees. Moving before/after a root-level target re-roots the subtree
    /// as a tree of its own at that point in the root sequence.
    ///
    /// # Atomicity
    ///
    /// The relocation is all-or-nothing: either every interval shift lands
    /// or the tree is left untouched.
    ///
    /// # Errors
    ///
    /// Returns error if the page or target doesn't exist. Cycle prevention
    /// (target inside the moved subtree) is validated by the services before
    /// this call.
    async fn move_subtree(
        &self,
        page_id: &str,
        target_id: &str,
        position: MovePosition,
    ) -> Result<()>;

    /// Delete a page and its whole subtree
    ///
    /// Placements on removed pages are removed with them. The interval gap
    /// left by the subtree is closed in the same transaction.
    ///
    /// # Arguments
    ///
    /// * `page` - The subtree root to delete (coordinates identify the range)
    ///
    /// # Returns
    ///
    /// Number of pages removed
    async fn delete_subtree(&self, page: &Page) -> Result<u64>;

    /// Ancestors of a page, ordered root first, parent last
    ///
    /// A root page has no ancestors (empty vector).
    async fn get_ancestors(&self, page: &Page) -> Result<Vec<Page>>;

    /// Descendants of a page in tree order (preorder)
    ///
    /// # Arguments
    ///
    /// * `page` - Subtree root (not included in the result)
    /// * `max_level` - Optional absolute level cutoff; descendants deeper
    ///   than this are excluded
    async fn get_descendants(&self, page: &Page, max_level: Option<i64>) -> Result<Vec<Page>>;

    /// Direct children of a page in position order
    ///
    /// # Arguments
    ///
    /// * `parent_id` - Parent page ID, or None for the root pages of every
    ///   tree (ordered by tree sequence)
    async fn get_children(&self, parent_id: Option<&str>) -> Result<Vec<Page>>;

    /// Every page of one tree in preorder
    async fn get_tree_pages(&self, tree_id: i64) -> Result<Vec<Page>>;

    /// Distinct tree ids in sequence order
    async fn get_tree_ids(&self) -> Result<Vec<i64>>;

    /// Menu-visible public pages of one tree within an absolute level band
    ///
    /// Pages with `show_in_menu = false` or `is_public = false` are
    /// filtered out; their descendants are still returned if they qualify
    /// themselves.
    async fn get_shown_pages(
        &self,
        tree_id: i64,
        min_level: i64,
        max_level: i64,
    ) -> Result<Vec<Page>>;

    /// Pages whose stored url field matches `url` exactly
    async fn get_pages_by_exact_url(&self, url: &str) -> Result<Vec<Page>>;

    /// Pages whose non-empty url field contains `fragment` literally
    ///
    /// Candidate pool for the derived-URL stage of URL resolution; the
    /// fragment is the last path segment of the requested URL.
    async fn get_pages_by_url_fragment(&self, fragment: &str) -> Result<Vec<Page>>;

    /// Pages whose url field is a quoted named-route reference (`"name"`)
    async fn get_quoted_url_pages(&self) -> Result<Vec<Page>>;

    //
    // CONTENT ITEM OPERATIONS
    //

    /// Create a new content item
    ///
    /// # Ownership
    ///
    /// Takes ownership of the item to avoid unnecessary cloning. Caller can
    /// clone before calling if they need to retain the original.
    ///
    /// # Returns
    ///
    /// Created item with any generated fields (timestamps)
    async fn create_content_item(&self, item: ContentItem) -> Result<ContentItem>;

    /// Get content item by ID
    ///
    /// # Returns
    ///
    /// - `Ok(Some(item))` if the item exists
    /// - `Ok(None)` if the item doesn't exist (not an error)
    async fn get_content_item(&self, id: &str) -> Result<Option<ContentItem>>;

    /// All content items, ordered by name
    async fn get_all_content_items(&self) -> Result<Vec<ContentItem>>;

    /// Update a content item's editable fields
    ///
    /// Sparse update: only the fields set in `update` are written.
    ///
    /// # Returns
    ///
    /// The updated item with all fields
    ///
    /// # Errors
    ///
    /// Returns error if the item doesn't exist
    async fn update_content_item(&self, id: &str, update: ContentItemUpdate)
        -> Result<ContentItem>;

    /// Write an item's denormalized used-on-pages cache
    ///
    /// The cache is a read model; writing it does not count as a content
    /// edit (the item's updated timestamp is untouched).
    async fn set_used_on_pages(&self, id: &str, pages: &[UsedOnPage]) -> Result<()>;

    /// Delete a content item and its placements
    ///
    /// # Idempotency
    ///
    /// Deleting a non-existent item succeeds with `existed = false`.
    async fn delete_content_item(&self, id: &str) -> Result<DeleteResult>;

    //
    // PLACEMENT OPERATIONS
    //

    /// Add a placement at the end of its (page, block) list
    ///
    /// The placement's `sort` field is assigned by the store (one past the
    /// block's current maximum); whatever the caller put there is ignored.
    ///
    /// # Returns
    ///
    /// The stored placement with its final sort value
    ///
    /// # Errors
    ///
    /// Returns error if the page or content item doesn't exist (foreign key
    /// violation)
    async fn add_placement(&self, placement: PageContentItem) -> Result<PageContentItem>;

    /// Get placement by ID
    async fn get_placement(&self, id: &str) -> Result<Option<PageContentItem>>;

    /// Placements of one (page, block) pair in sort order
    async fn get_block_placements(
        &self,
        page_id: &str,
        block_name: &str,
    ) -> Result<Vec<PageContentItem>>;

    /// Every placement on one page, grouped by block in sort order
    async fn get_page_placements(&self, page_id: &str) -> Result<Vec<PageContentItem>>;

    /// Persist a placement's block change
    ///
    /// Sort values are untouched; reordering is applied separately through
    /// [`apply_sort_updates`](FiberStore::apply_sort_updates).
    async fn set_placement_block(&self, id: &str, block_name: &str) -> Result<()>;

    /// Apply a batch of placement sort updates atomically
    ///
    /// Used by the block engine to renumber a block (or the source and
    /// destination blocks of a cross-block move) in one transaction.
    ///
    /// # Arguments
    ///
    /// * `updates` - (placement id, new sort) pairs
    async fn apply_sort_updates(&self, updates: &[(String, i64)]) -> Result<()>;

    /// Delete a placement
    ///
    /// # Idempotency
    ///
    /// Deleting a non-existent placement succeeds with `existed = false`.
    async fn delete_placement(&self, id: &str) -> Result<DeleteResult>;

    /// Pages a content item is placed on, in tree order
    ///
    /// Each page appears once even when the item is placed on it multiple
    /// times.
    async fn get_pages_using_item(&self, content_item_id: &str) -> Result<Vec<Page>>;

    /// Placement counts per content item
    ///
    /// # Returns
    ///
    /// Map from content item ID to number of placements. Items with zero
    /// placements are absent.
    async fn get_placement_counts(&self) -> Result<HashMap<String, i64>>;

    //
    // DATABASE LIFECYCLE
    //

    /// Flush pending writes and release resources
    ///
    /// Should be called when shutting down so a following process sees all
    /// writes.
    async fn close(&self) -> Result<()>;
}
