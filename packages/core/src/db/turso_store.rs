//! TursoStore - FiberStore Implementation for Turso/libsql Backend
//!
//! This module implements the `FiberStore` trait for the Turso (libsql)
//! database.
//!
//! # Design Principles
//!
//! 1. **Pure Delegation**: All methods delegate to DatabaseService
//! 2. **Row Conversion**: Handles libsql::Row to model conversion
//! 3. **Zero Business Logic**: Tree rules, URL rules, and block ordering
//!    decisions live in the services; this layer only persists
//!
//! # Examples
//!
//! ```rust,no_run
//! use fiber_core::db::{DatabaseService, FiberStore, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/fiber.db")).await?);
//!     let store: Arc<dyn FiberStore> = Arc::new(TursoStore::new(db));
//!
//!     let page = store.get_page("page-123").await?;
//!
//!     Ok(())
//! }
//! ```

use crate::db::fiber_store::FiberStore;
use crate::db::{
    DatabaseService, DbInsertContentItemParams, DbInsertPageParams, DbInsertPlacementParams,
    DbUpdateContentItemParams, DbUpdatePageParams,
};
use crate::models::{
    ContentItem, ContentItemUpdate, DeleteResult, InsertPosition, MovePosition, Page,
    PageContentItem, PageUpdate, UsedOnPage,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::Row;
use std::collections::HashMap;
use std::sync::Arc;

/// TursoStore implements the FiberStore trait for the Turso/libsql backend
///
/// This is a thin wrapper around DatabaseService: the structural SQL lives
/// in the `db_*` methods, the model conversion lives here.
pub struct TursoStore {
    /// Underlying database service (extracted SQL operations)
    db: Arc<DatabaseService>,
}

impl TursoStore {
    /// Create a new TursoStore wrapper
    ///
    /// # Arguments
    ///
    /// * `db` - Arc to DatabaseService with extracted SQL operations
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use fiber_core::db::{DatabaseService, TursoStore};
    /// # use std::path::PathBuf;
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Arc::new(DatabaseService::new(PathBuf::from("./test.db")).await?);
    /// let store = TursoStore::new(db);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Parse timestamp from database - handles both SQLite and RFC3339 formats
    ///
    /// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
    /// Old data might use RFC3339: "YYYY-MM-DDTHH:MM:SSZ"
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        // Try SQLite format first: "YYYY-MM-DD HH:MM:SS"
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        // Try RFC3339 format (for old data): "YYYY-MM-DDTHH:MM:SSZ"
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        Err(anyhow::anyhow!(
            "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
            s
        ))
    }

    /// Convert libsql::Row to Page model
    ///
    /// This is the central conversion point for all page queries.
    ///
    /// # Row Format
    ///
    /// Expected columns (in order):
    /// - id (TEXT)
    /// - parent_id (TEXT, nullable)
    /// - redirect_page_id (TEXT, nullable)
    /// - title (TEXT)
    /// - url (TEXT)
    /// - lft (INTEGER)
    /// - rght (INTEGER)
    /// - tree_id (INTEGER)
    /// - level (INTEGER)
    /// - show_in_menu (BOOLEAN as INTEGER)
    /// - is_public (BOOLEAN as INTEGER)
    /// - metadata (TEXT, JSON)
    /// - created_at (TEXT)
    /// - updated_at (TEXT)
    fn row_to_page(row: &Row) -> Result<Page> {
        let id: String = row.get(0).context("Failed to get id")?;
        let parent_id: Option<String> = row.get(1).context("Failed to get parent_id")?;
        let redirect_page_id: Option<String> =
            row.get(2).context("Failed to get redirect_page_id")?;
        let title: String = row.get(3).context("Failed to get title")?;
        let url: String = row.get(4).context("Failed to get url")?;
        let left: i64 = row.get(5).context("Failed to get lft")?;
        let right: i64 = row.get(6).context("Failed to get rght")?;
        let tree_id: i64 = row.get(7).context("Failed to get tree_id")?;
        let level: i64 = row.get(8).context("Failed to get level")?;
        let show_in_menu: i64 = row.get(9).context("Failed to get show_in_menu")?;
        let is_public: i64 = row.get(10).context("Failed to get is_public")?;
        let metadata_json: String = row.get(11).context("Failed to get metadata")?;
        let created_at_str: String = row.get(12).context("Failed to get created_at")?;
        let updated_at_str: String = row.get(13).context("Failed to get updated_at")?;

        // Parse timestamps - handles both SQLite and RFC3339 formats
        let created_at =
            Self::parse_timestamp(&created_at_str).context("Failed to parse created_at")?;
        let updated_at =
            Self::parse_timestamp(&updated_at_str).context("Failed to parse updated_at")?;

        let metadata: serde_json::Value =
            serde_json::from_str(&metadata_json).context("Failed to parse metadata JSON")?;

        Ok(Page {
            id,
            parent_id,
            redirect_page_id,
            title,
            url,
            left,
            right,
            tree_id,
            level,
            show_in_menu: show_in_menu != 0,
            is_public: is_public != 0,
            metadata,
            created_at,
            updated_at,
        })
    }

    /// Convert libsql::Row to ContentItem model
    ///
    /// # Row Format
    ///
    /// Expected columns (in order): id, name, content_markup, content_html,
    /// used_on_pages (nullable JSON), metadata (JSON), created_at, updated_at
    fn row_to_content_item(row: &Row) -> Result<ContentItem> {
        let id: String = row.get(0).context("Failed to get id")?;
        let name: String = row.get(1).context("Failed to get name")?;
        let content_markup: String = row.get(2).context("Failed to get content_markup")?;
        let content_html: String = row.get(3).context("Failed to get content_html")?;
        let used_on_pages_json: Option<String> =
            row.get(4).context("Failed to get used_on_pages")?;
        let metadata_json: String = row.get(5).context("Failed to get metadata")?;
        let created_at_str: String = row.get(6).context("Failed to get created_at")?;
        let updated_at_str: String = row.get(7).context("Failed to get updated_at")?;

        let created_at =
            Self::parse_timestamp(&created_at_str).context("Failed to parse created_at")?;
        let updated_at =
            Self::parse_timestamp(&updated_at_str).context("Failed to parse updated_at")?;

        let used_on_pages = match used_on_pages_json {
            Some(json_str) => Some(
                serde_json::from_str(&json_str).context("Failed to parse used_on_pages JSON")?,
            ),
            None => None,
        };

        let metadata: serde_json::Value =
            serde_json::from_str(&metadata_json).context("Failed to parse metadata JSON")?;

        Ok(ContentItem {
            id,
            name,
            content_markup,
            content_html,
            used_on_pages,
            metadata,
            created_at,
            updated_at,
        })
    }

    /// Convert libsql::Row to PageContentItem model
    ///
    /// # Row Format
    ///
    /// Expected columns (in order): id, page_id, content_item_id, block_name,
    /// sort
    fn row_to_placement(row: &Row) -> Result<PageContentItem> {
        let id: String = row.get(0).context("Failed to get id")?;
        let page_id: String = row.get(1).context("Failed to get page_id")?;
        let content_item_id: String = row.get(2).context("Failed to get content_item_id")?;
        let block_name: String = row.get(3).context("Failed to get block_name")?;
        let sort: i64 = row.get(4).context("Failed to get sort")?;

        Ok(PageContentItem {
            id,
            page_id,
            content_item_id,
            block_name,
            sort,
        })
    }

    /// Drain a page result set into models
    async fn collect_pages(mut rows: libsql::Rows) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch row: {}", e))?
        {
            pages.push(Self::row_to_page(&row)?);
        }
        Ok(pages)
    }

    /// Drain a placement result set into models
    async fn collect_placements(mut rows: libsql::Rows) -> Result<Vec<PageContentItem>> {
        let mut placements = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch row: {}", e))?
        {
            placements.push(Self::row_to_placement(&row)?);
        }
        Ok(placements)
    }
}

#[async_trait]
impl FiberStore for TursoStore {
    async fn insert_page(&self, page: Page, position: InsertPosition) -> Result<Page> {
        let metadata_json =
            serde_json::to_string(&page.metadata).context("Failed to serialize metadata")?;

        let params = DbInsertPageParams {
            id: &page.id,
            redirect_page_id: page.redirect_page_id.as_deref(),
            title: &page.title,
            url: &page.url,
            show_in_menu: page.show_in_menu,
            is_public: page.is_public,
            metadata: &metadata_json,
        };

        match position.anchor_id() {
            None => self
                .db
                .db_insert_root_page(params)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to insert page: {}", e))?,
            Some(anchor_id) => self
                .db
                .db_insert_page_anchored(params, anchor_id, &position)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to insert page: {}", e))?,
        }

        // Fetch and return the page with its final tree coordinates
        self.get_page(&page.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Page not found after insertion"))
    }

    async fn get_page(&self, id: &str) -> Result<Option<Page>> {
        match self
            .db
            .db_get_page(id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get page: {}", e))?
        {
            Some(row) => Ok(Some(Self::row_to_page(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_page(&self, id: &str, update: PageUpdate) -> Result<Page> {
        // Fetch current page to build the merged update
        let current = self
            .get_page(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Page not found: {}", id))?;

        let title = update.title.unwrap_or(current.title);
        let url = update.url.unwrap_or(current.url);
        let redirect_page_id = match update.redirect_page_id {
            None => current.redirect_page_id,
            Some(new_redirect) => new_redirect,
        };
        let show_in_menu = update.show_in_menu.unwrap_or(current.show_in_menu);
        let is_public = update.is_public.unwrap_or(current.is_public);
        let metadata = update.metadata.unwrap_or(current.metadata);

        let metadata_json =
            serde_json::to_string(&metadata).context("Failed to serialize metadata")?;

        let params = DbUpdatePageParams {
            id,
            title: &title,
            url: &url,
            redirect_page_id: redirect_page_id.as_deref(),
            show_in_menu,
            is_public,
            metadata: &metadata_json,
        };

        self.db
            .db_update_page(params)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to update page: {}", e))?;

        self.get_page(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Page not found after update"))
    }

    async fn move_subtree(
        &self,
        page_id: &str,
        target_id: &str,
        position: MovePosition,
    ) -> Result<()> {
        self.db
            .db_move_subtree(page_id, target_id, position)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to move subtree: {}", e))?;

        Ok(())
    }

    async fn delete_subtree(&self, page: &Page) -> Result<u64> {
        let removed = self
            .db
            .db_delete_subtree(page.tree_id, page.left, page.right)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete subtree: {}", e))?;

        Ok(removed)
    }

    async fn get_ancestors(&self, page: &Page) -> Result<Vec<Page>> {
        let rows = self
            .db
            .db_get_ancestors(page.tree_id, page.left, page.right)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get ancestors: {}", e))?;

        Self::collect_pages(rows).await
    }

    async fn get_descendants(&self, page: &Page, max_level: Option<i64>) -> Result<Vec<Page>> {
        let rows = self
            .db
            .db_get_descendants(page.tree_id, page.left, page.right, max_level)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get descendants: {}", e))?;

        Self::collect_pages(rows).await
    }

    async fn get_children(&self, parent_id: Option<&str>) -> Result<Vec<Page>> {
        let rows = match parent_id {
            Some(parent_id) => self
                .db
                .db_get_children(parent_id)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to get children: {}", e))?,
            None => self
                .db
                .db_get_root_pages()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to get root pages: {}", e))?,
        };

        Self::collect_pages(rows).await
    }

    async fn get_tree_pages(&self, tree_id: i64) -> Result<Vec<Page>> {
        let rows = self
            .db
            .db_get_tree_pages(tree_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get tree pages: {}", e))?;

        Self::collect_pages(rows).await
    }

    async fn get_tree_ids(&self) -> Result<Vec<i64>> {
        self.db
            .db_get_tree_ids()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get tree ids: {}", e))
    }

    async fn get_shown_pages(
        &self,
        tree_id: i64,
        min_level: i64,
        max_level: i64,
    ) -> Result<Vec<Page>> {
        let rows = self
            .db
            .db_get_shown_pages(tree_id, min_level, max_level)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get shown pages: {}", e))?;

        Self::collect_pages(rows).await
    }

    async fn get_pages_by_exact_url(&self, url: &str) -> Result<Vec<Page>> {
        let rows = self
            .db
            .db_get_pages_by_url(url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get pages by url: {}", e))?;

        Self::collect_pages(rows).await
    }

    async fn get_pages_by_url_fragment(&self, fragment: &str) -> Result<Vec<Page>> {
        let rows = self
            .db
            .db_get_pages_by_url_fragment(fragment)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get pages by url fragment: {}", e))?;

        Self::collect_pages(rows).await
    }

    async fn get_quoted_url_pages(&self) -> Result<Vec<Page>> {
        let rows = self
            .db
            .db_get_quoted_url_pages()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get quoted url pages: {}", e))?;

        Self::collect_pages(rows).await
    }

    async fn create_content_item(&self, item: ContentItem) -> Result<ContentItem> {
        let metadata_json =
            serde_json::to_string(&item.metadata).context("Failed to serialize metadata")?;
        let used_on_pages_json = match &item.used_on_pages {
            Some(value) => {
                Some(serde_json::to_string(value).context("Failed to serialize used_on_pages")?)
            }
            None => None,
        };

        let params = DbInsertContentItemParams {
            id: &item.id,
            name: &item.name,
            content_markup: &item.content_markup,
            content_html: &item.content_html,
            used_on_pages: used_on_pages_json.as_deref(),
            metadata: &metadata_json,
        };

        self.db
            .db_insert_content_item(params)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create content item: {}", e))?;

        self.get_content_item(&item.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Content item not found after creation"))
    }

    async fn get_content_item(&self, id: &str) -> Result<Option<ContentItem>> {
        match self
            .db
            .db_get_content_item(id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get content item: {}", e))?
        {
            Some(row) => Ok(Some(Self::row_to_content_item(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_all_content_items(&self) -> Result<Vec<ContentItem>> {
        let mut rows = self
            .db
            .db_get_all_content_items()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get content items: {}", e))?;

        let mut items = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch row: {}", e))?
        {
            items.push(Self::row_to_content_item(&row)?);
        }

        Ok(items)
    }

    async fn update_content_item(
        &self,
        id: &str,
        update: ContentItemUpdate,
    ) -> Result<ContentItem> {
        let current = self
            .get_content_item(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Content item not found: {}", id))?;

        let name = update.name.unwrap_or(current.name);
        let content_markup = update.content_markup.unwrap_or(current.content_markup);
        let content_html = update.content_html.unwrap_or(current.content_html);
        let metadata = update.metadata.unwrap_or(current.metadata);

        let metadata_json =
            serde_json::to_string(&metadata).context("Failed to serialize metadata")?;

        let params = DbUpdateContentItemParams {
            id,
            name: &name,
            content_markup: &content_markup,
            content_html: &content_html,
            metadata: &metadata_json,
        };

        self.db
            .db_update_content_item(params)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to update content item: {}", e))?;

        self.get_content_item(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Content item not found after update"))
    }

    async fn set_used_on_pages(&self, id: &str, pages: &[UsedOnPage]) -> Result<()> {
        let used_on_pages_json =
            serde_json::to_string(pages).context("Failed to serialize used_on_pages")?;

        self.db
            .db_set_used_on_pages(id, &used_on_pages_json)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to set used_on_pages: {}", e))?;

        Ok(())
    }

    async fn delete_content_item(&self, id: &str) -> Result<DeleteResult> {
        let rows_affected = self
            .db
            .db_delete_content_item(id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete content item: {}", e))?;

        if rows_affected > 0 {
            Ok(DeleteResult::existed())
        } else {
            Ok(DeleteResult::not_found())
        }
    }

    async fn add_placement(&self, placement: PageContentItem) -> Result<PageContentItem> {
        let params = DbInsertPlacementParams {
            id: &placement.id,
            page_id: &placement.page_id,
            content_item_id: &placement.content_item_id,
            block_name: &placement.block_name,
        };

        self.db
            .db_insert_placement(params)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to add placement: {}", e))?;

        // Fetch and return the placement with its assigned sort
        self.get_placement(&placement.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Placement not found after creation"))
    }

    async fn get_placement(&self, id: &str) -> Result<Option<PageContentItem>> {
        match self
            .db
            .db_get_placement(id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get placement: {}", e))?
        {
            Some(row) => Ok(Some(Self::row_to_placement(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_block_placements(
        &self,
        page_id: &str,
        block_name: &str,
    ) -> Result<Vec<PageContentItem>> {
        let rows = self
            .db
            .db_get_block_placements(page_id, block_name)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get block placements: {}", e))?;

        Self::collect_placements(rows).await
    }

    async fn get_page_placements(&self, page_id: &str) -> Result<Vec<PageContentItem>> {
        let rows = self
            .db
            .db_get_page_placements(page_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get page placements: {}", e))?;

        Self::collect_placements(rows).await
    }

    async fn set_placement_block(&self, id: &str, block_name: &str) -> Result<()> {
        self.db
            .db_update_placement_block(id, block_name)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to set placement block: {}", e))?;

        Ok(())
    }

    async fn apply_sort_updates(&self, updates: &[(String, i64)]) -> Result<()> {
        self.db
            .db_apply_sort_updates(updates)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to apply sort updates: {}", e))?;

        Ok(())
    }

    async fn delete_placement(&self, id: &str) -> Result<DeleteResult> {
        let rows_affected = self
            .db
            .db_delete_placement(id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete placement: {}", e))?;

        if rows_affected > 0 {
            Ok(DeleteResult::existed())
        } else {
            Ok(DeleteResult::not_found())
        }
    }

    async fn get_pages_using_item(&self, content_item_id: &str) -> Result<Vec<Page>> {
        let rows = self
            .db
            .db_get_pages_using_item(content_item_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get pages using item: {}", e))?;

        Self::collect_pages(rows).await
    }

    async fn get_placement_counts(&self) -> Result<HashMap<String, i64>> {
        let mut rows = self
            .db
            .db_get_placement_counts()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get placement counts: {}", e))?;

        let mut counts = HashMap::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch row: {}", e))?
        {
            let content_item_id: String = row.get(0).context("Failed to get content_item_id")?;
            let count: i64 = row.get(1).context("Failed to get count")?;
            counts.insert(content_item_id, count);
        }

        Ok(counts)
    }

    async fn close(&self) -> Result<()> {
        self.db
            .db_close()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to close database: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> Result<(TursoStore, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        Ok((TursoStore::new(db), temp_dir))
    }

    #[tokio::test]
    async fn test_insert_root_pages_open_new_trees() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let first = Page::new("Home".to_string(), "home".to_string());
        let first = store.insert_page(first, InsertPosition::Root).await?;
        assert_eq!(first.left, 1);
        assert_eq!(first.right, 2);
        assert_eq!(first.level, 0);
        assert_eq!(first.tree_id, 1);
        assert_eq!(first.parent_id, None);

        let second = Page::new("About".to_string(), "about".to_string());
        let second = store.insert_page(second, InsertPosition::Root).await?;
        assert_eq!(second.tree_id, 2);
        assert_eq!(second.left, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_insert_children_extend_intervals() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = Page::new("Home".to_string(), "home".to_string());
        let root = store.insert_page(root, InsertPosition::Root).await?;

        let news = Page::new("News".to_string(), "news".to_string());
        let news = store
            .insert_page(news, InsertPosition::LastChildOf(root.id.clone()))
            .await?;
        assert_eq!((news.left, news.right), (2, 3));
        assert_eq!(news.level, 1);
        assert_eq!(news.parent_id, Some(root.id.clone()));

        let about = Page::new("About".to_string(), "about".to_string());
        let about = store
            .insert_page(about, InsertPosition::LastChildOf(root.id.clone()))
            .await?;
        assert_eq!((about.left, about.right), (4, 5));

        let root = store.get_page(&root.id).await?.expect("root exists");
        assert_eq!((root.left, root.right), (1, 6));

        Ok(())
    }

    #[tokio::test]
    async fn test_insert_before_sibling() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = Page::new("Home".to_string(), "home".to_string());
        let root = store.insert_page(root, InsertPosition::Root).await?;

        let a = Page::new("A".to_string(), "a".to_string());
        store
            .insert_page(a, InsertPosition::LastChildOf(root.id.clone()))
            .await?;
        let b = Page::new("B".to_string(), "b".to_string());
        let b = store
            .insert_page(b, InsertPosition::LastChildOf(root.id.clone()))
            .await?;

        let c = Page::new("C".to_string(), "c".to_string());
        let c = store
            .insert_page(c, InsertPosition::BeforeSibling(b.id.clone()))
            .await?;
        assert_eq!(c.parent_id, Some(root.id.clone()));

        let children = store.get_children(Some(&root.id)).await?;
        let titles: Vec<&str> = children.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C", "B"]);

        // Intervals stay contiguous after the shift
        assert_eq!((children[0].left, children[0].right), (2, 3));
        assert_eq!((children[1].left, children[1].right), (4, 5));
        assert_eq!((children[2].left, children[2].right), (6, 7));

        Ok(())
    }

    #[tokio::test]
    async fn test_insert_sibling_of_root_becomes_root() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let first = Page::new("First".to_string(), "first".to_string());
        let first = store.insert_page(first, InsertPosition::Root).await?;
        let second = Page::new("Second".to_string(), "second".to_string());
        let second = store.insert_page(second, InsertPosition::Root).await?;

        let between = Page::new("Between".to_string(), "between".to_string());
        let between = store
            .insert_page(between, InsertPosition::BeforeSibling(second.id.clone()))
            .await?;
        assert_eq!(between.parent_id, None);
        assert_eq!(between.level, 0);
        assert_eq!(between.tree_id, 2);

        let first = store.get_page(&first.id).await?.expect("first exists");
        let second = store.get_page(&second.id).await?.expect("second exists");
        assert_eq!(first.tree_id, 1);
        assert_eq!(second.tree_id, 3);

        let roots = store.get_children(None).await?;
        let titles: Vec<&str> = roots.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Between", "Second"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_move_subtree_into_other_tree() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let r1 = Page::new("R1".to_string(), "r1".to_string());
        let r1 = store.insert_page(r1, InsertPosition::Root).await?;
        let r2 = Page::new("R2".to_string(), "r2".to_string());
        let r2 = store.insert_page(r2, InsertPosition::Root).await?;

        let a = Page::new("A".to_string(), "a".to_string());
        let a = store
            .insert_page(a, InsertPosition::LastChildOf(r1.id.clone()))
            .await?;

        store
            .move_subtree(&a.id, &r2.id, MovePosition::InsideAsFirstChild)
            .await?;

        let a = store.get_page(&a.id).await?.expect("a exists");
        assert_eq!(a.tree_id, r2.tree_id);
        assert_eq!((a.left, a.right), (2, 3));
        assert_eq!(a.level, 1);
        assert_eq!(a.parent_id, Some(r2.id.clone()));

        // Source tree collapsed back to a leaf root
        let r1 = store.get_page(&r1.id).await?.expect("r1 exists");
        assert_eq!((r1.left, r1.right), (1, 2));

        let r2 = store.get_page(&r2.id).await?.expect("r2 exists");
        assert_eq!((r2.left, r2.right), (1, 4));

        Ok(())
    }

    #[tokio::test]
    async fn test_move_subtree_before_root_reroots() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let r1 = Page::new("R1".to_string(), "r1".to_string());
        let r1 = store.insert_page(r1, InsertPosition::Root).await?;
        let r2 = Page::new("R2".to_string(), "r2".to_string());
        let r2 = store.insert_page(r2, InsertPosition::Root).await?;

        let a = Page::new("A".to_string(), "a".to_string());
        let a = store
            .insert_page(a, InsertPosition::LastChildOf(r2.id.clone()))
            .await?;

        store.move_subtree(&a.id, &r1.id, MovePosition::Before).await?;

        let a = store.get_page(&a.id).await?.expect("a exists");
        assert_eq!(a.parent_id, None);
        assert_eq!(a.level, 0);
        assert_eq!((a.left, a.right), (1, 2));

        let roots = store.get_children(None).await?;
        let titles: Vec<&str> = roots.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "R1", "R2"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_subtree_closes_gap() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = Page::new("Home".to_string(), "home".to_string());
        let root = store.insert_page(root, InsertPosition::Root).await?;

        let news = Page::new("News".to_string(), "news".to_string());
        let news = store
            .insert_page(news, InsertPosition::LastChildOf(root.id.clone()))
            .await?;
        let item = Page::new("Item".to_string(), "item".to_string());
        store
            .insert_page(item, InsertPosition::LastChildOf(news.id.clone()))
            .await?;
        let about = Page::new("About".to_string(), "about".to_string());
        let about = store
            .insert_page(about, InsertPosition::LastChildOf(root.id.clone()))
            .await?;

        let news = store.get_page(&news.id).await?.expect("news exists");
        let removed = store.delete_subtree(&news).await?;
        assert_eq!(removed, 2);

        assert!(store.get_page(&news.id).await?.is_none());

        let root = store.get_page(&root.id).await?.expect("root exists");
        let about = store.get_page(&about.id).await?.expect("about exists");
        assert_eq!((root.left, root.right), (1, 4));
        assert_eq!((about.left, about.right), (2, 3));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_page_merges_fields() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let page = Page::new("Home".to_string(), "home".to_string());
        let page = store.insert_page(page, InsertPosition::Root).await?;

        let update = PageUpdate {
            title: Some("Start".to_string()),
            show_in_menu: Some(false),
            ..Default::default()
        };

        let updated = store.update_page(&page.id, update).await?;
        assert_eq!(updated.title, "Start");
        assert_eq!(updated.url, "home");
        assert!(!updated.show_in_menu);
        assert!(updated.is_public);

        Ok(())
    }

    #[tokio::test]
    async fn test_content_item_crud() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let item = ContentItem::new(
            "welcome".to_string(),
            "Hello *world*".to_string(),
            "<p>Hello <em>world</em></p>".to_string(),
        );

        let created = store.create_content_item(item.clone()).await?;
        assert_eq!(created.name, "welcome");
        assert!(created.used_on_pages.is_none());

        let update = ContentItemUpdate {
            content_markup: Some("Hi".to_string()),
            ..Default::default()
        };
        let updated = store.update_content_item(&created.id, update).await?;
        assert_eq!(updated.content_markup, "Hi");
        assert_eq!(updated.name, "welcome");

        let result = store.delete_content_item(&created.id).await?;
        assert!(result.existed);
        let result = store.delete_content_item(&created.id).await?;
        assert!(!result.existed);

        Ok(())
    }

    #[tokio::test]
    async fn test_placements_append_in_sort_order() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let page = Page::new("Home".to_string(), "home".to_string());
        let page = store.insert_page(page, InsertPosition::Root).await?;
        let item = ContentItem::new("a".to_string(), "a".to_string(), "<p>a</p>".to_string());
        let item = store.create_content_item(item).await?;

        let first = store
            .add_placement(PageContentItem::new(
                page.id.clone(),
                item.id.clone(),
                "main".to_string(),
            ))
            .await?;
        let second = store
            .add_placement(PageContentItem::new(
                page.id.clone(),
                item.id.clone(),
                "main".to_string(),
            ))
            .await?;
        assert_eq!(first.sort, 0);
        assert_eq!(second.sort, 1);

        // A different block starts its own sequence
        let side = store
            .add_placement(PageContentItem::new(
                page.id.clone(),
                item.id.clone(),
                "side".to_string(),
            ))
            .await?;
        assert_eq!(side.sort, 0);

        let main = store.get_block_placements(&page.id, "main").await?;
        assert_eq!(main.len(), 2);

        let counts = store.get_placement_counts().await?;
        assert_eq!(counts.get(&item.id), Some(&3));

        Ok(())
    }

    #[tokio::test]
    async fn test_used_on_pages_round_trip() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let item = ContentItem::new("a".to_string(), "a".to_string(), "<p>a</p>".to_string());
        let item = store.create_content_item(item).await?;

        let pages = vec![UsedOnPage {
            title: "Home".to_string(),
            url: "/home/".to_string(),
        }];
        store.set_used_on_pages(&item.id, &pages).await?;

        let fetched = store
            .get_content_item(&item.id)
            .await?
            .expect("item exists");
        let cached = fetched.used_on_pages.expect("cache filled");
        assert_eq!(cached[0]["url"], "/home/");

        Ok(())
    }
}
