//! Placement Service - Block Ordering Engine
//!
//! Placements attach content items to named blocks of a page, in an explicit
//! order. This service owns every write to the `block_name` and `sort`
//! columns: adding to a block, moving within and across blocks, and removal.
//!
//! Ordering is managed with plain integers and full renumbering: after every
//! completed reorder, the `sort` values of each touched (page, block) pair
//! form a dense `0..N-1` run. The position arithmetic itself lives in
//! [`BlockOrderPlanner`]; this service wires it to the store and to the
//! used-on-pages read model.

use std::sync::Arc;

use crate::db::{BlockOrderPlanner, FiberStore};
use crate::models::{DeleteResult, PageContentItem};
use crate::services::content_service::ContentItemService;
use crate::services::error::FiberServiceError;
use crate::services::routes::NamedRouteResolver;

/// Service for placing content items into page blocks and ordering them
#[derive(Clone)]
pub struct PlacementService {
    /// Store for all persistence operations
    store: Arc<dyn FiberStore>,

    /// Content service for the used-on-pages read model
    content: ContentItemService,
}

impl PlacementService {
    /// Create a new PlacementService
    pub fn new(store: Arc<dyn FiberStore>, routes: Arc<dyn NamedRouteResolver>) -> Self {
        Self {
            store: store.clone(),
            content: ContentItemService::new(store, routes),
        }
    }

    /// Place a content item into a page block
    ///
    /// Without `before_id` the placement appends to the end of the block.
    /// With it, placements at or after the reference shift one position down
    /// and the new placement takes the reference's old position. A
    /// `before_id` that is not in the target block leaves the placement
    /// appended.
    ///
    /// The content item's used-on-pages read model is refreshed afterwards
    /// (best-effort).
    ///
    /// # Errors
    ///
    /// - `PageNotFound` when the page does not exist
    /// - `ContentItemNotFound` when the content item does not exist
    pub async fn add_to_page(
        &self,
        page_id: &str,
        content_item_id: &str,
        block_name: &str,
        before_id: Option<&str>,
    ) -> Result<PageContentItem, FiberServiceError> {
        self.store
            .get_page(page_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::page_not_found(page_id))?;
        self.store
            .get_content_item(content_item_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::content_item_not_found(content_item_id))?;

        let placement = PageContentItem::new(
            page_id.to_string(),
            content_item_id.to_string(),
            block_name.to_string(),
        );
        let mut created = self
            .store
            .add_placement(placement)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        if let Some(before_id) = before_id {
            let block = self
                .store
                .get_block_placements(page_id, block_name)
                .await
                .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
            let before = block
                .iter()
                .find(|p| p.id == before_id && p.id != created.id);

            match before {
                Some(before) => {
                    let target_sort = before.sort;
                    let mut updates: Vec<(String, i64)> = block
                        .iter()
                        .filter(|p| p.id != created.id && p.sort >= target_sort)
                        .map(|p| (p.id.clone(), p.sort + 1))
                        .collect();
                    updates.push((created.id.clone(), target_sort));

                    self.store
                        .apply_sort_updates(&updates)
                        .await
                        .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
                    created.sort = target_sort;
                }
                None => tracing::debug!(
                    "Placement {} is not in block '{}' of page {}; appending",
                    before_id,
                    block_name,
                    page_id
                ),
            }
        }

        tracing::info!(
            "Placed content item {} into block '{}' of page {} at sort {}",
            content_item_id,
            block_name,
            page_id,
            created.sort
        );

        if let Err(e) = self.content.refresh_used_on_pages(content_item_id).await {
            tracing::warn!(
                "Failed to refresh used-on-pages for item {}: {}",
                content_item_id,
                e
            );
        }
        Ok(created)
    }

    /// Move a placement within or across blocks of its page
    ///
    /// The destination block is the explicitly requested one, else the
    /// reference placement's block, else the current block. A block change
    /// is persisted before any reordering. The placement then slots in
    /// before the reference placement, or at the end of the block without
    /// one, and every touched block is renumbered to a dense `0..N-1` run
    /// in one batch (the source block too, when the move crossed blocks).
    ///
    /// When `before_id` names a placement that is not in the destination
    /// block, no reordering happens. A block change that was already
    /// persisted stands; the quiet skip covers the order only.
    ///
    /// # Errors
    ///
    /// Returns `PlacementNotFound` if the placement does not exist.
    pub async fn move_placement(
        &self,
        placement_id: &str,
        before_id: Option<&str>,
        block_name: Option<&str>,
    ) -> Result<PageContentItem, FiberServiceError> {
        let placement = self
            .store
            .get_placement(placement_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::placement_not_found(placement_id))?;

        let before = match before_id {
            Some(id) => self
                .store
                .get_placement(id)
                .await
                .map_err(|e| FiberServiceError::query_failed(e.to_string()))?,
            None => None,
        };

        let destination = BlockOrderPlanner::destination_block(
            &placement.block_name,
            before.as_ref().map(|b| b.block_name.as_str()),
            block_name,
        );
        let block_changed = destination != placement.block_name;
        if block_changed {
            self.store
                .set_placement_block(placement_id, &destination)
                .await
                .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
        }

        let others: Vec<PageContentItem> = self
            .store
            .get_block_placements(&placement.page_id, &destination)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .into_iter()
            .filter(|p| p.id != placement.id)
            .collect();
        let other_ids: Vec<String> = others.iter().map(|p| p.id.clone()).collect();

        match BlockOrderPlanner::plan_order(&other_ids, &placement.id, before_id) {
            None => tracing::debug!(
                "Placement {} is not in block '{}' of page {}; order left unchanged",
                before_id.unwrap_or("?"),
                destination,
                placement.page_id
            ),
            Some(order) => {
                let ordered: Vec<(String, i64)> = order
                    .into_iter()
                    .map(|id| {
                        let sort = if id == placement.id {
                            placement.sort
                        } else {
                            others
                                .iter()
                                .find(|p| p.id == id)
                                .map(|p| p.sort)
                                .unwrap_or_default()
                        };
                        (id, sort)
                    })
                    .collect();
                let mut updates = BlockOrderPlanner::dense_renumber(&ordered);

                if block_changed {
                    let source: Vec<(String, i64)> = self
                        .store
                        .get_block_placements(&placement.page_id, &placement.block_name)
                        .await
                        .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
                        .into_iter()
                        .map(|p| (p.id, p.sort))
                        .collect();
                    updates.extend(BlockOrderPlanner::dense_renumber(&source));
                }

                if !updates.is_empty() {
                    self.store
                        .apply_sort_updates(&updates)
                        .await
                        .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;
                }
            }
        }

        let moved = self
            .store
            .get_placement(placement_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| FiberServiceError::placement_not_found(placement_id))?;

        tracing::info!(
            "Moved placement {} to block '{}' of page {} at sort {}",
            moved.id,
            moved.block_name,
            moved.page_id,
            moved.sort
        );
        Ok(moved)
    }

    /// Remove a placement
    ///
    /// The content item's used-on-pages read model is refreshed afterwards
    /// (best-effort). Removing a non-existent placement succeeds with
    /// `existed = false`.
    pub async fn remove_placement(
        &self,
        placement_id: &str,
    ) -> Result<DeleteResult, FiberServiceError> {
        let placement = match self
            .store
            .get_placement(placement_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?
        {
            Some(placement) => placement,
            None => return Ok(DeleteResult::not_found()),
        };

        let result = self
            .store
            .delete_placement(placement_id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))?;

        tracing::info!(
            "Removed placement {} from block '{}' of page {}",
            placement_id,
            placement.block_name,
            placement.page_id
        );

        if let Err(e) = self
            .content
            .refresh_used_on_pages(&placement.content_item_id)
            .await
        {
            tracing::warn!(
                "Failed to refresh used-on-pages for item {}: {}",
                placement.content_item_id,
                e
            );
        }
        Ok(result)
    }

    /// Get a placement by ID
    pub async fn get_placement(
        &self,
        id: &str,
    ) -> Result<Option<PageContentItem>, FiberServiceError> {
        self.store
            .get_placement(id)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))
    }

    /// Placements of one (page, block) pair in sort order
    pub async fn get_content_for_block(
        &self,
        page_id: &str,
        block_name: &str,
    ) -> Result<Vec<PageContentItem>, FiberServiceError> {
        self.store
            .get_block_placements(page_id, block_name)
            .await
            .map_err(|e| FiberServiceError::query_failed(e.to_string()))
    }
}
