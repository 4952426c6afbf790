//! Placement Data Structures
//!
//! A `PageContentItem` places one content item into one named block of one
//! page, at an explicit position. Within a (page, block) pair the `sort`
//! values always form a dense `0..N-1` sequence; the block ordering engine
//! owns them exclusively.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Association of a content item with a page's named block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContentItem {
    /// Unique identifier (UUID v4 string)
    pub id: String,

    /// The placing page
    pub page_id: String,

    /// The placed content item
    pub content_item_id: String,

    /// Named block on the page (e.g. "main", "side")
    pub block_name: String,

    /// Position within the (page, block) pair; dense, zero-based
    pub sort: i64,
}

impl PageContentItem {
    /// Create a new placement with an auto-generated UUID.
    ///
    /// `sort` starts at 0; the block ordering engine assigns the real
    /// position when the placement is persisted.
    pub fn new(page_id: String, content_item_id: String, block_name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            page_id,
            content_item_id,
            block_name,
            sort: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_placement() {
        let placement = PageContentItem::new(
            "page-1".to_string(),
            "item-1".to_string(),
            "main".to_string(),
        );

        assert!(!placement.id.is_empty());
        assert_eq!(placement.block_name, "main");
        assert_eq!(placement.sort, 0);
    }

    #[test]
    fn test_placement_serialization() {
        let placement = PageContentItem::new(
            "page-1".to_string(),
            "item-1".to_string(),
            "main".to_string(),
        );
        let json = serde_json::to_value(&placement).unwrap();

        assert_eq!(json["pageId"], "page-1");
        assert_eq!(json["contentItemId"], "item-1");
        assert_eq!(json["blockName"], "main");
    }
}
