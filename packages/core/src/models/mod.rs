//! Data Models
//!
//! This module contains the core data structures used throughout Fiber:
//!
//! - `Page` - a node in the hierarchical page tree (nested-set encoded)
//! - `ContentItem` - a reusable block of content
//! - `PageContentItem` - a placement of a content item into a page's block
//!
//! Tree coordinates and placement sort keys are owned by the engines in
//! `services`; model methods only do pure field validation and interval
//! arithmetic.

mod content_item;
mod page;
mod placement;

pub use content_item::{ContentItem, ContentItemUpdate, UsedOnPage};
pub use page::{
    quoted_route_name, url_kind, DeleteResult, InsertPosition, MovePosition, Page, PageUpdate,
    UrlKind, ValidationError,
};
pub use placement::PageContentItem;
