//! Fiber Core Business Logic Layer
//!
//! This crate provides the page tree, content, and block ordering engines
//! for the Fiber content management core.
//!
//! # Architecture
//!
//! - **Nested-set hierarchy**: pages carry `left`/`right` interval bounds,
//!   a `tree_id` and a `level`; ancestry is pure interval containment
//! - **Derived URLs**: a page's absolute URL is computed from its ancestor
//!   chain, with rename cascades rewriting stored content on change
//! - **Explicit ordering**: block placements hold dense integer sort runs
//! - **libsql/Turso**: Embedded SQLite-compatible database with transactional
//!   structural mutations
//!
//! # Modules
//!
//! - [`models`] - Data structures (Page, ContentItem, PageContentItem)
//! - [`services`] - Business services (PageService, ContentItemService, PlacementService)
//! - [`db`] - Database layer with libsql integration
//! - [`utils`] - Markup rendering and stripping helpers

pub mod models;
pub mod services;
pub mod db;
pub mod utils;

// Re-export commonly used types
pub use models::*;
pub use services::*;
