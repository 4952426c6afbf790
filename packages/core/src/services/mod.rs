//! Business Services
//!
//! This module contains the core business logic services:
//!
//! - `PageService` - Page tree mutations, position queries, and URL resolution
//! - `ContentItemService` - Content CRUD, the URL rename cascade, and read models
//! - `PlacementService` - Block membership and explicit placement ordering
//!
//! Services coordinate between the database layer and application logic,
//! implementing business rules and orchestrating complex operations. The
//! editor configuration and the named-route resolver are passed in
//! explicitly; nothing here reads process-wide state.

pub mod content_service;
pub mod editor;
pub mod error;
pub mod page_service;
pub mod placement_service;
pub mod routes;
pub mod urls;

pub use content_service::{ContentGroup, ContentGroupEntry, ContentItemService, RenameOutcome};
pub use editor::{EditorConfig, MarkupRenderer, RenameUrlExpressions};
pub use error::FiberServiceError;
pub use page_service::{AncestorCache, CreatePageParams, PageService};
pub use placement_service::PlacementService;
pub use routes::{NamedRouteResolver, StaticRouteResolver};
pub use urls::derive_absolute_url;
