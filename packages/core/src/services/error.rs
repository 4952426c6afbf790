//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations, providing
//! detailed error handling for business logic failures.

use crate::db::DatabaseError;
use crate::models::ValidationError;
use thiserror::Error;

/// Service operation errors
///
/// Provides high-level error types for all service operations,
/// with detailed context and proper error chaining.
#[derive(Error, Debug)]
pub enum FiberServiceError {
    /// Page not found by ID
    #[error("Page not found: {id}")]
    PageNotFound { id: String },

    /// Content item not found by ID
    #[error("Content item not found: {id}")]
    ContentItemNotFound { id: String },

    /// Placement not found by ID
    #[error("Placement not found: {id}")]
    PlacementNotFound { id: String },

    /// Requested move position would corrupt the tree
    #[error("Invalid position: {context}")]
    InvalidPosition { context: String },

    /// Quoted URL names a route the resolver does not know
    #[error("Unresolved named route: {name}")]
    UnresolvedNamedRoute { name: String },

    /// Interval invariant violation detected in stored tree data
    #[error("Structural consistency violation: {context}")]
    StructuralConsistency { context: String },

    /// Validation failed for a model
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Query execution error
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl FiberServiceError {
    /// Create a page not found error
    pub fn page_not_found(id: impl Into<String>) -> Self {
        Self::PageNotFound { id: id.into() }
    }

    /// Create a content item not found error
    pub fn content_item_not_found(id: impl Into<String>) -> Self {
        Self::ContentItemNotFound { id: id.into() }
    }

    /// Create a placement not found error
    pub fn placement_not_found(id: impl Into<String>) -> Self {
        Self::PlacementNotFound { id: id.into() }
    }

    /// Create an invalid position error
    pub fn invalid_position(context: impl Into<String>) -> Self {
        Self::InvalidPosition {
            context: context.into(),
        }
    }

    /// Create an unresolved named route error
    pub fn unresolved_named_route(name: impl Into<String>) -> Self {
        Self::UnresolvedNamedRoute { name: name.into() }
    }

    /// Create a structural consistency error
    pub fn structural_consistency(context: impl Into<String>) -> Self {
        Self::StructuralConsistency {
            context: context.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization_error(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a query failed error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }
}
