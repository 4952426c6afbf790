//! Database Layer
//!
//! This module handles all database interactions using libsql/Turso:
//!
//! - Database initialization and connection management
//! - Nested-set storage for the page hierarchy (`lft`/`rght` intervals)
//! - Content items and their block placements
//! - Transactional structural mutations (insert, move, delete)
//!
//! # Architecture
//!
//! The layer is split three ways:
//!
//! - [`DatabaseService`]: owns the connection, the schema, and every SQL
//!   statement including the transactional interval arithmetic
//! - [`FiberStore`]: the trait the services program against
//! - [`TursoStore`]: thin conversion layer between rows and models
//!
//! The pure calculators ([`nested_set`], [`block_order`]) hold the position
//! arithmetic with no database dependency, so the splice and renumber logic
//! is unit-testable in isolation.

pub mod block_order;
mod database;
mod error;
mod fiber_store;
pub mod nested_set;
mod turso_store;

pub use block_order::BlockOrderPlanner;
pub use database::{
    DatabaseService, DbInsertContentItemParams, DbInsertPageParams, DbInsertPlacementParams,
    DbUpdateContentItemParams, DbUpdatePageParams,
};
pub use error::DatabaseError;
pub use fiber_store::FiberStore;
pub use nested_set::{NestedSetCalculator, SplicePoint};
pub use turso_store::TursoStore;
