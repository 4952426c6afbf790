//! Database Connection Management
//!
//! This module provides the core database connection and initialization
//! functionality using libsql/Turso for the Fiber page tree and content
//! store.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **Nested-set schema**: The page hierarchy is stored as preorder
//!   intervals (`lft`/`rght`) plus `tree_id` and `level`, so ancestor and
//!   descendant queries are single range scans
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Foreign keys**: Enabled for referential integrity
//!
//! # Database Connection Patterns
//!
//! ## Async contexts (Tokio runtime)
//!
//! **ALWAYS use `connect_with_timeout()` in async functions** to avoid SQLite
//! thread-safety violations when the Tokio runtime moves futures between
//! threads.
//!
//! The 5-second busy timeout allows concurrent operations to wait and retry
//! instead of failing immediately with `SQLITE_BUSY` errors.
//!
//! ```no_run
//! # use fiber_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let db_service = DatabaseService::new(PathBuf::from(":memory:")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Synchronous contexts
//!
//! Use `connect()` only in single-threaded, synchronous contexts where the
//! connection will not be used across await points.
//!
//! # Structural mutations
//!
//! Inserting, moving, and deleting pages are multi-statement range updates
//! over `lft`/`rght`. Each of these runs inside an explicit transaction;
//! a failure at any step rolls the whole mutation back so the intervals
//! never end up partially shifted.

use crate::db::error::DatabaseError;
use crate::db::nested_set::NestedSetCalculator;
use crate::models::{InsertPosition, MovePosition};
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service for managing libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use fiber_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/fiber.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database connection (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

/// Parameters for page insertion (avoids too-many-arguments lint)
///
/// Tree coordinates are not part of the params: the insert operations
/// compute `lft`/`rght`/`tree_id`/`level`/`parent_id` from the requested
/// position.
pub struct DbInsertPageParams<'a> {
    pub id: &'a str,
    pub redirect_page_id: Option<&'a str>,
    pub title: &'a str,
    pub url: &'a str,
    pub show_in_menu: bool,
    pub is_public: bool,
    pub metadata: &'a str,
}

/// Parameters for page field updates
///
/// Tree coordinates are owned by the tree operations and never written here.
pub struct DbUpdatePageParams<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub url: &'a str,
    pub redirect_page_id: Option<&'a str>,
    pub show_in_menu: bool,
    pub is_public: bool,
    pub metadata: &'a str,
}

/// Parameters for content item insertion
pub struct DbInsertContentItemParams<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub content_markup: &'a str,
    pub content_html: &'a str,
    pub used_on_pages: Option<&'a str>,
    pub metadata: &'a str,
}

/// Parameters for content item updates
pub struct DbUpdateContentItemParams<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub content_markup: &'a str,
    pub content_html: &'a str,
    pub metadata: &'a str,
}

/// Parameters for placement insertion
pub struct DbInsertPlacementParams<'a> {
    pub id: &'a str,
    pub page_id: &'a str,
    pub content_item_id: &'a str,
    pub block_name: &'a str,
}

/// Tree coordinates of a single page row, read inside a transaction
struct TreeCoords {
    left: i64,
    right: i64,
    tree_id: i64,
    level: i64,
    parent_id: Option<String>,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable SQLite features (WAL mode, foreign keys)
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the database file
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        // Check if database file already exists (before we open it)
        // so schema initialization only checkpoints new databases
        let is_new_database = !db_path.exists();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        // Open database connection using Builder pattern
        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of
    /// execute(). This helper method encapsulates that pattern.
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Creates tables and indexes using CREATE TABLE IF NOT EXISTS,
    /// ensuring idempotent initialization (safe to call multiple times).
    ///
    /// # Arguments
    ///
    /// * `is_new_database` - Whether this is a newly created database file.
    ///   If true, performs a WAL checkpoint to flush schema to disk (prevents
    ///   race conditions in tests). If false, skips checkpoint for performance.
    ///
    /// # Schema
    ///
    /// - `pages`: nested-set page hierarchy (`lft`/`rght`/`tree_id`/`level`)
    /// - `content_items`: reusable content with markup and rendered HTML
    /// - `page_content_items`: placements binding a content item to a named
    ///   block on a page, ordered by `sort`
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        // Enable WAL mode for better concurrency
        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        // Set busy timeout to 5 seconds (5000ms) so concurrent operations
        // wait instead of failing immediately on lock
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        // Enable foreign key constraints
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        // Column names lft/rght sidestep the LEFT/RIGHT SQL keywords
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pages (
                id TEXT PRIMARY KEY,
                parent_id TEXT,
                redirect_page_id TEXT,
                title TEXT NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                lft INTEGER NOT NULL,
                rght INTEGER NOT NULL,
                tree_id INTEGER NOT NULL,
                level INTEGER NOT NULL,
                show_in_menu BOOLEAN NOT NULL DEFAULT TRUE,
                is_public BOOLEAN NOT NULL DEFAULT TRUE,
                metadata JSON NOT NULL DEFAULT '{}',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (parent_id) REFERENCES pages(id) ON DELETE CASCADE,
                FOREIGN KEY (redirect_page_id) REFERENCES pages(id) ON DELETE SET NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create pages table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS content_items (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                content_markup TEXT NOT NULL DEFAULT '',
                content_html TEXT NOT NULL DEFAULT '',
                used_on_pages JSON,
                metadata JSON NOT NULL DEFAULT '{}',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create content_items table: {}",
                e
            ))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS page_content_items (
                id TEXT PRIMARY KEY,
                page_id TEXT NOT NULL,
                content_item_id TEXT NOT NULL,
                block_name TEXT NOT NULL,
                sort INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
                FOREIGN KEY (content_item_id) REFERENCES content_items(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create page_content_items table: {}",
                e
            ))
        })?;

        self.create_core_indexes(&conn).await?;

        // Force WAL checkpoint only for newly created databases. This
        // prevents race conditions where rapid database swaps in tests
        // cause "no such table" errors due to WAL entries not being flushed.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create core indexes
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        // Composite index on (tree_id, lft): every range shift and every
        // ordered tree read filters on these two columns
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pages_tree ON pages(tree_id, lft)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create index 'idx_pages_tree': {}",
                e
            ))
        })?;

        // Index on parent_id (children queries)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pages_parent ON pages(parent_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create index 'idx_pages_parent': {}",
                e
            ))
        })?;

        // Index on url (absolute-URL lookups)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create index 'idx_pages_url': {}",
                e
            ))
        })?;

        // Composite index on (page_id, block_name, sort): block reads come
        // back in sort order directly from the index
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_placements_block
             ON page_content_items(page_id, block_name, sort)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create index 'idx_placements_block': {}",
                e
            ))
        })?;

        // Index on content_item_id (usage queries)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_placements_item
             ON page_content_items(content_item_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create index 'idx_placements_item': {}",
                e
            ))
        })?;

        Ok(())
    }

    /// Get a synchronous connection to the database
    ///
    /// Only use this in synchronous, single-threaded contexts. In async
    /// functions use `connect_with_timeout()` instead to avoid SQLite
    /// thread-safety violations.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    ///
    /// This is the safe default for async contexts. The 5-second busy
    /// timeout makes concurrent operations wait and retry instead of
    /// failing immediately when the database is locked, which matters when
    /// the Tokio runtime moves futures between threads at `.await` points.
    ///
    /// Foreign keys are re-enabled here because the pragma is per-connection
    /// in SQLite; placement cleanup on page deletion relies on it.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    /// Read the tree coordinates of one page within the current transaction
    async fn tree_coords(
        conn: &libsql::Connection,
        id: &str,
    ) -> Result<Option<TreeCoords>, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT lft, rght, tree_id, level, parent_id FROM pages WHERE id = ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare coords query: {}", e))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute coords query: {}", e))
        })?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => Ok(Some(TreeCoords {
                left: row
                    .get(0)
                    .map_err(|e| DatabaseError::sql_execution(e.to_string()))?,
                right: row
                    .get(1)
                    .map_err(|e| DatabaseError::sql_execution(e.to_string()))?,
                tree_id: row
                    .get(2)
                    .map_err(|e| DatabaseError::sql_execution(e.to_string()))?,
                level: row
                    .get(3)
                    .map_err(|e| DatabaseError::sql_execution(e.to_string()))?,
                parent_id: row
                    .get(4)
                    .map_err(|e| DatabaseError::sql_execution(e.to_string()))?,
            })),
            None => Ok(None),
        }
    }

    /// Insert one page row with explicit tree coordinates
    async fn insert_page_row(
        conn: &libsql::Connection,
        params: &DbInsertPageParams<'_>,
        parent_id: Option<&str>,
        left: i64,
        right: i64,
        tree_id: i64,
        level: i64,
    ) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT INTO pages (id, parent_id, redirect_page_id, title, url,
                                lft, rght, tree_id, level, show_in_menu, is_public, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                params.id,
                parent_id,
                params.redirect_page_id,
                params.title,
                params.url,
                left,
                right,
                tree_id,
                level,
                params.show_in_menu as i64,
                params.is_public as i64,
                params.metadata,
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert page: {}", e)))?;

        Ok(())
    }

    //
    // PAGE TREE OPERATIONS
    //

    /// Insert a new root page at the end of the tree sequence
    ///
    /// The new page opens a fresh tree: `lft = 1`, `rght = 2`, `level = 0`,
    /// `tree_id` one past the current maximum. Single INSERT, so no explicit
    /// transaction is needed.
    pub async fn db_insert_root_page(
        &self,
        params: DbInsertPageParams<'_>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "INSERT INTO pages (id, parent_id, redirect_page_id, title, url,
                                lft, rght, tree_id, level, show_in_menu, is_public, metadata)
             VALUES (?, NULL, ?, ?, ?, 1, 2,
                     (SELECT COALESCE(MAX(tree_id), 0) + 1 FROM pages), 0, ?, ?, ?)",
            (
                params.id,
                params.redirect_page_id,
                params.title,
                params.url,
                params.show_in_menu as i64,
                params.is_public as i64,
                params.metadata,
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert root page: {}", e)))?;

        Ok(())
    }

    /// Insert a new leaf page relative to an anchor page
    ///
    /// Opens a two-slot gap at the splice point (every coordinate in the
    /// anchor's tree at or past the splice point shifts by +2) and places
    /// the new page in it. Sibling placement next to a root instead claims
    /// a slot in the `tree_id` sequence, making the new page a root of its
    /// own tree.
    ///
    /// The anchor is read inside the transaction; the whole mutation is
    /// atomic.
    pub async fn db_insert_page_anchored(
        &self,
        params: DbInsertPageParams<'_>,
        anchor_id: &str,
        position: &InsertPosition,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN TRANSACTION", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        if let Err(e) = Self::insert_anchored_tx(&conn, &params, anchor_id, position).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(e);
        }

        conn.execute("COMMIT", ()).await.map_err(|e| {
            std::mem::drop(conn.execute("ROLLBACK", ()));
            DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }

    async fn insert_anchored_tx(
        conn: &libsql::Connection,
        params: &DbInsertPageParams<'_>,
        anchor_id: &str,
        position: &InsertPosition,
    ) -> Result<(), DatabaseError> {
        let anchor = Self::tree_coords(conn, anchor_id).await?.ok_or_else(|| {
            DatabaseError::sql_execution(format!("Anchor page not found: {}", anchor_id))
        })?;

        // Sibling placement next to a root claims a tree slot instead of
        // an interval slot
        if anchor.parent_id.is_none() {
            if let Some(slot) = NestedSetCalculator::insert_root_slot(anchor.tree_id, position) {
                conn.execute(
                    "UPDATE pages SET tree_id = tree_id + 1 WHERE tree_id >= ?",
                    [slot],
                )
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to shift tree sequence: {}", e))
                })?;

                return Self::insert_page_row(conn, params, None, 1, 2, slot, 0).await;
            }
        }

        let splice =
            NestedSetCalculator::insert_point(anchor.left, anchor.right, anchor.level, position)
                .ok_or_else(|| {
                    DatabaseError::sql_execution("Root placement does not take an anchor")
                })?;

        let parent_id = match position {
            InsertPosition::FirstChildOf(_) | InsertPosition::LastChildOf(_) => {
                Some(anchor_id.to_string())
            }
            InsertPosition::BeforeSibling(_) | InsertPosition::AfterSibling(_) => {
                anchor.parent_id.clone()
            }
            InsertPosition::Root => None,
        };

        // Open a two-slot gap at the splice point
        conn.execute(
            "UPDATE pages SET lft = lft + 2 WHERE tree_id = ? AND lft >= ?",
            (anchor.tree_id, splice.left),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to open gap: {}", e)))?;

        conn.execute(
            "UPDATE pages SET rght = rght + 2 WHERE tree_id = ? AND rght >= ?",
            (anchor.tree_id, splice.left),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to open gap: {}", e)))?;

        Self::insert_page_row(
            conn,
            params,
            parent_id.as_deref(),
            splice.left,
            splice.left + 1,
            anchor.tree_id,
            splice.level,
        )
        .await
    }

    /// Move a subtree to a new position relative to a target page
    ///
    /// Four-phase nested-set relocation:
    /// 1. Park the subtree by negating its coordinates
    /// 2. Close the gap it left in the source tree
    /// 3. Re-read the target and open a gap at the destination (for a
    ///    same-tree move the gap close has shifted the target, so the
    ///    re-read must happen inside this transaction)
    /// 4. Land the parked rows with a constant offset, rewriting `tree_id`
    ///    and the `level` delta for the whole subtree
    ///
    /// Moving before/after a root-level target instead lands the subtree as
    /// a standalone tree in the root sequence.
    ///
    /// Cycle prevention (target inside the moved subtree) is the caller's
    /// job; this method assumes the move is structurally legal.
    pub async fn db_move_subtree(
        &self,
        page_id: &str,
        target_id: &str,
        position: MovePosition,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN TRANSACTION", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        if let Err(e) = Self::move_subtree_tx(&conn, page_id, target_id, position).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(e);
        }

        conn.execute("COMMIT", ()).await.map_err(|e| {
            std::mem::drop(conn.execute("ROLLBACK", ()));
            DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }

    async fn move_subtree_tx(
        conn: &libsql::Connection,
        page_id: &str,
        target_id: &str,
        position: MovePosition,
    ) -> Result<(), DatabaseError> {
        let moved = Self::tree_coords(conn, page_id)
            .await?
            .ok_or_else(|| DatabaseError::sql_execution(format!("Page not found: {}", page_id)))?;

        let width = NestedSetCalculator::subtree_width(moved.left, moved.right);

        // Park the subtree. Negated coordinates keep it out of every later
        // range update until it lands.
        conn.execute(
            "UPDATE pages SET lft = -lft, rght = -rght
             WHERE tree_id = ? AND lft >= ? AND rght <= ?",
            (moved.tree_id, moved.left, moved.right),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to detach subtree: {}", e)))?;

        // Close the gap the subtree left behind
        conn.execute(
            "UPDATE pages SET lft = lft - ? WHERE tree_id = ? AND lft > ?",
            (width, moved.tree_id, moved.right),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to close source gap: {}", e)))?;

        conn.execute(
            "UPDATE pages SET rght = rght - ? WHERE tree_id = ? AND rght > ?",
            (width, moved.tree_id, moved.right),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to close source gap: {}", e)))?;

        // Fresh target coordinates; the gap close may have shifted them
        let target = Self::tree_coords(conn, target_id).await?.ok_or_else(|| {
            DatabaseError::sql_execution(format!("Page not found: {}", target_id))
        })?;

        // Before/after a root lands the subtree as its own tree
        if target.parent_id.is_none() {
            if let Some(slot) = NestedSetCalculator::move_root_slot(target.tree_id, position) {
                return Self::land_as_root_tx(conn, page_id, &moved, slot).await;
            }
        }

        let splice =
            NestedSetCalculator::move_point(target.left, target.right, target.level, position);
        let new_parent = match position {
            MovePosition::Before | MovePosition::After => target.parent_id.clone(),
            MovePosition::InsideAsFirstChild => Some(target_id.to_string()),
        };

        // Open the destination gap; parked rows are negative and stay put
        conn.execute(
            "UPDATE pages SET lft = lft + ? WHERE tree_id = ? AND lft >= ?",
            (width, target.tree_id, splice.left),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to open destination gap: {}", e))
        })?;

        conn.execute(
            "UPDATE pages SET rght = rght + ? WHERE tree_id = ? AND rght >= ?",
            (width, target.tree_id, splice.left),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to open destination gap: {}", e))
        })?;

        // Land the parked subtree: one constant offset restores the internal
        // structure, tree_id and the level delta apply to every row
        let offset = NestedSetCalculator::landing_offset(splice.left, moved.left);
        let level_delta = splice.level - moved.level;
        conn.execute(
            "UPDATE pages SET lft = -lft + ?, rght = -rght + ?, tree_id = ?, level = level + ?
             WHERE tree_id = ? AND lft < 0",
            (offset, offset, target.tree_id, level_delta, moved.tree_id),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to land subtree: {}", e)))?;

        conn.execute(
            "UPDATE pages SET parent_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            (new_parent, page_id),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to reattach page: {}", e)))?;

        Ok(())
    }

    /// Land a parked subtree as a standalone tree occupying `slot` in the
    /// root sequence
    async fn land_as_root_tx(
        conn: &libsql::Connection,
        page_id: &str,
        moved: &TreeCoords,
        slot: i64,
    ) -> Result<(), DatabaseError> {
        // Make room in the tree sequence. Parked rows are excluded via
        // lft > 0; they keep the old tree_id until they land.
        conn.execute(
            "UPDATE pages SET tree_id = tree_id + 1 WHERE tree_id >= ? AND lft > 0",
            [slot],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to shift tree sequence: {}", e))
        })?;

        let offset = NestedSetCalculator::landing_offset(1, moved.left);
        conn.execute(
            "UPDATE pages SET lft = -lft + ?, rght = -rght + ?, tree_id = ?, level = level - ?
             WHERE tree_id = ? AND lft < 0",
            (offset, offset, slot, moved.level, moved.tree_id),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to land subtree: {}", e)))?;

        conn.execute(
            "UPDATE pages SET parent_id = NULL, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            [page_id],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to reattach page: {}", e)))?;

        Ok(())
    }

    /// Delete a subtree and close the gap it leaves
    ///
    /// Removes every page in the closed interval `[left, right]` of the
    /// tree, then pulls every later coordinate back by the subtree width.
    /// Placements on removed pages go with them via ON DELETE CASCADE.
    ///
    /// # Returns
    ///
    /// Number of pages removed
    pub async fn db_delete_subtree(
        &self,
        tree_id: i64,
        left: i64,
        right: i64,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN TRANSACTION", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        let removed = match Self::delete_subtree_tx(&conn, tree_id, left, right).await {
            Ok(removed) => removed,
            Err(e) => {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(e);
            }
        };

        conn.execute("COMMIT", ()).await.map_err(|e| {
            std::mem::drop(conn.execute("ROLLBACK", ()));
            DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(removed)
    }

    async fn delete_subtree_tx(
        conn: &libsql::Connection,
        tree_id: i64,
        left: i64,
        right: i64,
    ) -> Result<u64, DatabaseError> {
        let width = NestedSetCalculator::subtree_width(left, right);

        // Count before deleting: the parent_id cascade can claim descendant
        // rows ahead of the statement, which would skew its change count
        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM pages WHERE tree_id = ? AND lft >= ? AND rght <= ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare subtree count: {}", e))
            })?;
        let mut rows = stmt
            .query((tree_id, left, right))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to count subtree: {}", e))
            })?;
        let removed: i64 = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => row
                .get(0)
                .map_err(|e| DatabaseError::sql_execution(e.to_string()))?,
            None => 0,
        };

        conn.execute(
            "DELETE FROM pages WHERE tree_id = ? AND lft >= ? AND rght <= ?",
            (tree_id, left, right),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete subtree: {}", e)))?;

        conn.execute(
            "UPDATE pages SET lft = lft - ? WHERE tree_id = ? AND lft > ?",
            (width, tree_id, right),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to close gap: {}", e)))?;

        conn.execute(
            "UPDATE pages SET rght = rght - ? WHERE tree_id = ? AND rght > ?",
            (width, tree_id, right),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to close gap: {}", e)))?;

        Ok(removed as u64)
    }

    /// Update a page's own fields (title, url, redirect, visibility, metadata)
    pub async fn db_update_page(
        &self,
        params: DbUpdatePageParams<'_>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE pages SET title = ?, url = ?, redirect_page_id = ?, show_in_menu = ?,
                              is_public = ?, metadata = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            (
                params.title,
                params.url,
                params.redirect_page_id,
                params.show_in_menu as i64,
                params.is_public as i64,
                params.metadata,
                params.id,
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to update page: {}", e)))?;

        Ok(())
    }

    //
    // PAGE QUERIES
    //

    /// Retrieve a single page by ID
    pub async fn db_get_page(&self, id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                        show_in_menu, is_public, metadata, created_at, updated_at
                 FROM pages WHERE id = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare get_page query: {}", e))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_page query: {}", e))
        })?;

        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    /// Pages whose stored url field matches exactly
    pub async fn db_get_pages_by_url(&self, url: &str) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                        show_in_menu, is_public, metadata, created_at, updated_at
                 FROM pages WHERE url = ? ORDER BY tree_id, lft",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare url query: {}", e))
            })?;

        stmt.query([url]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute url query: {}", e))
        })
    }

    /// Pages with a non-empty url field containing the fragment
    ///
    /// Candidate pool for URL resolution: pages whose raw url field mentions
    /// the last path segment of a requested URL. LIKE wildcards in the
    /// fragment are escaped so they match literally.
    pub async fn db_get_pages_by_url_fragment(
        &self,
        fragment: &str,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let escaped = fragment
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{}%", escaped);

        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                        show_in_menu, is_public, metadata, created_at, updated_at
                 FROM pages WHERE url != '' AND url LIKE ? ESCAPE '\\'
                 ORDER BY tree_id, lft",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to prepare url fragment query: {}",
                    e
                ))
            })?;

        stmt.query([pattern]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute url fragment query: {}", e))
        })
    }

    /// Pages whose url field is a quoted named-route reference
    pub async fn db_get_quoted_url_pages(&self) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                        show_in_menu, is_public, metadata, created_at, updated_at
                 FROM pages WHERE url LIKE '\"%\"' ORDER BY tree_id, lft",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare quoted url query: {}", e))
            })?;

        stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute quoted url query: {}", e))
        })
    }

    /// Ancestors of the interval `[left, right]`, ordered root to parent
    pub async fn db_get_ancestors(
        &self,
        tree_id: i64,
        left: i64,
        right: i64,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                        show_in_menu, is_public, metadata, created_at, updated_at
                 FROM pages WHERE tree_id = ? AND lft < ? AND rght > ? ORDER BY lft ASC",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare ancestors query: {}", e))
            })?;

        stmt.query((tree_id, left, right)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute ancestors query: {}", e))
        })
    }

    /// Descendants of the interval `[left, right]` in preorder, optionally
    /// bounded by absolute level
    pub async fn db_get_descendants(
        &self,
        tree_id: i64,
        left: i64,
        right: i64,
        max_level: Option<i64>,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        if let Some(max_level) = max_level {
            let mut stmt = conn
                .prepare(
                    "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                            show_in_menu, is_public, metadata, created_at, updated_at
                     FROM pages
                     WHERE tree_id = ? AND lft > ? AND rght < ? AND level <= ?
                     ORDER BY lft ASC",
                )
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to prepare descendants query: {}",
                        e
                    ))
                })?;

            stmt.query((tree_id, left, right, max_level))
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to execute descendants query: {}",
                        e
                    ))
                })
        } else {
            let mut stmt = conn
                .prepare(
                    "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                            show_in_menu, is_public, metadata, created_at, updated_at
                     FROM pages
                     WHERE tree_id = ? AND lft > ? AND rght < ?
                     ORDER BY lft ASC",
                )
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to prepare descendants query: {}",
                        e
                    ))
                })?;

            stmt.query((tree_id, left, right)).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute descendants query: {}", e))
            })
        }
    }

    /// Direct children of a page, ordered by position
    pub async fn db_get_children(&self, parent_id: &str) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                        show_in_menu, is_public, metadata, created_at, updated_at
                 FROM pages WHERE parent_id = ? ORDER BY lft ASC",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare children query: {}", e))
            })?;

        stmt.query([parent_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute children query: {}", e))
        })
    }

    /// Root pages in tree order
    pub async fn db_get_root_pages(&self) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                        show_in_menu, is_public, metadata, created_at, updated_at
                 FROM pages WHERE parent_id IS NULL ORDER BY tree_id ASC",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare roots query: {}", e))
            })?;

        stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute roots query: {}", e))
        })
    }

    /// Every page of one tree in preorder
    pub async fn db_get_tree_pages(&self, tree_id: i64) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                        show_in_menu, is_public, metadata, created_at, updated_at
                 FROM pages WHERE tree_id = ? ORDER BY lft ASC",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare tree query: {}", e))
            })?;

        stmt.query([tree_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute tree query: {}", e))
        })
    }

    /// Distinct tree ids in sequence order
    pub async fn db_get_tree_ids(&self) -> Result<Vec<i64>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT tree_id FROM pages ORDER BY tree_id ASC")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare tree_ids query: {}", e))
            })?;

        let mut rows = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute tree_ids query: {}", e))
        })?;

        let mut tree_ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            let tree_id: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
            tree_ids.push(tree_id);
        }

        Ok(tree_ids)
    }

    /// Menu-visible public pages of one tree within a level band
    pub async fn db_get_shown_pages(
        &self,
        tree_id: i64,
        min_level: i64,
        max_level: i64,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, redirect_page_id, title, url, lft, rght, tree_id, level,
                        show_in_menu, is_public, metadata, created_at, updated_at
                 FROM pages
                 WHERE tree_id = ? AND level >= ? AND level <= ?
                   AND show_in_menu = 1 AND is_public = 1
                 ORDER BY lft ASC",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare shown_pages query: {}", e))
            })?;

        stmt.query((tree_id, min_level, max_level))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute shown_pages query: {}", e))
            })
    }

    //
    // CONTENT ITEM OPERATIONS
    //

    /// Insert a content item
    pub async fn db_insert_content_item(
        &self,
        params: DbInsertContentItemParams<'_>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "INSERT INTO content_items (id, name, content_markup, content_html,
                                        used_on_pages, metadata)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                params.id,
                params.name,
                params.content_markup,
                params.content_html,
                params.used_on_pages,
                params.metadata,
            ),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to insert content item: {}", e))
        })?;

        Ok(())
    }

    /// Retrieve a single content item by ID
    pub async fn db_get_content_item(
        &self,
        id: &str,
    ) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, name, content_markup, content_html, used_on_pages, metadata,
                        created_at, updated_at
                 FROM content_items WHERE id = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to prepare get_content_item query: {}",
                    e
                ))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_content_item query: {}", e))
        })?;

        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    /// All content items, ordered by name
    pub async fn db_get_all_content_items(&self) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, name, content_markup, content_html, used_on_pages, metadata,
                        created_at, updated_at
                 FROM content_items ORDER BY name ASC, created_at ASC",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to prepare content_items query: {}",
                    e
                ))
            })?;

        stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute content_items query: {}", e))
        })
    }

    /// Update a content item's editable fields
    pub async fn db_update_content_item(
        &self,
        params: DbUpdateContentItemParams<'_>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE content_items SET name = ?, content_markup = ?, content_html = ?,
                                      metadata = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            (
                params.name,
                params.content_markup,
                params.content_html,
                params.metadata,
                params.id,
            ),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to update content item: {}", e))
        })?;

        Ok(())
    }

    /// Write the denormalized used-on-pages cache
    ///
    /// Leaves updated_at alone: a cache refresh is not a content edit.
    pub async fn db_set_used_on_pages(
        &self,
        id: &str,
        used_on_pages: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE content_items SET used_on_pages = ? WHERE id = ?",
            (used_on_pages, id),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to update used_on_pages: {}", e))
        })?;

        Ok(())
    }

    /// Delete a content item
    ///
    /// # Returns
    ///
    /// Number of rows affected (0 = item didn't exist)
    pub async fn db_delete_content_item(&self, id: &str) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let rows_affected = conn
            .execute("DELETE FROM content_items WHERE id = ?", [id])
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to delete content item: {}", e))
            })?;

        Ok(rows_affected)
    }

    //
    // PLACEMENT OPERATIONS
    //

    /// Insert a placement at the end of its block
    ///
    /// The new row takes sort one past the block's current maximum; the
    /// subquery keeps the append atomic.
    pub async fn db_insert_placement(
        &self,
        params: DbInsertPlacementParams<'_>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "INSERT INTO page_content_items (id, page_id, content_item_id, block_name, sort)
             VALUES (?, ?, ?, ?,
                     (SELECT COALESCE(MAX(sort), -1) + 1 FROM page_content_items
                      WHERE page_id = ? AND block_name = ?))",
            (
                params.id,
                params.page_id,
                params.content_item_id,
                params.block_name,
                params.page_id,
                params.block_name,
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert placement: {}", e)))?;

        Ok(())
    }

    /// Retrieve a single placement by ID
    pub async fn db_get_placement(&self, id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, page_id, content_item_id, block_name, sort
                 FROM page_content_items WHERE id = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to prepare get_placement query: {}",
                    e
                ))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_placement query: {}", e))
        })?;

        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    /// Placements of one (page, block) pair in sort order
    pub async fn db_get_block_placements(
        &self,
        page_id: &str,
        block_name: &str,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, page_id, content_item_id, block_name, sort
                 FROM page_content_items
                 WHERE page_id = ? AND block_name = ?
                 ORDER BY sort ASC, id ASC",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare block query: {}", e))
            })?;

        stmt.query((page_id, block_name)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute block query: {}", e))
        })
    }

    /// Every placement on one page across all blocks
    pub async fn db_get_page_placements(
        &self,
        page_id: &str,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, page_id, content_item_id, block_name, sort
                 FROM page_content_items
                 WHERE page_id = ?
                 ORDER BY block_name ASC, sort ASC",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to prepare page placements query: {}",
                    e
                ))
            })?;

        stmt.query([page_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute page placements query: {}", e))
        })
    }

    /// Persist a placement's block change (sort untouched; reordering is a
    /// separate step)
    pub async fn db_update_placement_block(
        &self,
        id: &str,
        block_name: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE page_content_items SET block_name = ? WHERE id = ?",
            (block_name, id),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to update placement block: {}", e))
        })?;

        Ok(())
    }

    /// Apply a batch of placement sort updates in one transaction
    ///
    /// The renumber of a block (or of the source and destination blocks of
    /// a cross-block move) either lands completely or not at all.
    pub async fn db_apply_sort_updates(
        &self,
        updates: &[(String, i64)],
    ) -> Result<(), DatabaseError> {
        if updates.is_empty() {
            return Ok(());
        }

        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN TRANSACTION", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        for (id, sort) in updates {
            let result = conn
                .execute(
                    "UPDATE page_content_items SET sort = ? WHERE id = ?",
                    (*sort, id.as_str()),
                )
                .await;

            if let Err(e) = result {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(DatabaseError::sql_execution(format!(
                    "Failed to update sort for placement {}: {}",
                    id, e
                )));
            }
        }

        conn.execute("COMMIT", ()).await.map_err(|e| {
            std::mem::drop(conn.execute("ROLLBACK", ()));
            DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }

    /// Delete a placement
    ///
    /// # Returns
    ///
    /// Number of rows affected (0 = placement didn't exist)
    pub async fn db_delete_placement(&self, id: &str) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let rows_affected = conn
            .execute("DELETE FROM page_content_items WHERE id = ?", [id])
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to delete placement: {}", e))
            })?;

        Ok(rows_affected)
    }

    /// Pages a content item is placed on, in tree order
    pub async fn db_get_pages_using_item(
        &self,
        content_item_id: &str,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT p.id, p.parent_id, p.redirect_page_id, p.title, p.url,
                        p.lft, p.rght, p.tree_id, p.level, p.show_in_menu, p.is_public,
                        p.metadata, p.created_at, p.updated_at
                 FROM pages p
                 JOIN page_content_items pci ON pci.page_id = p.id
                 WHERE pci.content_item_id = ?
                 ORDER BY p.tree_id, p.lft",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare usage query: {}", e))
            })?;

        stmt.query([content_item_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute usage query: {}", e))
        })
    }

    /// Placement counts per content item
    ///
    /// Items with zero placements are absent from the result.
    pub async fn db_get_placement_counts(&self) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT content_item_id, COUNT(*) FROM page_content_items
                 GROUP BY content_item_id",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare counts query: {}", e))
            })?;

        stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute counts query: {}", e))
        })
    }

    /// Flush the WAL to the main database file
    ///
    /// Called on store shutdown so a following process sees all writes.
    pub async fn db_close(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
            .await
    }
}
