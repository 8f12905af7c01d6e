//! SQLite database: schema management and index bookkeeping
//!
//! The database holds two tables:
//!
//! - `roots`: the registered root directories and their display order.
//! - `file_index`: an FTS5 virtual table with one row per indexed file.
//!   Only `content` is tokenized; the other columns are stored alongside.
//!
//! The full-text table only holds derived data, so a table with an
//! unexpected layout is dropped and recreated empty. Roots are user data
//! and are migrated in place.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rusqlite::{params, Connection};

use crate::{Result, DB_BUSY_TIMEOUT_SECS};

/// Columns `file_index` must have, in declaration order.
pub const FILE_INDEX_COLUMNS: [&str; 5] = ["file_path", "file_type", "mtime", "content", "root_path"];

/// Position of the `content` column, used by `snippet()`.
pub const CONTENT_COLUMN: usize = 3;

const CREATE_ROOTS: &str = "CREATE TABLE IF NOT EXISTS roots (
    root_path TEXT PRIMARY KEY,
    position INTEGER NOT NULL DEFAULT 0
)";

const CREATE_FILE_INDEX: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS file_index USING fts5(
    file_path UNINDEXED,
    file_type UNINDEXED,
    mtime UNINDEXED,
    content,
    root_path UNINDEXED
)";

/// What `ensure_schema` had to change.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchemaReport {
    /// `file_index` was missing a column and has been recreated empty
    pub recreated_file_index: bool,
    /// `roots` gained the `position` column
    pub migrated_roots: bool,
}

static MEMORY_DATABASES: AtomicUsize = AtomicUsize::new(0);

/// Handle to the docseek database.
pub struct Database {
    conn: Connection,
    key: String,
}

impl Database {
    /// Open (or create) the database at `path` and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let key = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .to_string();
        Self::from_connection(conn, key)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let id = MEMORY_DATABASES.fetch_add(1, Ordering::Relaxed);
        Self::from_connection(Connection::open_in_memory()?, format!(":memory:{id}"))
    }

    fn from_connection(conn: Connection, key: String) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(DB_BUSY_TIMEOUT_SECS))?;
        let db = Self { conn, key };
        let report = db.ensure_schema()?;
        tracing::debug!(?report, "schema checked");
        Ok(db)
    }

    /// Identifies the database file; scopes the indexing guard.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Make sure both tables exist with the expected columns.
    pub fn ensure_schema(&self) -> Result<SchemaReport> {
        let mut report = SchemaReport::default();

        if self.table_exists("file_index")? {
            let missing = FILE_INDEX_COLUMNS
                .iter()
                .find(|column| !self.column_selectable("file_index", column));
            if let Some(column) = missing {
                tracing::warn!("file_index has no `{column}` column, recreating it");
                self.conn.execute_batch("DROP TABLE file_index")?;
                report.recreated_file_index = true;
            }
        }

        if self.table_exists("roots")? && !self.column_selectable("roots", "position") {
            tracing::info!("adding position column to roots");
            self.conn.execute_batch(
                "ALTER TABLE roots ADD COLUMN position INTEGER NOT NULL DEFAULT 0;
                 UPDATE roots SET position = rowid;",
            )?;
            report.migrated_roots = true;
        }

        self.conn.execute_batch(CREATE_ROOTS)?;
        self.conn.execute_batch(CREATE_FILE_INDEX)?;

        Ok(report)
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn column_selectable(&self, table: &str, column: &str) -> bool {
        self.conn
            .prepare(&format!("SELECT {column} FROM {table} LIMIT 0"))
            .is_ok()
    }

    /// Total number of indexed files.
    pub fn indexed_file_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM file_index", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Indexed files per root, ordered by root path.
    pub fn counts_by_root(&self) -> Result<Vec<(String, usize)>> {
        self.grouped_counts("root_path")
    }

    /// Indexed files per file type label, ordered by label.
    pub fn counts_by_type(&self) -> Result<Vec<(String, usize)>> {
        self.grouped_counts("file_type")
    }

    fn grouped_counts(&self, column: &str) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column}, COUNT(*) FROM file_index GROUP BY {column} ORDER BY {column}"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Every indexed document: (path, root, file type label, content).
    pub fn indexed_documents(&self) -> Result<Vec<IndexedDocument>> {
        let mut stmt = self
            .conn
            .prepare("SELECT file_path, root_path, file_type, content FROM file_index")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(IndexedDocument {
                    path: row.get(0)?,
                    root: row.get(1)?,
                    file_type: row.get(2)?,
                    content: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

/// A full-text index row, as handed to the AI index.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub path: String,
    pub root: String,
    pub file_type: String,
    pub content: String,
}
