//! docseek-core: multi-root document indexing and search
//!
//! This library keeps a SQLite FTS5 index of office documents (TXT, MD,
//! DOCX, PDF, XLSX) found under a set of registered root directories, and
//! answers keyword queries by scanning files live, querying the full-text
//! index, or running a vector similarity search in Qdrant Edge.

pub mod cancel;
pub mod config;
pub mod consts;
pub mod db;
pub mod discover;
pub mod embed;
pub mod extract;
pub mod filetype;
pub mod index;
pub mod live;
pub mod notes;
pub mod query;
pub mod roots;
pub mod search;
pub mod semantic;
pub mod storage;

pub use cancel::{CancelFlag, OperationGuard};
pub use config::Config;
pub use consts::*;
pub use db::Database;
pub use discover::{find_workspace_root, init_workspace};
pub use filetype::FileType;
pub use index::Indexer;
pub use search::{Dispatcher, Location, SearchHit, SearchMode, SearchRequest};
pub use semantic::SemanticIndex;

#[derive(Debug, thiserror::Error)]
pub enum DsError {
    #[error("Not in a docseek workspace (no .docseek folder found)")]
    NotInWorkspace,

    #[error("Already initialized: {0}")]
    AlreadyInitialized(std::path::PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Failed to extract {path}: {message}")]
    Extract {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Root is not registered: {0}")]
    RootNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(std::path::PathBuf),

    #[error("Please enter a keyword")]
    EmptyQuery,

    #[error("No files found in the index, build the keyword index first")]
    EmptyIndex,

    #[error("Another {0} operation is already running")]
    Busy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DsError>;
