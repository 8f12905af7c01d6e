/// The name of the docseek folder (like .git)
pub const DS_DIR: &str = ".docseek";

/// Default embedding model (small general-purpose sentence model)
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Default embedding dimension for all-MiniLM-L6-v2
pub const DEFAULT_DIM: usize = 384;

/// Default AI chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default max file size (50MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Tokens of context in FTS5 snippets
pub const DEFAULT_SNIPPET_TOKENS: usize = 20;

/// Default number of AI search results
pub const DEFAULT_AI_RESULTS: usize = 20;

/// Default interval between background index updates (30 minutes)
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 30 * 60;

/// SQLite busy timeout in seconds
pub const DB_BUSY_TIMEOUT_SECS: u64 = 30;

/// Number of chunks embedded per batch
pub const EMBED_BATCH_SIZE: usize = 64;
