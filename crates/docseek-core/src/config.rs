//! Configuration handling for .docseek/config.json

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    discover, FileType, Result, DEFAULT_AI_RESULTS, DEFAULT_CHUNK_SIZE, DEFAULT_DIM,
    DEFAULT_MAX_FILE_SIZE, DEFAULT_MODEL, DEFAULT_SNIPPET_TOKENS, DEFAULT_UPDATE_INTERVAL_SECS,
};

/// Configuration stored in .docseek/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Embedding model name (fastembed model ID)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_dim")]
    pub dimension: usize,

    /// AI chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum file size to index (bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// File types to include (empty = all supported types)
    #[serde(default)]
    pub include_types: Vec<FileType>,

    /// Additional glob patterns to ignore
    #[serde(default)]
    pub ignore_paths: Vec<String>,

    /// Honour .gitignore / .ignore files under the roots
    #[serde(default = "default_true")]
    pub respect_ignore_files: bool,

    /// Skip hidden files and directories
    #[serde(default = "default_true")]
    pub skip_hidden: bool,

    /// Tokens of context in index search snippets
    #[serde(default = "default_snippet_tokens")]
    pub snippet_tokens: usize,

    /// Number of AI search results
    #[serde(default = "default_ai_results")]
    pub ai_results: usize,

    /// Seconds between background updates in `watch`
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_dim() -> usize {
    DEFAULT_DIM
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_true() -> bool {
    true
}

fn default_snippet_tokens() -> usize {
    DEFAULT_SNIPPET_TOKENS
}

fn default_ai_results() -> usize {
    DEFAULT_AI_RESULTS
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            dimension: default_dim(),
            chunk_size: default_chunk_size(),
            max_file_size: default_max_file_size(),
            include_types: Vec::new(),
            ignore_paths: Vec::new(),
            respect_ignore_files: true,
            skip_hidden: true,
            snippet_tokens: default_snippet_tokens(),
            ai_results: default_ai_results(),
            update_interval_secs: default_update_interval(),
        }
    }
}

impl Config {
    /// Load config from the .docseek directory.
    pub fn load(root: &Path) -> Result<Self> {
        let path = discover::config_path(root);
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the .docseek directory.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = discover::config_path(root);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Whether files of this type are indexed and searched.
    pub fn accepts(&self, file_type: FileType) -> bool {
        self.include_types.is_empty() || self.include_types.contains(&file_type)
    }
}
