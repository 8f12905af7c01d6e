//! Discovery module: Find the .docseek workspace by walking up the directory tree

use std::path::{Path, PathBuf};

use crate::{Config, DS_DIR, Database, DsError, Result};

/// Find the workspace root by walking up from the given path.
///
/// Returns the path to the directory containing .docseek (not the .docseek folder itself).
pub fn find_workspace_root(start: &Path) -> Result<PathBuf> {
    let mut current = start.canonicalize()?;

    loop {
        let ds_path = current.join(DS_DIR);
        if ds_path.is_dir() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Err(DsError::NotInWorkspace),
        }
    }
}

/// Create a new workspace in `dir`: the .docseek folder, default config and database schema.
pub fn init_workspace(dir: &Path) -> Result<PathBuf> {
    let path = ds_dir(dir);
    if path.exists() {
        return Err(DsError::AlreadyInitialized(path));
    }

    std::fs::create_dir_all(&path)?;
    Config::default().save(dir)?;
    Database::open(&db_path(dir))?;

    tracing::info!("initialized workspace at {}", path.display());
    Ok(path)
}

/// Get the .docseek directory path for a given root.
pub fn ds_dir(root: &Path) -> PathBuf {
    root.join(DS_DIR)
}

/// Get the SQLite database path.
pub fn db_path(root: &Path) -> PathBuf {
    ds_dir(root).join("index.db")
}

/// Get the shard directory path.
pub fn shard_dir(root: &Path) -> PathBuf {
    ds_dir(root).join("shard")
}

/// Get the config file path.
pub fn config_path(root: &Path) -> PathBuf {
    ds_dir(root).join("config.json")
}

/// Get the AI index bookkeeping path.
pub fn ai_files_path(root: &Path) -> PathBuf {
    ds_dir(root).join("ai_files.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_workspace_root() {
        let temp = tempfile::tempdir().unwrap();

        let nested = temp.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(temp.path().join(DS_DIR)).unwrap();

        let found = find_workspace_root(&nested).unwrap();
        assert_eq!(found, temp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_not_in_workspace() {
        let temp = tempfile::tempdir().unwrap();

        let result = find_workspace_root(temp.path());
        assert!(matches!(result, Err(DsError::NotInWorkspace)));
    }

    #[test]
    fn test_init_workspace_twice() {
        let temp = tempfile::tempdir().unwrap();

        init_workspace(temp.path()).unwrap();
        assert!(config_path(temp.path()).is_file());
        assert!(db_path(temp.path()).is_file());

        let again = init_workspace(temp.path());
        assert!(matches!(again, Err(DsError::AlreadyInitialized(_))));
    }
}
