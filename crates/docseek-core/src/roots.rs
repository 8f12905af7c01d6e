//! Root registry: the directories registered for indexing and search

use std::path::Path;

use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::{Database, DsError, Result};

/// A registered root directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Root {
    pub path: String,
    pub position: i64,
}

/// Normalize a directory into the string stored in the registry.
pub fn normalize_root(path: &Path) -> Result<String> {
    if !path.is_dir() {
        return Err(DsError::NotADirectory(path.to_path_buf()));
    }
    Ok(path.canonicalize()?.to_string_lossy().to_string())
}

impl Database {
    /// All roots in display order.
    pub fn list_roots(&self) -> Result<Vec<Root>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT root_path, position FROM roots ORDER BY position, root_path")?;
        let roots = stmt
            .query_map([], |row| {
                Ok(Root {
                    path: row.get(0)?,
                    position: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(roots)
    }

    /// Register a directory. Returns `false` if it was already registered.
    pub fn add_root(&self, path: &Path) -> Result<bool> {
        let root = normalize_root(path)?;
        let next: i64 = self.conn().query_row(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM roots",
            [],
            |row| row.get(0),
        )?;
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO roots (root_path, position) VALUES (?1, ?2)",
            params![root, next],
        )?;
        if inserted > 0 {
            tracing::info!("registered root {root}");
        }
        Ok(inserted > 0)
    }

    /// Unregister a root and drop its indexed files.
    ///
    /// `root` is matched as stored; a path that still exists on disk is
    /// normalized first so relative paths work.
    pub fn remove_root(&mut self, root: &str) -> Result<bool> {
        let root = self.resolve_root_name(root)?;
        let tx = self.conn_mut().transaction()?;
        let removed = tx.execute("DELETE FROM roots WHERE root_path = ?1", params![root])?;
        let files = tx.execute("DELETE FROM file_index WHERE root_path = ?1", params![root])?;
        tx.commit()?;
        if removed > 0 {
            tracing::info!("removed root {root} ({files} indexed files dropped)");
        }
        Ok(removed > 0)
    }

    /// Move a root one place earlier. No-op for the first root.
    pub fn move_root_up(&mut self, root: &str) -> Result<()> {
        self.move_root(root, -1)
    }

    /// Move a root one place later. No-op for the last root.
    pub fn move_root_down(&mut self, root: &str) -> Result<()> {
        self.move_root(root, 1)
    }

    fn move_root(&mut self, root: &str, offset: isize) -> Result<()> {
        let root = self.resolve_root_name(root)?;
        let roots = self.list_roots()?;
        let index = roots
            .iter()
            .position(|r| r.path == root)
            .ok_or_else(|| DsError::RootNotFound(root.clone()))?;

        let Some(neighbour) = index
            .checked_add_signed(offset)
            .filter(|&i| i < roots.len())
        else {
            return Ok(());
        };

        // Rewrite every position so ties from older databases disappear.
        let mut order: Vec<&str> = roots.iter().map(|r| r.path.as_str()).collect();
        order.swap(index, neighbour);

        let tx = self.conn_mut().transaction()?;
        for (position, path) in order.iter().enumerate() {
            tx.execute(
                "UPDATE roots SET position = ?1 WHERE root_path = ?2",
                params![position as i64 + 1, path],
            )?;
        }
        tx.commit()?;
        tracing::debug!("moved root {root} to position {}", neighbour + 1);
        Ok(())
    }

    /// Resolve a user selection to registered roots in registry order.
    ///
    /// An empty selection means every root.
    pub fn select_roots(&self, selection: &[String]) -> Result<Vec<String>> {
        let all: Vec<String> = self.list_roots()?.into_iter().map(|r| r.path).collect();
        if selection.is_empty() {
            return Ok(all);
        }

        let mut wanted = Vec::with_capacity(selection.len());
        for item in selection {
            let name = self.resolve_root_name(item)?;
            if !all.contains(&name) {
                return Err(DsError::RootNotFound(item.clone()));
            }
            wanted.push(name);
        }
        Ok(all.into_iter().filter(|r| wanted.contains(r)).collect())
    }

    /// Map user input to the stored root string.
    fn resolve_root_name(&self, input: &str) -> Result<String> {
        let stored: Option<String> = self
            .conn()
            .query_row(
                "SELECT root_path FROM roots WHERE root_path = ?1",
                params![input],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(root) = stored {
            return Ok(root);
        }

        let path = Path::new(input);
        if path.is_dir() {
            let normalized = normalize_root(path)?;
            let known: Option<String> = self
                .conn()
                .query_row(
                    "SELECT root_path FROM roots WHERE root_path = ?1",
                    params![normalized],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(root) = known {
                return Ok(root);
            }
        }
        Err(DsError::RootNotFound(input.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn roots_of(db: &Database) -> Vec<String> {
        db.list_roots().unwrap().into_iter().map(|r| r.path).collect()
    }

    #[test]
    fn test_add_root_is_unique() {
        let temp = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();

        assert!(db.add_root(temp.path()).unwrap());
        assert!(!db.add_root(temp.path()).unwrap());
        assert_eq!(db.list_roots().unwrap().len(), 1);
    }

    #[test]
    fn test_add_root_rejects_files() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.add_root(&file), Err(DsError::NotADirectory(_))));
    }

    #[test]
    fn test_remove_root_drops_its_rows() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Database::open_in_memory().unwrap();
        db.add_root(temp.path()).unwrap();
        let root = roots_of(&db).remove(0);

        db.conn()
            .execute(
                "INSERT INTO file_index VALUES (?1, 'TXT', 1.0, 'hello', ?2)",
                params![format!("{root}/a.txt"), root],
            )
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO file_index VALUES ('/other/b.txt', 'TXT', 1.0, 'hello', '/other')",
                [],
            )
            .unwrap();

        assert!(db.remove_root(&root).unwrap());
        assert!(db.list_roots().unwrap().is_empty());
        assert_eq!(db.indexed_file_count().unwrap(), 1);
        assert!(matches!(db.remove_root(&root), Err(DsError::RootNotFound(_))));
    }

    #[test]
    fn test_move_roots() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Database::open_in_memory().unwrap();
        for name in ["a", "b", "c"] {
            let dir = temp.path().join(name);
            fs::create_dir(&dir).unwrap();
            db.add_root(&dir).unwrap();
        }
        let original = roots_of(&db);

        db.move_root_up(&original[2]).unwrap();
        assert_eq!(
            roots_of(&db),
            vec![original[0].clone(), original[2].clone(), original[1].clone()]
        );

        // Ends are no-ops.
        db.move_root_up(&original[0]).unwrap();
        db.move_root_down(&original[1]).unwrap();
        assert_eq!(
            roots_of(&db),
            vec![original[0].clone(), original[2].clone(), original[1].clone()]
        );

        db.move_root_down(&original[0]).unwrap();
        assert_eq!(
            roots_of(&db),
            vec![original[2].clone(), original[0].clone(), original[1].clone()]
        );
    }

    #[test]
    fn test_select_roots() {
        let temp = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        for name in ["a", "b"] {
            let dir = temp.path().join(name);
            fs::create_dir(&dir).unwrap();
            db.add_root(&dir).unwrap();
        }
        let all = roots_of(&db);

        assert_eq!(db.select_roots(&[]).unwrap(), all);
        assert_eq!(db.select_roots(&[all[1].clone()]).unwrap(), vec![all[1].clone()]);

        let by_path = temp.path().join("a").to_string_lossy().to_string();
        assert_eq!(db.select_roots(&[by_path]).unwrap(), vec![all[0].clone()]);

        let unknown = db.select_roots(&["/definitely/not/registered".to_string()]);
        assert!(matches!(unknown, Err(DsError::RootNotFound(_))));
    }
}
