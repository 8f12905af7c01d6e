//! Indexing logic: walk roots, extract text, store rows in the FTS5 table

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use ignore::overrides::OverrideBuilder;
use ignore::{Walk, WalkBuilder};
use rusqlite::types::Value;
use rusqlite::{params, Transaction};

use crate::{extract, CancelFlag, Config, Database, FileType, OperationGuard, Result, DS_DIR};

/// Progress events emitted during indexing.
#[derive(Debug, Clone)]
pub enum ProgressEvent<'a> {
    /// Scanning roots for files to index.
    Scanning { count: usize },
    /// Indexing a specific file.
    Indexing {
        current: usize,
        total: usize,
        path: &'a Path,
    },
    /// Dropping rows of files that no longer exist.
    Removing { count: usize },
    /// Generating embeddings for the AI index.
    Embedding { current: usize, total: usize },
}

/// Type alias for progress callback.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send>;

/// Stats from an indexing run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub files_scanned: usize,
    pub files_added: usize,
    pub files_updated: usize,
    pub files_unchanged: usize,
    pub files_removed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub cancelled: bool,
}

/// A file that passed the type and size filters.
#[derive(Debug, Clone)]
struct Candidate {
    root: String,
    path: PathBuf,
    file_type: FileType,
    mtime: f64,
}

/// Build a walker over one root honouring the config's ignore rules.
///
/// The `.docseek` folder is always skipped.
pub fn document_walker(root: &Path, config: &Config) -> Result<Walk> {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(config.skip_hidden)
        .git_ignore(config.respect_ignore_files)
        .git_global(config.respect_ignore_files)
        .git_exclude(config.respect_ignore_files)
        .ignore(config.respect_ignore_files)
        .filter_entry(|entry| entry.file_name() != OsStr::new(DS_DIR));

    if !config.ignore_paths.is_empty() {
        let mut overrides = OverrideBuilder::new(root);
        for pattern in &config.ignore_paths {
            overrides
                .add(&format!("!{pattern}"))
                .map_err(|e| crate::DsError::Config(format!("bad ignore pattern {pattern}: {e}")))?;
        }
        let overrides = overrides
            .build()
            .map_err(|e| crate::DsError::Config(e.to_string()))?;
        builder.overrides(overrides);
    }

    Ok(builder.build())
}

fn value_to_mtime(value: Value) -> f64 {
    match value {
        Value::Real(f) => f,
        Value::Integer(i) => i as f64,
        Value::Text(t) => t.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}

/// The indexer keeps `file_index` in sync with the files under the roots.
pub struct Indexer<'a> {
    db: &'a mut Database,
    config: &'a Config,
    cancel: CancelFlag,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> Indexer<'a> {
    pub fn new(db: &'a mut Database, config: &'a Config) -> Self {
        Self {
            db,
            config,
            cancel: CancelFlag::new(),
            progress_callback: None,
        }
    }

    /// Use a shared cancel flag instead of a private one.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set a callback to receive progress updates during indexing.
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress_callback = Some(callback);
    }

    /// Drop the rows of the given roots and index every file from scratch.
    pub fn rebuild(&mut self, roots: &[String]) -> Result<IndexStats> {
        let _guard = OperationGuard::acquire(self.db.key(), "rebuild")?;
        let mut stats = IndexStats::default();

        let candidates = self.scan(roots, &mut stats);
        if stats.cancelled {
            return Ok(stats);
        }

        let tx = self.db.conn_mut().transaction()?;
        for root in roots {
            let dropped = tx.execute("DELETE FROM file_index WHERE root_path = ?1", params![root])?;
            tracing::debug!("dropped {dropped} rows of {root}");
        }

        let total = candidates.len();
        for (i, candidate) in candidates.iter().enumerate() {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            emit(
                &self.progress_callback,
                ProgressEvent::Indexing {
                    current: i + 1,
                    total,
                    path: &candidate.path,
                },
            );
            insert_row(&tx, candidate, &mut stats)?;
            stats.files_added += 1;
        }
        tx.commit()?;

        tracing::info!(?stats, "rebuild finished");
        Ok(stats)
    }

    /// Bring the rows of the given roots up to date by modification time.
    ///
    /// New files are added, files modified since they were indexed are
    /// re-extracted and rows of vanished files are removed. Removal only
    /// happens after a complete pass.
    pub fn update(&mut self, roots: &[String]) -> Result<IndexStats> {
        let _guard = OperationGuard::acquire(self.db.key(), "update")?;
        let mut stats = IndexStats::default();

        let candidates = self.scan(roots, &mut stats);
        if stats.cancelled {
            return Ok(stats);
        }

        let tx = self.db.conn_mut().transaction()?;

        let mut indexed: HashMap<(String, String), f64> = HashMap::new();
        {
            let mut stmt =
                tx.prepare("SELECT file_path, root_path, mtime FROM file_index WHERE root_path = ?1")?;
            for root in roots {
                let rows = stmt.query_map(params![root], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Value>(2)?,
                    ))
                })?;
                for row in rows {
                    let (path, root, mtime) = row?;
                    indexed.insert((path, root), value_to_mtime(mtime));
                }
            }
        }

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let total = candidates.len();
        for (i, candidate) in candidates.iter().enumerate() {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }

            let key = (
                candidate.path.to_string_lossy().to_string(),
                candidate.root.clone(),
            );
            let previous = indexed.get(&key).copied();
            seen.insert(key);

            match previous {
                None => {
                    emit(
                        &self.progress_callback,
                        ProgressEvent::Indexing {
                            current: i + 1,
                            total,
                            path: &candidate.path,
                        },
                    );
                    insert_row(&tx, candidate, &mut stats)?;
                    stats.files_added += 1;
                }
                Some(mtime) if mtime < candidate.mtime => {
                    emit(
                        &self.progress_callback,
                        ProgressEvent::Indexing {
                            current: i + 1,
                            total,
                            path: &candidate.path,
                        },
                    );
                    tx.execute(
                        "DELETE FROM file_index WHERE file_path = ?1 AND root_path = ?2",
                        params![candidate.path.to_string_lossy(), candidate.root],
                    )?;
                    insert_row(&tx, candidate, &mut stats)?;
                    stats.files_updated += 1;
                }
                Some(_) => stats.files_unchanged += 1,
            }
        }

        if !stats.cancelled {
            let vanished: Vec<&(String, String)> =
                indexed.keys().filter(|key| !seen.contains(*key)).collect();
            emit(
                &self.progress_callback,
                ProgressEvent::Removing {
                    count: vanished.len(),
                },
            );
            for (path, root) in vanished {
                tx.execute(
                    "DELETE FROM file_index WHERE file_path = ?1 AND root_path = ?2",
                    params![path, root],
                )?;
                stats.files_removed += 1;
            }
        }
        tx.commit()?;

        tracing::info!(?stats, "update finished");
        Ok(stats)
    }

    /// Walk the roots and collect indexable files.
    fn scan(&self, roots: &[String], stats: &mut IndexStats) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for root in roots {
            let walker = match document_walker(Path::new(root), self.config) {
                Ok(walker) => walker,
                Err(e) => {
                    tracing::warn!("cannot walk {root}: {e}");
                    continue;
                }
            };

            for entry in walker.flatten() {
                if self.cancel.is_cancelled() {
                    stats.cancelled = true;
                    return candidates;
                }

                let path = entry.path();
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }

                stats.files_scanned += 1;
                emit(
                    &self.progress_callback,
                    ProgressEvent::Scanning {
                        count: stats.files_scanned,
                    },
                );

                let Some(file_type) = FileType::from_path(path) else {
                    stats.files_skipped += 1;
                    continue;
                };
                if !self.config.accepts(file_type) {
                    stats.files_skipped += 1;
                    continue;
                }

                let metadata = match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!("cannot stat {}: {e}", path.display());
                        stats.files_skipped += 1;
                        continue;
                    }
                };
                if metadata.len() > self.config.max_file_size {
                    tracing::debug!("skipping large file {}", path.display());
                    stats.files_skipped += 1;
                    continue;
                }

                let mtime = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);

                candidates.push(Candidate {
                    root: root.clone(),
                    path: path.to_path_buf(),
                    file_type,
                    mtime,
                });
            }
        }

        candidates
    }
}

/// Extract a file and insert its row. Extraction failures store empty content.
fn insert_row(tx: &Transaction, candidate: &Candidate, stats: &mut IndexStats) -> Result<()> {
    let content = match extract::extract_text(&candidate.path, candidate.file_type) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Failed to extract {}: {}", candidate.path.display(), e);
            stats.files_failed += 1;
            String::new()
        }
    };

    tx.execute(
        "INSERT INTO file_index (file_path, file_type, mtime, content, root_path)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            candidate.path.to_string_lossy(),
            candidate.file_type.label(),
            candidate.mtime,
            content,
            candidate.root,
        ],
    )?;
    tracing::debug!("indexed {}", candidate.path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};

    fn setup() -> (tempfile::TempDir, Database, String) {
        let temp = tempfile::tempdir().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(docs.join("sub")).unwrap();
        fs::write(docs.join("a.txt"), "the quick brown fox").unwrap();
        fs::write(docs.join("sub").join("b.md"), "# Notes\nlazy dog").unwrap();
        fs::write(docs.join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(docs.join("~$lock.txt"), "owner").unwrap();

        let db = Database::open_in_memory().unwrap();
        db.add_root(&docs).unwrap();
        let root = db.list_roots().unwrap().remove(0).path;
        (temp, db, root)
    }

    #[test]
    fn test_rebuild_indexes_supported_files() {
        let (_temp, mut db, root) = setup();
        let config = Config::default();

        let stats = Indexer::new(&mut db, &config).rebuild(&[root.clone()]).unwrap();
        assert_eq!(stats.files_added, 2);
        assert_eq!(stats.files_skipped, 2);
        assert!(!stats.cancelled);
        assert_eq!(db.indexed_file_count().unwrap(), 2);
        assert_eq!(db.counts_by_root().unwrap(), vec![(root, 2)]);
    }

    #[test]
    fn test_rebuild_replaces_previous_rows() {
        let (_temp, mut db, root) = setup();
        let config = Config::default();

        Indexer::new(&mut db, &config).rebuild(&[root.clone()]).unwrap();
        Indexer::new(&mut db, &config).rebuild(&[root.clone()]).unwrap();
        assert_eq!(db.indexed_file_count().unwrap(), 2);
    }

    #[test]
    fn test_update_tracks_changes() {
        let (temp, mut db, root) = setup();
        let config = Config::default();
        let docs = temp.path().join("docs");

        let first = Indexer::new(&mut db, &config).update(&[root.clone()]).unwrap();
        assert_eq!(first.files_added, 2);

        let second = Indexer::new(&mut db, &config).update(&[root.clone()]).unwrap();
        assert_eq!(second.files_unchanged, 2);
        assert_eq!(second.files_added, 0);

        // Pretend a.txt was indexed long ago, add a file, remove another.
        db.conn()
            .execute(
                "UPDATE file_index SET mtime = 0.0 WHERE file_path LIKE '%a.txt'",
                [],
            )
            .unwrap();
        fs::write(docs.join("c.txt"), "new file").unwrap();
        fs::remove_file(docs.join("sub").join("b.md")).unwrap();

        let third = Indexer::new(&mut db, &config).update(&[root.clone()]).unwrap();
        assert_eq!(third.files_updated, 1);
        assert_eq!(third.files_added, 1);
        assert_eq!(third.files_removed, 1);
        assert_eq!(db.indexed_file_count().unwrap(), 2);
    }

    #[test]
    fn test_update_leaves_other_roots_alone() {
        let (_temp, mut db, root) = setup();
        let config = Config::default();
        db.conn()
            .execute(
                "INSERT INTO file_index VALUES ('/elsewhere/x.txt', 'TXT', 1.0, 'x', '/elsewhere')",
                [],
            )
            .unwrap();

        Indexer::new(&mut db, &config).update(&[root]).unwrap();
        assert_eq!(db.indexed_file_count().unwrap(), 3);
    }

    #[test]
    fn test_cancelled_update_keeps_rows() {
        let (_temp, mut db, root) = setup();
        let config = Config::default();
        Indexer::new(&mut db, &config).update(&[root.clone()]).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let stats = Indexer::new(&mut db, &config)
            .with_cancel(cancel)
            .update(&[root])
            .unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.files_removed, 0);
        assert_eq!(db.indexed_file_count().unwrap(), 2);
    }

    #[test]
    fn test_include_types_and_progress() {
        let (_temp, mut db, root) = setup();
        let config = Config {
            include_types: vec![FileType::Md],
            ..Config::default()
        };

        let events = Arc::new(Mutex::new(Vec::new()));
        let mut indexer = Indexer::new(&mut db, &config);
        indexer.set_progress_callback(Box::new({
            let events = events.clone();
            move |event| {
                if let ProgressEvent::Indexing { path, .. } = event {
                    events.lock().unwrap().push(path.to_path_buf());
                }
            }
        }));
        let stats = indexer.rebuild(&[root]).unwrap();

        assert_eq!(stats.files_added, 1);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].ends_with("sub/b.md"));
    }

    #[test]
    fn test_ignore_paths() {
        let (_temp, mut db, root) = setup();
        let config = Config {
            ignore_paths: vec!["sub".to_string()],
            ..Config::default()
        };

        let stats = Indexer::new(&mut db, &config).rebuild(&[root]).unwrap();
        assert_eq!(stats.files_added, 1);
    }

    #[test]
    fn test_extraction_failure_keeps_empty_row() {
        let (temp, mut db, root) = setup();
        let config = Config::default();
        let broken = temp.path().join("docs").join("broken.docx");
        fs::write(&broken, "this is not a zip package").unwrap();

        let first = Indexer::new(&mut db, &config).update(&[root.clone()]).unwrap();
        assert_eq!(first.files_added, 3);
        assert_eq!(first.files_failed, 1);

        let (file_type, content): (String, String) = db
            .conn()
            .query_row(
                "SELECT file_type, content FROM file_index WHERE file_path LIKE '%broken.docx'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(file_type, "DOCX");
        assert_eq!(content, "");

        // Not retried until its mtime changes.
        let second = Indexer::new(&mut db, &config).update(&[root]).unwrap();
        assert_eq!(second.files_failed, 0);
        assert_eq!(second.files_unchanged, 3);
    }
}
