//! Tools for organizing a folder of Markdown notes

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use ignore::WalkBuilder;
use regex::Regex;

use crate::{DsError, Result};

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_\-]+)").expect("valid tag pattern"));

const INDEX_FILE: &str = "index.md";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub files: usize,
    pub total_bytes: u64,
}

fn check_root(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(DsError::NotADirectory(root.to_path_buf()))
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

/// Every `.md` file under `root`, sorted. Hidden entries are skipped.
fn markdown_files(root: &Path) -> Result<Vec<PathBuf>> {
    check_root(root)?;
    let mut files: Vec<PathBuf> = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .build()
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| is_markdown(path))
        .collect();
    files.sort();
    Ok(files)
}

fn read_note(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!("cannot read {}: {e}", path.display());
            None
        }
    }
}

/// All `#tag` names used in the collection.
pub fn extract_tags(root: &Path) -> Result<BTreeSet<String>> {
    let mut tags = BTreeSet::new();
    for path in markdown_files(root)? {
        let Some(content) = read_note(&path) else {
            continue;
        };
        for capture in TAG_PATTERN.captures_iter(&content) {
            tags.insert(capture[1].to_string());
        }
    }
    Ok(tags)
}

/// Map each note to the notes that mention its file name.
///
/// Notes nobody mentions are left out.
pub fn find_backlinks(root: &Path) -> Result<BTreeMap<PathBuf, Vec<PathBuf>>> {
    let notes: Vec<(PathBuf, String)> = markdown_files(root)?
        .into_iter()
        .filter_map(|path| read_note(&path).map(|content| (path, content)))
        .collect();

    let mut backlinks = BTreeMap::new();
    for (target, _) in &notes {
        let Some(name) = target.file_name().map(|n| n.to_string_lossy()) else {
            continue;
        };
        let linking: Vec<PathBuf> = notes
            .iter()
            .filter(|(other, content)| other != target && content.contains(&*name))
            .map(|(other, _)| other.clone())
            .collect();
        if !linking.is_empty() {
            backlinks.insert(target.clone(), linking);
        }
    }
    Ok(backlinks)
}

pub fn collection_stats(root: &Path) -> Result<CollectionStats> {
    let mut stats = CollectionStats::default();
    for path in markdown_files(root)? {
        stats.files += 1;
        stats.total_bytes += fs::metadata(&path)?.len();
    }
    Ok(stats)
}

/// Write an `index.md` into every directory holding notes.
///
/// Directories are handled deepest first, so a parent index can link to
/// the index just written for each subdirectory. Returns the number of
/// index pages written.
pub fn generate_indexes(root: &Path) -> Result<usize> {
    check_root(root)?;

    let mut dirs: Vec<PathBuf> = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .build()
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_dir()))
        .map(|entry| entry.into_path())
        .collect();
    dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));

    let mut written = 0;
    for dir in dirs {
        let mut notes = Vec::new();
        let mut subdirs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                if path.join(INDEX_FILE).exists() {
                    subdirs.push(name);
                }
            } else if is_markdown(&path) && name != INDEX_FILE {
                notes.push(name);
            }
        }
        if notes.is_empty() && subdirs.is_empty() {
            continue;
        }
        notes.sort();
        subdirs.sort();

        let mut page = String::from("# Index\n\n");
        for note in &notes {
            let title = note.strip_suffix(".md").unwrap_or(note);
            page.push_str(&format!("- [{title}]({note})\n"));
        }
        for sub in &subdirs {
            page.push_str(&format!("- [{sub}/](./{sub}/{INDEX_FILE})\n"));
        }

        fs::write(dir.join(INDEX_FILE), page)?;
        tracing::debug!("wrote index for {}", dir.display());
        written += 1;
    }
    Ok(written)
}

/// Create `note_YYYYmmdd_HHMMSS.md` in `root`. Fails if it already exists.
pub fn create_note(root: &Path, now: NaiveDateTime) -> Result<PathBuf> {
    check_root(root)?;
    let stem = format!("note_{}", now.format("%Y%m%d_%H%M%S"));
    let path = root.join(format!("{stem}.md"));

    let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    write!(
        file,
        "# {stem}\n\nCreated: {}\n\n",
        now.format("%Y-%m-%d %H:%M:%S")
    )?;
    Ok(path)
}

/// Create an empty `folder_YYYYmmdd_HHMMSS` directory in `root`.
pub fn create_folder(root: &Path, now: NaiveDateTime) -> Result<PathBuf> {
    check_root(root)?;
    let path = root.join(format!("folder_{}", now.format("%Y%m%d_%H%M%S")));
    fs::create_dir_all(&path)?;
    Ok(path)
}
