//! Live search: scan documents directly, without the index

use std::path::Path;

use crate::extract::{self, TextUnit};
use crate::index::document_walker;
use crate::query::context_snippet;
use crate::search::{Location, SearchHit};
use crate::{CancelFlag, Config, FileType, Result};

/// Characters of context shown around a PDF match.
const PDF_SNIPPET_RADIUS: usize = 60;

/// Scan every document under `roots` for `keyword` (case-insensitive).
///
/// Plain text, DOCX and XLSX produce one hit per matching line, paragraph
/// or cell. A PDF produces at most one hit with a snippet around its first
/// match. Unreadable files are logged and skipped. A cancelled scan returns
/// the hits collected so far.
pub fn live_search(
    roots: &[String],
    keyword: &str,
    config: &Config,
    cancel: &CancelFlag,
) -> Result<Vec<SearchHit>> {
    let needle = keyword.to_lowercase();
    let mut hits = Vec::new();

    'roots: for root in roots {
        for entry in document_walker(Path::new(root), config)?.flatten() {
            if cancel.is_cancelled() {
                tracing::info!("live search cancelled");
                break 'roots;
            }
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            let Some(file_type) = FileType::from_path(path) else {
                continue;
            };
            if !config.accepts(file_type) {
                continue;
            }
            if entry
                .metadata()
                .is_ok_and(|m| m.len() > config.max_file_size)
            {
                continue;
            }

            let units = match extract::extract_units(path, file_type) {
                Ok(units) => units,
                Err(e) => {
                    tracing::warn!("Error reading {} {}: {}", file_type, path.display(), e);
                    continue;
                }
            };

            search_units(path, file_type, units, keyword, &needle, cancel, &mut hits);
        }
    }

    tracing::debug!("live search for {keyword:?}: {} hits", hits.len());
    Ok(hits)
}

fn search_units(
    path: &Path,
    file_type: FileType,
    units: Vec<TextUnit>,
    keyword: &str,
    needle: &str,
    cancel: &CancelFlag,
    hits: &mut Vec<SearchHit>,
) {
    let path_str = path.to_string_lossy().to_string();

    for unit in units {
        if cancel.is_cancelled() {
            return;
        }
        if !unit.text.to_lowercase().contains(needle) {
            continue;
        }

        if file_type == FileType::Pdf {
            hits.push(SearchHit {
                path: path_str,
                file_type: file_type.label().to_string(),
                location: Location::FullText,
                content: context_snippet(&unit.text, keyword, PDF_SNIPPET_RADIUS),
            });
            return;
        }

        hits.push(SearchHit {
            path: path_str.clone(),
            file_type: file_type.label().to_string(),
            location: unit.location,
            content: unit.text.trim().to_string(),
        });
    }
}
