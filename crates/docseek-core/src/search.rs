//! Search dispatcher: live scan, full-text index, or AI similarity

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::db::CONTENT_COLUMN;
use crate::live::live_search;
use crate::query::{context_snippet, fts_query, is_non_latin, like_pattern, truncate_chars};
use crate::{CancelFlag, Config, Database, DsError, Result, SemanticIndex};

/// Characters of context around a `LIKE` match.
const LIKE_SNIPPET_RADIUS: usize = 30;

/// Characters of chunk text shown for an AI hit.
const AI_CONTENT_CHARS: usize = 200;

/// Where in a document a hit was found.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// 1-based line of a text or Markdown file
    Line(usize),
    /// 1-based paragraph of a DOCX document
    Paragraph(usize),
    /// Somewhere in a document without finer structure (PDF)
    FullText,
    /// A spreadsheet cell; `row` is the sheet's own row number
    Cell {
        sheet: String,
        row: u32,
        column: String,
    },
    /// A full-text index hit in a document of `root`
    Indexed { root: String },
    /// A vector index hit
    Ai { score: f32 },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line(n) => write!(f, "Line {n}"),
            Location::Paragraph(n) => write!(f, "Paragraph {n}"),
            Location::FullText => write!(f, "Full Text"),
            Location::Cell { sheet, row, column } => {
                write!(f, "Sheet {sheet}, Row {row}, Column {column}")
            }
            Location::Indexed { root } => write!(f, "Indexed ({root})"),
            Location::Ai { score } => write!(f, "AI Match (Score: {score:.2})"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    Live,
    #[default]
    Index,
    Ai,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(SearchMode::Live),
            "index" => Ok(SearchMode::Index),
            "ai" => Ok(SearchMode::Ai),
            other => Err(format!("unknown search mode: {other} (expected live, index or ai)")),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchMode::Live => "live",
            SearchMode::Index => "index",
            SearchMode::Ai => "ai",
        };
        f.write_str(name)
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub path: String,
    /// File type label (TXT, MD, DOCX, PDF, XLSX)
    pub file_type: String,
    pub location: Location,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub keyword: String,
    pub mode: SearchMode,
    /// Roots to search; empty means every registered root
    pub roots: Vec<String>,
    pub limit: Option<usize>,
    /// Pass the keyword to FTS5 as a query expression instead of quoting it
    pub raw_query: bool,
}

impl SearchRequest {
    pub fn new(keyword: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            keyword: keyword.into(),
            mode,
            ..Self::default()
        }
    }
}

/// Routes a search request to the matching backend.
pub struct Dispatcher<'a> {
    workspace: PathBuf,
    db: &'a Database,
    config: &'a Config,
    cancel: CancelFlag,
}

impl<'a> Dispatcher<'a> {
    pub fn new(workspace: &Path, db: &'a Database, config: &'a Config) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            db,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Use a shared cancel flag for live scans and AI lookups.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let keyword = request.keyword.trim();
        if keyword.is_empty() {
            return Err(DsError::EmptyQuery);
        }

        let selected = self.db.select_roots(&request.roots)?;
        let registered = self.db.list_roots()?.len();
        let filtered = selected.len() < registered;
        tracing::debug!(
            mode = %request.mode,
            roots = selected.len(),
            filtered,
            "searching for {keyword:?}"
        );

        let mut hits = match request.mode {
            SearchMode::Live => live_search(&selected, keyword, self.config, &self.cancel)?,
            SearchMode::Index => {
                let roots: &[String] = if filtered { &selected } else { &[] };
                self.index_search(keyword, roots, request.raw_query)?
            }
            SearchMode::Ai => {
                let limit = request.limit.unwrap_or(self.config.ai_results);
                let roots = filtered.then_some(selected.as_slice());
                self.ai_search(keyword, limit, roots)?
            }
        };

        if let Some(limit) = request.limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }

    /// Query `file_index`. A non-empty `roots` restricts hits to those roots.
    fn index_search(&self, keyword: &str, roots: &[String], raw: bool) -> Result<Vec<SearchHit>> {
        let like = is_non_latin(keyword);

        let (mut sql, first) = if like {
            (
                "SELECT file_path, file_type, root_path, content FROM file_index
                 WHERE content LIKE ?1 ESCAPE '\\'"
                    .to_string(),
                Value::Text(like_pattern(keyword)),
            )
        } else {
            let expression = if raw {
                keyword.to_string()
            } else {
                fts_query(keyword)
            };
            (
                format!(
                    "SELECT file_path, file_type, root_path,
                            snippet(file_index, {CONTENT_COLUMN}, '[', ']', '...', {})
                     FROM file_index WHERE file_index MATCH ?1",
                    self.config.snippet_tokens
                ),
                Value::Text(expression),
            )
        };

        let mut values = vec![first];
        if !roots.is_empty() {
            let placeholders: Vec<String> = (0..roots.len()).map(|i| format!("?{}", i + 2)).collect();
            sql.push_str(&format!(" AND root_path IN ({})", placeholders.join(", ")));
            values.extend(roots.iter().cloned().map(Value::Text));
        }
        if !like {
            sql.push_str(" ORDER BY rank");
        }

        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let hits = rows
            .into_iter()
            .map(|(path, file_type, root, text)| SearchHit {
                path,
                file_type,
                location: Location::Indexed { root },
                content: if like {
                    context_snippet(&text, keyword, LIKE_SNIPPET_RADIUS)
                } else {
                    text
                },
            })
            .collect();
        Ok(hits)
    }

    fn ai_search(
        &self,
        keyword: &str,
        limit: usize,
        roots: Option<&[String]>,
    ) -> Result<Vec<SearchHit>> {
        let mut index = SemanticIndex::open(&self.workspace)?;
        if self.cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let hits = index
            .search(keyword, limit, roots)?
            .into_iter()
            .map(|hit| SearchHit {
                path: hit.path,
                file_type: hit.file_type,
                location: Location::Ai { score: hit.score },
                content: truncate_chars(&hit.text, AI_CONTENT_CHARS),
            })
            .collect();
        Ok(hits)
    }
}
