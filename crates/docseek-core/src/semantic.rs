//! AI search: chunk indexed documents, embed them and query by similarity
//!
//! The AI index is built from the full-text index rather than from the
//! filesystem, so it only ever contains what the keyword index holds.
//! Bookkeeping of which documents are embedded (content hash and the point
//! id range of their chunks) lives in `.docseek/ai_files.json`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};

use crate::db::IndexedDocument;
use crate::embed::Embedder;
use crate::index::{ProgressCallback, ProgressEvent};
use crate::storage::{DocChunkPayload, Storage};
use crate::{discover, CancelFlag, Config, DsError, Result, EMBED_BATCH_SIZE};

/// Search results fetched per requested result when filtering by root.
const ROOT_FILTER_OVERFETCH: usize = 5;

/// Words whose presence in a query pulls in related terms.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("file", &["document", "file"]),
    ("document", &["file", "document", "paper"]),
    ("search", &["find", "look", "seek", "locate"]),
    ("open", &["access", "view", "read"]),
    ("save", &["store", "keep", "preserve"]),
    ("delete", &["remove", "erase", "clear"]),
    ("create", &["make", "build", "generate"]),
    ("update", &["modify", "change", "edit"]),
    ("error", &["problem", "issue", "bug", "fault"]),
    ("help", &["support", "assist", "guide"]),
    ("test", &["check", "verify", "validate"]),
    ("install", &["setup", "configure", "deploy"]),
    ("download", &["get", "fetch", "retrieve"]),
    ("upload", &["send", "transfer", "submit"]),
    ("email", &["mail", "message", "correspondence"]),
    ("meeting", &["conference", "appointment", "session"]),
    ("project", &["task", "assignment", "work"]),
    ("budget", &["cost", "expense", "financial"]),
    ("report", &["summary", "analysis", "documentation"]),
    ("data", &["information", "records", "details"]),
];

/// Split document content into chunks of roughly `max_chunk` characters.
///
/// Content that fits is returned whole. Otherwise sentences (separated by
/// `". "`) are packed greedily; a single sentence longer than `max_chunk`
/// becomes a chunk of its own.
pub fn split_content(content: &str, max_chunk: usize) -> Vec<String> {
    if content.chars().count() <= max_chunk {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in content.split(". ") {
        let sentence_len = sentence.chars().count();
        if current_len + sentence_len < max_chunk {
            current.push_str(sentence);
            current.push_str(". ");
            current_len += sentence_len + 2;
        } else {
            if !current.trim().is_empty() {
                chunks.push(current.trim().to_string());
            }
            current = format!("{sentence}. ");
            current_len = sentence_len + 2;
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    if chunks.is_empty() {
        vec![content.to_string()]
    } else {
        chunks
    }
}

/// Lowercase the query and append related terms for known words.
pub fn expand_query(query: &str) -> String {
    let mut expanded = query.to_lowercase();
    let lowered = expanded.clone();
    for (word, related) in SYNONYMS {
        if lowered.contains(word) {
            expanded.push(' ');
            expanded.push_str(&related.join(" "));
        }
    }
    expanded
}

/// A document's entry in the AI bookkeeping file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiFileEntry {
    pub root: String,
    pub file_type: String,
    /// Blake3 hash of the indexed content
    pub hash: String,
    pub chunk_count: usize,
    /// First point id; chunks use consecutive ids
    pub start_id: u64,
}

impl AiFileEntry {
    fn point_ids(&self) -> Vec<u64> {
        (self.start_id..self.start_id + self.chunk_count as u64).collect()
    }
}

/// Contents of `.docseek/ai_files.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AiFileIndex {
    /// Document path -> entry
    pub files: HashMap<String, AiFileEntry>,
    /// Next available point ID
    pub next_id: u64,
}

impl AiFileIndex {
    pub fn load(workspace: &Path) -> Result<Self> {
        let path = discover::ai_files_path(workspace);
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, workspace: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(discover::ai_files_path(workspace), content)?;
        Ok(())
    }

    /// Forget every document of `root`, returning the point ids to delete.
    fn take_root(&mut self, root: &str) -> (usize, Vec<u64>) {
        let paths: Vec<String> = self
            .files
            .iter()
            .filter(|(_, entry)| entry.root == root)
            .map(|(path, _)| path.clone())
            .collect();

        let mut ids = Vec::new();
        for path in &paths {
            if let Some(entry) = self.files.remove(path) {
                ids.extend(entry.point_ids());
            }
        }
        (paths.len(), ids)
    }
}

/// Stats from an AI index build.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AiBuildStats {
    pub documents_indexed: usize,
    pub documents_unchanged: usize,
    pub documents_removed: usize,
    pub chunks_created: usize,
    pub cancelled: bool,
}

/// Summary shown by `ai status`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AiIndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub points: usize,
    pub size_bytes: u64,
}

/// One AI search result.
#[derive(Debug, Clone)]
pub struct AiHit {
    pub path: String,
    pub root: String,
    pub file_type: String,
    pub text: String,
    pub score: f32,
}

/// The vector index over the workspace's documents.
pub struct SemanticIndex {
    workspace: PathBuf,
    config: Config,
    storage: Storage,
    files: AiFileIndex,
    embedder: Option<Embedder>,
    progress_callback: Option<ProgressCallback>,
}

impl SemanticIndex {
    /// Open the AI index of a workspace. The embedding model is loaded on
    /// first use.
    pub fn open(workspace: &Path) -> Result<Self> {
        let config = Config::load(workspace)?;
        let storage = Storage::open(&discover::shard_dir(workspace), config.dimension)?;
        let files = AiFileIndex::load(workspace)?;

        Ok(Self {
            workspace: workspace.to_path_buf(),
            config,
            storage,
            files,
            embedder: None,
            progress_callback: None,
        })
    }

    /// Set a callback to receive progress updates during a build.
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress_callback = Some(callback);
    }

    fn emit_progress(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.progress_callback {
            callback(event);
        }
    }

    fn take_embedder(&mut self) -> Result<Embedder> {
        match self.embedder.take() {
            Some(embedder) => Ok(embedder),
            None => Embedder::new(&self.config),
        }
    }

    /// Bring the vector index in line with the full-text index.
    pub fn build(
        &mut self,
        documents: Vec<IndexedDocument>,
        cancel: &CancelFlag,
    ) -> Result<AiBuildStats> {
        if documents.is_empty() {
            return Err(DsError::EmptyIndex);
        }

        let documents = unique_documents(documents);
        let mut stats = AiBuildStats::default();

        let present: HashSet<&str> = documents.iter().map(|d| d.path.as_str()).collect();
        let vanished: Vec<String> = self
            .files
            .files
            .keys()
            .filter(|path| !present.contains(path.as_str()))
            .cloned()
            .collect();
        self.emit_progress(ProgressEvent::Removing {
            count: vanished.len(),
        });
        for path in vanished {
            if let Some(entry) = self.files.files.remove(&path) {
                self.storage.delete(entry.point_ids())?;
                stats.documents_removed += 1;
            }
        }

        let mut pending = Vec::new();
        for document in documents {
            let hash = blake3::hash(document.content.as_bytes()).to_hex().to_string();
            match self.files.files.get(&document.path) {
                Some(existing) if existing.hash == hash => stats.documents_unchanged += 1,
                Some(existing) => {
                    self.storage.delete(existing.point_ids())?;
                    pending.push((document, hash));
                }
                None => pending.push((document, hash)),
            }
        }

        if !pending.is_empty() {
            let embedder = self.take_embedder()?;
            let result = self.embed_documents(&embedder, pending, cancel, &mut stats);
            self.embedder = Some(embedder);
            result?;
        }

        self.files.save(&self.workspace)?;
        self.storage.flush();

        tracing::info!(?stats, "AI index build finished");
        Ok(stats)
    }

    fn embed_documents(
        &mut self,
        embedder: &Embedder,
        pending: Vec<(IndexedDocument, String)>,
        cancel: &CancelFlag,
        stats: &mut AiBuildStats,
    ) -> Result<()> {
        let total = pending.len();
        for (i, (document, hash)) in pending.into_iter().enumerate() {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            self.emit_progress(ProgressEvent::Indexing {
                current: i + 1,
                total,
                path: Path::new(&document.path),
            });

            let chunks = if document.content.trim().is_empty() {
                Vec::new()
            } else {
                split_content(&document.content, self.config.chunk_size)
            };

            let start_id = self.files.next_id;
            for (batch_no, batch) in chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
                let texts: Vec<&str> = batch.iter().map(String::as_str).collect();
                let embeddings = embedder.embed_batch(&texts)?;
                let offset = batch_no * EMBED_BATCH_SIZE;

                let points = batch
                    .iter()
                    .zip(embeddings)
                    .enumerate()
                    .map(|(j, (text, vector))| {
                        let chunk_index = offset + j;
                        let payload = DocChunkPayload {
                            path: document.path.clone(),
                            root: document.root.clone(),
                            file_type: document.file_type.clone(),
                            chunk_index,
                            total_chunks: chunks.len(),
                            text: text.clone(),
                            content_hash: hash.clone(),
                        };
                        (start_id + chunk_index as u64, vector, payload)
                    })
                    .collect();
                self.storage.upsert(points)?;

                self.emit_progress(ProgressEvent::Embedding {
                    current: (offset + batch.len()).min(chunks.len()),
                    total: chunks.len(),
                });
            }

            tracing::debug!("embedded {} ({} chunks)", document.path, chunks.len());
            stats.documents_indexed += 1;
            stats.chunks_created += chunks.len();
            self.files.next_id = start_id + chunks.len() as u64;
            self.files.files.insert(
                document.path,
                AiFileEntry {
                    root: document.root,
                    file_type: document.file_type,
                    hash,
                    chunk_count: chunks.len(),
                    start_id,
                },
            );
        }
        Ok(())
    }

    /// Similarity search. With `roots`, only hits under one of them are kept.
    pub fn search(
        &mut self,
        query: &str,
        limit: usize,
        roots: Option<&[String]>,
    ) -> Result<Vec<AiHit>> {
        if self.files.files.is_empty() {
            return Ok(Vec::new());
        }

        let expanded = expand_query(query);
        tracing::debug!("expanded AI query: {expanded}");

        let embedder = self.take_embedder()?;
        let embedding = embedder.embed(&expanded);
        self.embedder = Some(embedder);

        let fetch = match roots {
            Some(_) => limit.saturating_mul(ROOT_FILTER_OVERFETCH),
            None => limit,
        };
        let chunks = self.storage.search(embedding?, fetch)?;

        let hits = chunks
            .into_iter()
            .filter(|chunk| match roots {
                Some(roots) => roots
                    .iter()
                    .any(|root| Path::new(&chunk.payload.path).starts_with(root)),
                None => true,
            })
            .take(limit)
            .map(|chunk| AiHit {
                path: chunk.payload.path,
                root: chunk.payload.root,
                file_type: chunk.payload.file_type,
                text: chunk.payload.text,
                score: chunk.score,
            })
            .collect();

        Ok(hits)
    }

    /// Drop the vectors of every document owned by `root`.
    pub fn remove_root(&mut self, root: &str) -> Result<usize> {
        let (documents, ids) = self.files.take_root(root);
        if documents == 0 {
            return Ok(0);
        }

        self.storage.delete(ids)?;
        self.files.save(&self.workspace)?;
        self.storage.flush();
        tracing::info!("removed {documents} documents of {root} from the AI index");
        Ok(documents)
    }

    pub fn stats(&self) -> Result<AiIndexStats> {
        Ok(AiIndexStats {
            documents: self.files.files.len(),
            chunks: self.files.files.values().map(|e| e.chunk_count).sum(),
            points: self.storage.count()?,
            size_bytes: directory_size(&discover::shard_dir(&self.workspace)),
        })
    }

    /// Delete the shard and the bookkeeping file of a workspace.
    pub fn clear(workspace: &Path) -> Result<()> {
        let shard = discover::shard_dir(workspace);
        if shard.exists() {
            std::fs::remove_dir_all(&shard)?;
        }
        let files = discover::ai_files_path(workspace);
        if files.exists() {
            std::fs::remove_file(&files)?;
        }
        tracing::info!("AI index cleared");
        Ok(())
    }
}

/// Drop repeated paths, keeping the first row. Nested roots index the same
/// file once per root; the bookkeeping holds one entry per path.
fn unique_documents(documents: Vec<IndexedDocument>) -> Vec<IndexedDocument> {
    let mut seen = HashSet::new();
    documents
        .into_iter()
        .filter(|document| seen.insert(document.path.clone()))
        .collect()
}

/// Total size of the files under `dir`.
fn directory_size(dir: &Path) -> u64 {
    WalkBuilder::new(dir)
        .standard_filters(false)
        .build()
        .flatten()
        .filter_map(|entry| entry.metadata().ok())
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_split_short_content() {
        assert_eq!(split_content("one. two", 100), vec!["one. two".to_string()]);
    }

    #[test]
    fn test_split_packs_sentences() {
        let content = "alpha beta. gamma delta. epsilon zeta. eta theta";
        let chunks = split_content(content, 26);
        assert_eq!(
            chunks,
            vec![
                "alpha beta. gamma delta.".to_string(),
                "epsilon zeta. eta theta.".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_long_sentence_stays_whole() {
        let sentence = "x".repeat(30);
        let content = format!("{sentence}. short");
        let chunks = split_content(&content, 20);
        assert_eq!(chunks, vec![format!("{sentence}."), "short.".to_string()]);
    }

    #[test]
    fn test_expand_query() {
        assert_eq!(expand_query("Quarterly"), "quarterly");
        assert_eq!(
            expand_query("Budget Meeting"),
            "budget meeting conference appointment session cost expense financial"
        );
    }

    #[test]
    fn test_take_root() {
        let mut index = AiFileIndex::default();
        let entry = |root: &str, start_id| AiFileEntry {
            root: root.to_string(),
            file_type: "TXT".to_string(),
            hash: "h".to_string(),
            chunk_count: 2,
            start_id,
        };
        index.files.insert("/a/1.txt".to_string(), entry("/a", 0));
        index.files.insert("/b/2.txt".to_string(), entry("/b", 2));
        index.next_id = 4;

        let (documents, mut ids) = index.take_root("/a");
        ids.sort();
        assert_eq!(documents, 1);
        assert_eq!(ids, vec![0, 1]);
        assert!(index.files.contains_key("/b/2.txt"));
        assert_eq!(index.take_root("/missing"), (0, vec![]));
    }

    #[test]
    fn test_nested_roots_keep_one_document_per_path() {
        let document = |root: &str| IndexedDocument {
            path: "/work/projects/plan.txt".to_string(),
            root: root.to_string(),
            file_type: "TXT".to_string(),
            content: "budget plan".to_string(),
        };
        let other = IndexedDocument {
            path: "/work/notes.txt".to_string(),
            ..document("/work")
        };

        let unique = unique_documents(vec![
            document("/work"),
            other,
            document("/work/projects"),
        ]);
        let paths: Vec<(&str, &str)> = unique
            .iter()
            .map(|d| (d.path.as_str(), d.root.as_str()))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("/work/projects/plan.txt", "/work"),
                ("/work/notes.txt", "/work"),
            ]
        );
    }

    #[test]
    fn test_file_index_roundtrip_and_clear() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(discover::ds_dir(temp.path())).unwrap();

        let mut index = AiFileIndex::default();
        index.next_id = 7;
        index.save(temp.path()).unwrap();
        assert_eq!(AiFileIndex::load(temp.path()).unwrap().next_id, 7);

        fs::create_dir_all(discover::shard_dir(temp.path())).unwrap();
        fs::write(discover::shard_dir(temp.path()).join("segment"), [0u8; 10]).unwrap();
        assert_eq!(directory_size(&discover::shard_dir(temp.path())), 10);

        SemanticIndex::clear(temp.path()).unwrap();
        assert!(!discover::shard_dir(temp.path()).exists());
        assert_eq!(AiFileIndex::load(temp.path()).unwrap().next_id, 0);
    }
}
