//! Embedding generation using fastembed

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::{Config, DsError, Result};

/// Model ids accepted in `config.json`.
pub const SUPPORTED_MODELS: [&str; 5] = [
    "all-MiniLM-L6-v2",
    "all-MiniLM-L12-v2",
    "bge-small-en-v1.5",
    "bge-base-en-v1.5",
    "paraphrase-multilingual-MiniLM-L12-v2",
];

/// Map a model id to its fastembed model.
pub fn model_for(id: &str) -> Result<EmbeddingModel> {
    match id {
        "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-MiniLM-L12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        // Handles non-English documents
        "paraphrase-multilingual-MiniLM-L12-v2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        other => Err(DsError::Embedding(format!(
            "Unknown model: {}. Supported: {}",
            other,
            SUPPORTED_MODELS.join(", ")
        ))),
    }
}

/// Wrapper around fastembed for generating embeddings.
pub struct Embedder {
    model: TextEmbedding,
}

impl Embedder {
    /// Load the model named in the config, downloading it on first use.
    pub fn new(config: &Config) -> Result<Self> {
        let model_type = model_for(&config.model)?;
        tracing::info!("loading embedding model {}", config.model);

        let model =
            TextEmbedding::try_new(InitOptions::new(model_type).with_show_download_progress(true))
                .map_err(|e| DsError::Embedding(e.to_string()))?;

        Ok(Self { model })
    }

    /// Generate embeddings for a batch of texts.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| DsError::Embedding(e.to_string()))
    }

    /// Generate embedding for a single text.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| DsError::Embedding("No embedding generated".to_string()))
    }
}
