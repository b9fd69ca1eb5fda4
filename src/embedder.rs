//! Sentence embeddings for incoming questions.
//!
//! The corpus embeddings are computed offline, so the query encoder has to be
//! the same model that produced them or nearest-neighbour distances are
//! meaningless. Only the dimension can be checked at startup.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::utils::ensure_dir;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("unknown embedding model '{0}'")]
    UnknownModel(String),

    #[error("failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("failed to generate embedding: {0}")]
    Embedding(String),
}

/// Maps text to a fixed-length vector.
pub trait Encoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    fn dimensions(&self) -> usize;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Sentence-transformers style model name.
    pub model: String,
    /// Where model files are cached; defaults to the user cache directory.
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

impl EncoderConfig {
    pub fn embedding_model(&self) -> Result<EmbeddingModel, EmbedError> {
        let name = self.model.trim();
        let name = name.strip_prefix("sentence-transformers/").unwrap_or(name);
        let name = name.strip_prefix("BAAI/").unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
            "paraphrase-multilingual-minilm-l12-v2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            _ => Err(EmbedError::UnknownModel(self.model.clone())),
        }
    }

    fn resolved_cache_dir(&self) -> Result<PathBuf, EmbedError> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        dirs::cache_dir()
            .map(|dir| dir.join("law-rag").join("models"))
            .ok_or_else(|| EmbedError::ModelInit("could not determine cache directory".into()))
    }
}

/// Local ONNX sentence-embedding model.
pub struct FastEmbedEncoder {
    model: Mutex<TextEmbedding>,
    dimensions: usize,
}

impl FastEmbedEncoder {
    /// Loads (downloading on first use) the configured model and probes its
    /// output dimension.
    pub fn load(config: &EncoderConfig) -> Result<Self, EmbedError> {
        let model = config.embedding_model()?;
        let cache_dir = config.resolved_cache_dir()?;
        ensure_dir(&cache_dir).map_err(|e| {
            EmbedError::ModelInit(format!("cannot create {}: {e}", cache_dir.display()))
        })?;

        tracing::info!(
            model = %config.model,
            cache = %cache_dir.display(),
            "loading embedding model"
        );

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(config.show_download_progress),
        )
        .map_err(|e| EmbedError::ModelInit(e.to_string()))?;

        let probe = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| EmbedError::ModelInit(e.to_string()))?;
        let dimensions = probe
            .first()
            .map(Vec::len)
            .filter(|d| *d > 0)
            .ok_or_else(|| EmbedError::ModelInit("model produced an empty embedding".into()))?;

        Ok(Self {
            model: Mutex::new(text_model),
            dimensions,
        })
    }
}

impl Encoder for FastEmbedEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbedError::Embedding("embedding model lock poisoned".into()))?;
        let mut embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbedError::Embedding(e.to_string()))?;
        if embeddings.is_empty() {
            return Err(EmbedError::Embedding("model returned no embedding".into()));
        }
        Ok(embeddings.swap_remove(0))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
