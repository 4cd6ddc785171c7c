//! Embedding generation for episode retrieval.
//!
//! Two backends implement the [`Embedder`] trait: [`FastembedEmbedder`] runs
//! a real sentence-transformer through fastembed with a lazily loaded model,
//! and [`HashingEmbedder`] maps tokens to hashed buckets for deterministic,
//! offline operation (tests, dry runs). Both produce fixed-dimension `f32`
//! vectors compared by squared L2 distance downstream.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task;
use tracing::{debug, info, instrument};

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Failed to generate embeddings: {0}")]
    Generation(String),

    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Embedder configuration error: {0}")]
    Config(String),
}

/// Turns episode text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;
}

/// Which backend to build and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_provider() -> String {
    "fastembed".to_string()
}

fn default_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_dimension() -> usize {
    384
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimension: default_dimension(),
        }
    }
}

pub fn build_embedder(config: &EmbedderConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match config.provider.as_str() {
        "fastembed" => Ok(Arc::new(FastembedEmbedder::from_config(
            &config.model,
            config.dimension,
        )?)),
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimension)?)),
        other => Err(EmbeddingError::Config(format!(
            "Unknown embedder provider: {other}"
        ))),
    }
}

/// Sentence-transformer embedder backed by fastembed.
///
/// The model weights are loaded on the first embed call and shared across
/// all subsequent calls.
pub struct FastembedEmbedder {
    model_name: EmbeddingModel,
    dimension: usize,
    model: OnceCell<Arc<TextEmbedding>>,
}

impl FastembedEmbedder {
    /// Creates an embedder from a model name string.
    ///
    /// Returns an error if the model name is not recognized.
    pub fn from_model_str(model_name: &str) -> Result<Self, EmbeddingError> {
        let (model, dimension) = match model_name {
            "all-MiniLM-L6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
            "all-MiniLM-L12-v2" => (EmbeddingModel::AllMiniLML12V2, 384),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            "bge-large-en-v1.5" => (EmbeddingModel::BGELargeENV15, 1024),
            "nomic-embed-text-v1.5" => (EmbeddingModel::NomicEmbedTextV15, 768),
            "multilingual-e5-small" => (EmbeddingModel::MultilingualE5Small, 384),
            _ => {
                return Err(EmbeddingError::ModelInit(format!(
                    "Unknown embedding model: '{model_name}'. Supported models: \
                     all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
                     nomic-embed-text-v1.5, multilingual-e5-small, etc."
                )));
            }
        };
        Ok(Self {
            model_name: model,
            dimension,
            model: OnceCell::new(),
        })
    }

    /// Creates an embedder from config, validating that the configured
    /// dimension matches what the model actually produces.
    pub fn from_config(model_name: &str, expected_dim: usize) -> Result<Self, EmbeddingError> {
        let embedder = Self::from_model_str(model_name)?;
        if embedder.dimension != expected_dim {
            return Err(EmbeddingError::ModelInit(format!(
                "Dimension mismatch: model '{}' produces {}-dim vectors but config specifies {}",
                model_name, embedder.dimension, expected_dim
            )));
        }
        Ok(embedder)
    }

    #[instrument(skip(self))]
    fn get_or_init_model(&self) -> Result<Arc<TextEmbedding>, EmbeddingError> {
        self.model
            .get_or_try_init(|| {
                info!(model = ?self.model_name, "Initializing embedding model");

                let options =
                    InitOptions::new(self.model_name.clone()).with_show_download_progress(true);
                let model = TextEmbedding::try_new(options)
                    .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

                info!(
                    model = ?self.model_name,
                    dimension = self.dimension,
                    "Embedding model initialized successfully"
                );

                Ok(Arc::new(model))
            })
            .cloned()
    }
}

impl Default for FastembedEmbedder {
    fn default() -> Self {
        Self {
            model_name: EmbeddingModel::AllMiniLML6V2,
            dimension: 384,
            model: OnceCell::new(),
        }
    }
}

#[async_trait]
impl Embedder for FastembedEmbedder {
    /// The model is lazily loaded on first call; fastembed is synchronous, so
    /// the work runs on a blocking task.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let model = self.get_or_init_model()?;
        let text = text.to_string();

        let embeddings = task::spawn_blocking(move || {
            model
                .embed(vec![text], None)
                .map_err(|e| EmbeddingError::Generation(e.to_string()))
        })
        .await??;

        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Generation("Empty embedding result".into()))?;

        debug!(dimension = embedding.len(), "Generated embedding");
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic feature-hashing embedder.
///
/// Lowercased alphanumeric tokens are hashed into `dimension` buckets and
/// counted, then the vector is L2-normalized so that texts sharing more
/// tokens land closer together. No model download, no randomness, same
/// vector for the same text on every run.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    const MIN_DIMENSION: usize = 8;

    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension < Self::MIN_DIMENSION {
            return Err(EmbeddingError::Config(format!(
                "Hashing embedder needs at least {} dimensions, got {}",
                Self::MIN_DIMENSION,
                dimension
            )));
        }
        Ok(Self { dimension })
    }

    fn bucket(&self, token: &str) -> usize {
        // DefaultHasher::new() uses fixed keys, so buckets are stable across
        // processes.
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            vector[self.bucket(&token)] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
