//! Embedding generation
//!
//! An [`Embedder`] trait abstracts over embedding backends; the default
//! backend is fastembed running locally. Embedding output order always
//! matches input order, and the dimension is fixed for the lifetime of a
//! loaded model.

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; output order matches input order 1:1.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    #[cfg(feature = "local-embed")]
    {
        let embedder = FastEmbedder::new(config)?;
        Ok(Box::new(embedder))
    }
    #[cfg(not(feature = "local-embed"))]
    {
        let _ = config;
        Err(Error::Embedding(
            "taxrag was built without the local-embed feature".to_string(),
        ))
    }
}

/// Embed a single text
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed(vec![text.to_string()]).await?;
    vectors
        .pop()
        .ok_or_else(|| Error::Embedding("embedder returned no vector".to_string()))
}

/// Helper to embed in batches
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size.max(1)) {
        let embeddings = embedder.embed(chunk.to_vec()).await?;
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}

/// FastEmbed-based embedder
#[cfg(feature = "local-embed")]
pub struct FastEmbedder {
    model: std::sync::Arc<tokio::sync::Mutex<fastembed::TextEmbedding>>,
    model_name: String,
    dimension: usize,
}

#[cfg(feature = "local-embed")]
impl FastEmbedder {
    /// Create a new FastEmbed embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
        use tracing::{debug, info};

        info!("Initializing FastEmbed with model: {}", config.model);

        let model_enum = match config.model.as_str() {
            "BAAI/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "BAAI/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            "BAAI/bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
            "sentence-transformers/all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            _ => {
                debug!(
                    "Unknown model '{}', using default BGESmallENV15",
                    config.model
                );
                EmbeddingModel::BGESmallENV15
            }
        };

        let options = InitOptions::new(model_enum).with_show_download_progress(true);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| Error::Embedding(format!("Failed to initialize model: {}", e)))?;

        info!("FastEmbed model loaded successfully");

        Ok(Self {
            model: std::sync::Arc::new(tokio::sync::Mutex::new(model)),
            model_name: config.model.clone(),
            dimension: config.resolved_dimension(),
        })
    }
}

#[cfg(feature = "local-embed")]
#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        use tracing::Instrument;

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let span = tracing::info_span!(
            "embed_batch",
            batch_size = texts.len() as u64,
            model = %self.model_name,
        );

        // FastEmbed is synchronous, so we wrap in a blocking task
        let model = self.model.clone();
        async move {
            let embeddings = tokio::task::spawn_blocking(move || {
                let model = model.blocking_lock();
                model.embed(texts, None)
            })
            .await
            .map_err(|e| Error::Embedding(format!("Task join error: {}", e)))?
            .map_err(|e| Error::Embedding(format!("Embedding failed: {}", e)))?;

            Ok(embeddings)
        }
        .instrument(span)
        .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
