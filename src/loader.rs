//! Loading parsed sections into the vector index
//!
//! The loader reconciles the target collection against the embedder's
//! dimensionality, embeds every record's content up front, and upserts in
//! fixed-size batches. A failed batch is recorded and skipped; the rest of
//! the load proceeds.

use crate::embed::{embed_in_batches, Embedder};
use crate::error::Result;
use crate::model::TaxSection;
use crate::store::{QdrantStore, SectionPayload, SectionPoint};
use tracing::{debug, info, warn, Instrument};

/// Default number of points per upsert request
pub const DEFAULT_UPLOAD_BATCH_SIZE: usize = 100;

/// Outcome of a load; callers judge completeness from these counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadStats {
    pub uploaded: usize,
    pub failed_batches: usize,
}

/// Decide whether the existing collection must be destroyed and recreated.
/// Re-indexing accepts data loss on a dimension change; this is not a
/// migration path.
pub fn needs_recreate(existing_dimension: Option<usize>, expected: usize) -> bool {
    matches!(existing_dimension, Some(existing) if existing != expected)
}

/// Batched loader from parsed sections into Qdrant
pub struct IndexLoader<'a> {
    store: &'a QdrantStore,
    embedder: &'a dyn Embedder,
    upload_batch_size: usize,
    embed_batch_size: usize,
}

impl<'a> IndexLoader<'a> {
    pub fn new(
        store: &'a QdrantStore,
        embedder: &'a dyn Embedder,
        upload_batch_size: usize,
        embed_batch_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            upload_batch_size: upload_batch_size.max(1),
            embed_batch_size: embed_batch_size.max(1),
        }
    }

    /// Ensure the collection exists with the embedder's dimensionality,
    /// recreating it when the dimensions disagree.
    pub async fn ensure_collection(&self) -> Result<()> {
        let expected = self.embedder.dimension();
        let existing = self.store.collection_dimension().await?;

        match existing {
            None => self.store.create_collection().await,
            Some(dim) if needs_recreate(Some(dim), expected) => {
                info!(
                    "Vector size mismatch: collection={}, embedder={}. Recreating collection.",
                    dim, expected
                );
                self.store.delete_collection().await?;
                self.store.create_collection().await
            }
            Some(_) => {
                debug!(
                    "Collection {} already exists with dimension {}",
                    self.store.collection_name(),
                    expected
                );
                Ok(())
            }
        }
    }

    /// Embed and upsert all sections. Returns per-load statistics; a batch
    /// failure never aborts the remaining batches.
    pub async fn load(&self, sections: &[TaxSection]) -> Result<LoadStats> {
        self.ensure_collection().await?;

        if sections.is_empty() {
            return Ok(LoadStats::default());
        }

        let vector_size = self.embedder.dimension();
        let span = tracing::info_span!(
            "qdrant_upload",
            collection = %self.store.collection_name(),
            batch_size = self.upload_batch_size as u64,
            total_sections = sections.len() as u64,
            vector_size = vector_size as u64,
        );

        async {
            // Embed all section content up front
            let texts: Vec<String> = sections.iter().map(|s| s.content.clone()).collect();
            let embeddings =
                embed_in_batches(self.embedder, texts, self.embed_batch_size).await?;

            let model_name = self.embedder.model_name().to_string();
            let mut stats = LoadStats::default();

            for (batch_index, (batch, batch_embeddings)) in sections
                .chunks(self.upload_batch_size)
                .zip(embeddings.chunks(self.upload_batch_size))
                .enumerate()
            {
                let batch_start = batch_index * self.upload_batch_size;
                let points: Vec<SectionPoint> = batch
                    .iter()
                    .zip(batch_embeddings.iter())
                    .map(|(section, vector)| SectionPoint {
                        id: section.id,
                        vector: vector.clone(),
                        payload: SectionPayload::from_section(section, &model_name, vector_size),
                    })
                    .collect();

                match self.store.upsert_points(points).await {
                    Ok(()) => {
                        debug!(
                            batch_start = batch_start as u64,
                            batch_size = batch.len() as u64,
                            "batch_uploaded"
                        );
                        stats.uploaded += batch.len();
                    }
                    Err(e) => {
                        warn!(
                            batch_start = batch_start as u64,
                            batch_size = batch.len() as u64,
                            error = %e,
                            "upload_error"
                        );
                        stats.failed_batches += 1;
                    }
                }
            }

            info!(
                "Upload complete: {} points upserted, {} failed batches",
                stats.uploaded, stats.failed_batches
            );
            Ok(stats)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_recreate_on_dimension_mismatch() {
        assert!(needs_recreate(Some(768), 384));
        assert!(!needs_recreate(Some(384), 384));
        // Missing collection is a create, not a recreate
        assert!(!needs_recreate(None, 384));
    }

    #[test]
    fn test_batch_splitting() {
        let sections: Vec<u32> = (0..250).collect();
        let chunks: Vec<_> = sections.chunks(DEFAULT_UPLOAD_BATCH_SIZE).collect();
        assert_eq!(chunks.len(), 3); // 100 + 100 + 50
        assert_eq!(chunks[2].len(), 50);
    }

    struct StubEmbedder {
        dimension: usize,
    }

    #[async_trait::async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.5; self.dimension]).collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    // Integration test - requires a running Qdrant
    #[tokio::test]
    #[ignore] // Run manually with: cargo test -- --ignored
    async fn test_ensure_collection_recreates_on_mismatch() {
        let collection = format!("taxrag_test_{}", uuid::Uuid::new_v4().simple());
        let url = crate::config::default_qdrant_url();

        let narrow = QdrantStore::new(&url, &collection, 3).await.unwrap();
        narrow.create_collection().await.unwrap();
        assert_eq!(narrow.collection_dimension().await.unwrap(), Some(3));

        let wide = QdrantStore::new(&url, &collection, 4).await.unwrap();
        let embedder = StubEmbedder { dimension: 4 };
        let loader = IndexLoader::new(&wide, &embedder, 100, 32);
        loader.ensure_collection().await.unwrap();

        assert_eq!(wide.collection_dimension().await.unwrap(), Some(4));
        wide.delete_collection().await.unwrap();
    }
}
