//! Ingest command implementation

use crate::config::Config;
use crate::embed::create_embedder;
use crate::error::{Error, Result};
use crate::loader::IndexLoader;
use crate::parser::StatuteParser;
use crate::store::QdrantStore;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Statistics from an ingestion run
#[derive(Debug, Default, Serialize)]
pub struct IngestStats {
    pub files_discovered: usize,
    pub sections_parsed: usize,
    pub points_uploaded: usize,
    pub failed_batches: usize,
}

/// Parse every HTML file under `root` and load the results into Qdrant.
///
/// A missing root directory is the one fatal precondition; per-file parse
/// failures and per-batch upload failures only show up in the stats and the
/// trace output.
pub async fn cmd_ingest(config: &Config, root: &Path, workers: Option<usize>) -> Result<IngestStats> {
    if !root.is_dir() {
        return Err(Error::InvalidPath(format!(
            "source directory not found: {}",
            root.display()
        )));
    }

    info!("Ingesting statute HTML from {}", root.display());

    let parser = StatuteParser::new(root).with_max_workers(workers);
    let files_discovered = parser.discover_files().len();
    let sections = parser.parse_directory().await?;

    let mut stats = IngestStats {
        files_discovered,
        sections_parsed: sections.len(),
        ..IngestStats::default()
    };

    if sections.is_empty() {
        warn!("Nothing to load; skipping embedding and upload");
        return Ok(stats);
    }

    let embedder = create_embedder(&config.embedding)?;
    let store = QdrantStore::new(
        &config.qdrant_url,
        &config.collection_name,
        embedder.dimension(),
    )
    .await?;

    let loader = IndexLoader::new(
        &store,
        embedder.as_ref(),
        config.upload_batch_size,
        config.embedding.batch_size,
    );
    let load_stats = loader.load(&sections).await?;

    stats.points_uploaded = load_stats.uploaded;
    stats.failed_batches = load_stats.failed_batches;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let config = Config::default();
        let err = cmd_ingest(&config, Path::new("/nonexistent/statutes"), None)
            .await
            .expect_err("missing root must fail");
        match err {
            Error::InvalidPath(message) => assert!(message.contains("source directory")),
            other => panic!("expected invalid path error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_root_short_circuits_before_embedding() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::default();
        // No model download or Qdrant connection happens for an empty tree
        let stats = cmd_ingest(&config, dir.path(), Some(2)).await.unwrap();
        assert_eq!(stats.files_discovered, 0);
        assert_eq!(stats.sections_parsed, 0);
        assert_eq!(stats.points_uploaded, 0);
    }
}
