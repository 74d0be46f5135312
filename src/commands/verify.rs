//! Verify command: semantic-search smoke check of the loaded index

use crate::config::Config;
use crate::embed::{create_embedder, embed_one};
use crate::error::{Error, Result};
use crate::store::QdrantStore;

const TOP_K: usize = 3;
const HIGH_SCORE: f32 = 0.7;

/// Embed a probe query and print the closest sections with their scores.
///
/// Fatal when the collection does not exist (nothing was ingested yet) or
/// the search returns nothing at all.
pub async fn cmd_verify(config: &Config, query: &str) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let store = QdrantStore::new(
        &config.qdrant_url,
        &config.collection_name,
        embedder.dimension(),
    )
    .await?;

    println!("Qdrant: {}", config.qdrant_url);
    println!("Embedder: {}", embedder.model_name());
    println!("Embedding dimension: {}", embedder.dimension());

    let Some(points_count) = store.points_count().await? else {
        return Err(Error::Qdrant(format!(
            "collection '{}' not found; run 'taxrag ingest' first",
            config.collection_name
        )));
    };
    println!("Collection points: {points_count}");

    println!("\nEmbedding test query: '{query}'");
    let query_vector = embed_one(embedder.as_ref(), query).await?;

    let hits = store.search(query_vector, TOP_K).await?;
    if hits.is_empty() {
        return Err(Error::Qdrant("search returned no results".to_string()));
    }

    println!("\nResults:");
    let mut high_score_count = 0;
    for (rank, hit) in hits.iter().enumerate() {
        let section_number = hit.payload_str("section_number").unwrap_or("Unknown");
        let title = hit.payload_str("title").unwrap_or("Untitled");
        let status = if hit.score > HIGH_SCORE { "✓" } else { "○" };
        println!("  {status} #{}: {section_number}", rank + 1);
        println!("     Title: {title}");
        println!("     Similarity Score: {:.4}", hit.score);
        if hit.score > HIGH_SCORE {
            high_score_count += 1;
        }
    }

    if high_score_count >= 2 {
        println!("\n✓ Semantic search is operational!");
    } else {
        println!("\n○ Semantic search active but scores are lower than expected.");
    }
    println!(
        "Found {}/{} results with high similarity (> {HIGH_SCORE})",
        high_score_count,
        hits.len()
    );

    Ok(())
}
