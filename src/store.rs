//! Qdrant vector database integration
//!
//! Wraps the Qdrant client with the handful of operations the pipeline
//! needs: collection management, point upsert and vector search. Points
//! carry a flattened [`SectionPayload`] so the store is queryable without
//! this crate's types.

use crate::error::{Error, Result};
use crate::model::TaxSection;
use qdrant_client::qdrant::{
    value::Kind, CreateCollectionBuilder, Distance, GetCollectionInfoResponse, ListValue, PointId,
    PointStruct, SearchPointsBuilder, Struct, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

/// Qdrant store handle
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Create a new store connection
    pub async fn new(url: &str, collection: &str, dimension: usize) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Get the expected vector dimension for this store
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Check if the collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        let exists = self.client.collection_exists(&self.collection).await?;
        Ok(exists)
    }

    /// Vector dimension of the existing collection, if any
    pub async fn collection_dimension(&self) -> Result<Option<usize>> {
        if !self.collection_exists().await? {
            return Ok(None);
        }
        let info = self.client.collection_info(&self.collection).await?;
        Ok(extract_vector_size(&info).map(|size| size as usize))
    }

    /// Create the collection with this store's dimension and cosine distance
    pub async fn create_collection(&self) -> Result<()> {
        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );

        let vectors_config = VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(vectors_config),
            )
            .await?;

        Ok(())
    }

    /// Delete the collection if it exists
    pub async fn delete_collection(&self) -> Result<bool> {
        if !self.collection_exists().await? {
            return Ok(false);
        }

        info!("Deleting collection {}", self.collection);
        self.client.delete_collection(&self.collection).await?;
        Ok(true)
    }

    /// Number of points in the collection; `None` when it does not exist
    pub async fn points_count(&self) -> Result<Option<u64>> {
        if !self.collection_exists().await? {
            return Ok(None);
        }
        let info = self.client.collection_info(&self.collection).await?;
        Ok(Some(
            info.result.and_then(|r| r.points_count).unwrap_or(0),
        ))
    }

    /// Upsert SectionPoint objects (converts to PointStruct internally)
    pub async fn upsert_points(&self, points: Vec<SectionPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        if let Some(mismatch) = points.iter().find(|p| p.vector.len() != self.dimension) {
            return Err(Error::Qdrant(format!(
                "Vector dimension mismatch for collection '{}': expected {} (got {})",
                self.collection,
                self.dimension,
                mismatch.vector.len()
            )));
        }

        debug!(
            "Upserting {} points to collection {}",
            points.len(),
            self.collection
        );

        let point_structs: Vec<PointStruct> =
            points.into_iter().map(|p| p.to_point_struct()).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, point_structs))
            .await?;

        Ok(())
    }

    /// Search for similar vectors
    pub async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SearchHit>> {
        debug!(
            "Searching collection {} with limit {}",
            self.collection, limit
        );

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query_vector, limit as u64)
                    .with_payload(true),
            )
            .await?;

        let hits = response
            .result
            .into_iter()
            .map(|p| SearchHit {
                id: point_id_to_string(p.id),
                score: p.score,
                payload: p.payload,
            })
            .collect();

        Ok(hits)
    }
}

fn extract_vector_size(info: &GetCollectionInfoResponse) -> Option<u64> {
    let params = info
        .result
        .as_ref()?
        .config
        .as_ref()?
        .params
        .as_ref()?
        .vectors_config
        .as_ref()?
        .config
        .as_ref()?;

    match params {
        qdrant_client::qdrant::vectors_config::Config::Params(p) => Some(p.size),
        // Named vectors are never created by this pipeline
        qdrant_client::qdrant::vectors_config::Config::ParamsMap(_) => None,
    }
}

/// A search result with its raw payload
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    payload: HashMap<String, QdrantValue>,
}

impl SearchHit {
    /// String payload field, if present and a string
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        match self.payload.get(key)?.kind.as_ref()? {
            Kind::StringValue(s) => Some(s),
            _ => None,
        }
    }
}

/// A point ready to be upserted to Qdrant
#[derive(Debug, Clone)]
pub struct SectionPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: SectionPayload,
}

impl SectionPoint {
    /// Convert to qdrant-client PointStruct
    pub fn to_point_struct(self) -> PointStruct {
        let payload_map = self.payload.to_qdrant_payload();
        PointStruct::new(self.id.to_string(), self.vector, payload_map)
    }
}

/// Flattened record payload stored with each point.
///
/// Dates are RFC 3339 strings and the section type is its lowercase string
/// value; the embedding model name and dimension ride along for provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionPayload {
    pub section_number: String,
    pub title: String,
    pub content: String,
    pub hierarchy: Vec<String>,
    pub section_type: String,
    pub subsections: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    pub metadata: BTreeMap<String, String>,
    pub created_at: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
}

impl SectionPayload {
    pub fn from_section(section: &TaxSection, embedding_model: &str, embedding_dim: usize) -> Self {
        Self {
            section_number: section.section_number.clone(),
            title: section.title.clone(),
            content: section.content.clone(),
            hierarchy: section.hierarchy.clone(),
            section_type: section.section_type.as_str().to_string(),
            subsections: section.subsections.clone(),
            effective_date: section.effective_date.map(|d| d.to_rfc3339()),
            source_url: section.source_url.clone(),
            metadata: section.metadata.clone(),
            created_at: section.created_at.to_rfc3339(),
            embedding_model: embedding_model.to_string(),
            embedding_dim,
        }
    }

    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert(
            "section_number".to_string(),
            string_to_qdrant(&self.section_number),
        );
        map.insert("title".to_string(), string_to_qdrant(&self.title));
        map.insert("content".to_string(), string_to_qdrant(&self.content));
        map.insert("hierarchy".to_string(), list_to_qdrant(&self.hierarchy));
        map.insert(
            "section_type".to_string(),
            string_to_qdrant(&self.section_type),
        );
        map.insert("subsections".to_string(), list_to_qdrant(&self.subsections));

        if let Some(ref effective_date) = self.effective_date {
            map.insert("effective_date".to_string(), string_to_qdrant(effective_date));
        }
        if let Some(ref source_url) = self.source_url {
            map.insert("source_url".to_string(), string_to_qdrant(source_url));
        }

        map.insert("metadata".to_string(), map_to_qdrant(&self.metadata));
        map.insert("created_at".to_string(), string_to_qdrant(&self.created_at));
        map.insert(
            "embedding_model".to_string(),
            string_to_qdrant(&self.embedding_model),
        );
        map.insert(
            "embedding_dim".to_string(),
            int_to_qdrant(self.embedding_dim as i64),
        );

        map
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::StringValue(s.to_string())),
    }
}

fn int_to_qdrant(i: i64) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::IntegerValue(i)),
    }
}

fn list_to_qdrant(items: &[String]) -> QdrantValue {
    let values: Vec<QdrantValue> = items.iter().map(|s| string_to_qdrant(s)).collect();
    QdrantValue {
        kind: Some(Kind::ListValue(ListValue { values })),
    }
}

fn map_to_qdrant(map: &BTreeMap<String, String>) -> QdrantValue {
    let fields: HashMap<String, QdrantValue> = map
        .iter()
        .map(|(k, v)| (k.clone(), string_to_qdrant(v)))
        .collect();
    QdrantValue {
        kind: Some(Kind::StructValue(Struct { fields })),
    }
}

/// Convert PointId to string
fn point_id_to_string(id: Option<PointId>) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SectionType, TaxSection};
    use chrono::{TimeZone, Utc};

    fn sample_section() -> TaxSection {
        let mut section = TaxSection::new(
            "26 U.S.C. § 162",
            "Trade or business expenses",
            "(a) In general There shall be allowed as a deduction...",
            vec!["Title 26".to_string(), "Section 162".to_string()],
        );
        section.section_type = SectionType::Section;
        section.subsections = vec!["(a) In general There shall be allowed".to_string()];
        section.effective_date = Some(Utc.with_ymd_and_hms(1986, 10, 22, 0, 0, 0).unwrap());
        section
            .metadata
            .insert("usckey".to_string(), "26usc162".to_string());
        section
    }

    #[test]
    fn test_payload_flattens_typed_fields() {
        let section = sample_section();
        let payload = SectionPayload::from_section(&section, "BAAI/bge-small-en-v1.5", 384);

        assert_eq!(payload.section_type, "section");
        assert_eq!(
            payload.effective_date.as_deref(),
            Some("1986-10-22T00:00:00+00:00")
        );
        assert_eq!(payload.embedding_model, "BAAI/bge-small-en-v1.5");
        assert_eq!(payload.embedding_dim, 384);

        let map = payload.to_qdrant_payload();
        for key in [
            "section_number",
            "title",
            "content",
            "hierarchy",
            "section_type",
            "subsections",
            "effective_date",
            "metadata",
            "created_at",
            "embedding_model",
            "embedding_dim",
        ] {
            assert!(map.contains_key(key), "missing payload key {key}");
        }
        // source_url is unknown here and stays absent rather than null
        assert!(!map.contains_key("source_url"));
    }

    #[test]
    fn test_payload_serde_round_trip() {
        let payload = SectionPayload::from_section(&sample_section(), "stub", 4);
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: SectionPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.section_number, payload.section_number);
        assert_eq!(parsed.hierarchy, payload.hierarchy);
        assert_eq!(parsed.metadata, payload.metadata);
    }

    #[tokio::test]
    async fn test_upsert_points_rejects_dimension_mismatch() {
        // from_url is lazy: no running Qdrant needed, the length check fires first
        let store = QdrantStore::new("http://127.0.0.1:6334", "test_collection", 3)
            .await
            .expect("store should initialize");

        let point = SectionPoint {
            id: Uuid::new_v4(),
            vector: vec![0.1, 0.2],
            payload: SectionPayload::from_section(&sample_section(), "stub", 3),
        };

        let err = store
            .upsert_points(vec![point])
            .await
            .expect_err("should reject mismatched vector length");

        match err {
            Error::Qdrant(message) => assert!(message.contains("Vector dimension mismatch")),
            other => panic!("expected qdrant error, got {other:?}"),
        }
    }
}
