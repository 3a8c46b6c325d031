//! Vector index abstraction
//!
//! One isolated collection per department: a chunk belongs to exactly
//! one collection, and cross-department search only ever happens as
//! separate per-collection queries. The index returns *distances*; the
//! distance -> similarity transform is an explicit function
//! parameterized by the configured metric rather than an inline
//! assumption at call sites.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Metadata stored alongside an indexed chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Owning document
    pub document_id: Uuid,

    /// Original filename of the source document
    pub filename: String,

    /// Department that owns the collection this chunk lives in
    pub department: String,

    /// Header breadcrumb, e.g. "Benefits > Health Insurance"
    pub section_path: Option<String>,

    /// Level of the deepest enclosing header (1-6)
    pub header_level: Option<u8>,

    /// Source page, when the loader preserved pagination
    pub page: Option<u32>,
}

/// A chunk ready for indexing
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub id: Uuid,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A nearest-neighbor match returned by a query
#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub id: Uuid,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Raw distance in the index's configured metric (lower is closer)
    pub distance: f32,
}

/// Filter for targeted deletion
#[derive(Debug, Clone)]
pub enum ChunkFilter {
    /// All chunks belonging to a document
    DocumentId(Uuid),
}

/// Distance metric an index is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine distance in [0, 2]
    Cosine,
    /// Euclidean (L2) distance in [0, inf)
    Euclidean,
}

/// Convert a raw index distance into a similarity score in [0, 1]
/// (higher is better)
pub fn similarity_from_distance(metric: DistanceMetric, distance: f32) -> f32 {
    match metric {
        DistanceMetric::Cosine => (1.0 - distance).max(0.0),
        DistanceMetric::Euclidean => 1.0 / (1.0 + distance.max(0.0)),
    }
}

/// Per-collection vector index operations
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace chunks in a collection
    async fn upsert(&self, collection: &str, chunks: Vec<IndexedChunk>) -> Result<()>;

    /// Query the k nearest neighbors of an embedding
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<IndexMatch>>;

    /// Delete chunks matching a filter; returns the number removed
    async fn delete_where(&self, collection: &str, filter: &ChunkFilter) -> Result<usize>;

    /// Number of chunks in a collection
    async fn count(&self, collection: &str) -> Result<usize>;

    /// The distance metric this index reports
    fn metric(&self) -> DistanceMetric;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// In-memory vector index
///
/// Brute-force cosine search over all stored vectors, behind an
/// `RwLock`. Used in tests and embedded deployments; production
/// deployments implement [`VectorIndex`] against a real index service.
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Vec<IndexedChunk>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, collection: &str, chunks: Vec<IndexedChunk>) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| AppError::Index {
                message: "index lock poisoned".to_string(),
            })?;
        let stored = collections.entry(collection.to_string()).or_default();
        for chunk in chunks {
            stored.retain(|existing| existing.id != chunk.id);
            stored.push(chunk);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<IndexMatch>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| AppError::Index {
                message: "index lock poisoned".to_string(),
            })?;

        let stored = match collections.get(collection) {
            Some(chunks) => chunks,
            None => return Ok(Vec::new()),
        };

        let mut matches: Vec<IndexMatch> = stored
            .iter()
            .map(|chunk| IndexMatch {
                id: chunk.id,
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                distance: 1.0 - cosine_similarity(embedding, &chunk.embedding),
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);

        Ok(matches)
    }

    async fn delete_where(&self, collection: &str, filter: &ChunkFilter) -> Result<usize> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| AppError::Index {
                message: "index lock poisoned".to_string(),
            })?;

        let stored = match collections.get_mut(collection) {
            Some(chunks) => chunks,
            None => return Ok(0),
        };

        let before = stored.len();
        match filter {
            ChunkFilter::DocumentId(document_id) => {
                stored.retain(|chunk| chunk.metadata.document_id != *document_id);
            }
        }

        Ok(before - stored.len())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self
            .collections
            .read()
            .map_err(|_| AppError::Index {
                message: "index lock poisoned".to_string(),
            })?;
        Ok(collections.get(collection).map(|c| c.len()).unwrap_or(0))
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }
}
