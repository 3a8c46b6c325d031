//! Role-gated document retrieval
//!
//! Fans vector searches out across every department collection the
//! role may access, converts distances to similarity scores,
//! deduplicates by content, and reranks. A failed (query, department)
//! pair is logged and skipped; it never aborts the rest of the fan-out.

use docquery_common::embeddings::Embedder;
use docquery_common::errors::Result;
use docquery_common::index::{
    similarity_from_distance, ChunkMetadata, DistanceMetric, VectorIndex,
};
use docquery_common::roles::RoleTable;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A retrieved passage with its similarity score (higher is better)
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
    pub department: String,
}

/// Retrieves documents with role-based access control and semantic
/// reranking
pub struct DocumentRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    roles: RoleTable,
    metric: DistanceMetric,
}

impl DocumentRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        roles: RoleTable,
    ) -> Self {
        let metric = index.metric();
        Self {
            embedder,
            index,
            roles,
            metric,
        }
    }

    /// Retrieve up to `top_k` passages for a query set, restricted to
    /// the role's departments and ordered by descending similarity.
    ///
    /// The same passage surfacing from multiple query variants keeps
    /// its highest score and appears once.
    pub async fn retrieve(
        &self,
        queries: &[String],
        user_role: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let allowed_departments = self.roles.departments_for(user_role);
        if allowed_departments.is_empty() {
            warn!(role = user_role, "No departments accessible for role");
            return Ok(Vec::new());
        }
        if queries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        info!(
            role = user_role,
            query_count = queries.len(),
            department_count = allowed_departments.len(),
            top_k,
            "Semantic search fan-out"
        );

        let embeddings = self.embedder.embed_batch(queries).await?;

        // Each (query, department) pair is independent; run them
        // concurrently against read-only index handles
        let mut searches = Vec::with_capacity(queries.len() * allowed_departments.len());
        for embedding in &embeddings {
            for department in &allowed_departments {
                searches.push(self.search_department(embedding, department, top_k));
            }
        }
        let outcomes = futures::future::join_all(searches).await;

        // Deduplicate by content hash, keeping the best score
        let mut best: HashMap<String, RetrievalResult> = HashMap::new();
        for result in outcomes.into_iter().flatten() {
            let key = content_key(&result.content);
            match best.get(&key) {
                Some(existing) if existing.score >= result.score => {}
                _ => {
                    best.insert(key, result);
                }
            }
        }

        let mut results: Vec<(String, RetrievalResult)> = best.into_iter().collect();
        // Content-hash tiebreak keeps equal-score ordering deterministic
        results.sort_by(|(key_a, a), (key_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| key_a.cmp(key_b))
        });
        results.truncate(top_k);

        let results: Vec<RetrievalResult> = results.into_iter().map(|(_, r)| r).collect();

        info!(
            result_count = results.len(),
            query_count = queries.len(),
            "Semantic search complete"
        );

        Ok(results)
    }

    /// Search one department collection directly (no role gate; callers
    /// gate before using this)
    pub async fn retrieve_from_department(
        &self,
        query: &str,
        department: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let embedding = self.embedder.embed(query).await?;
        let collection = self.roles.collection_for(department);

        let matches = self.index.query(&collection, &embedding, top_k).await?;
        let mut results: Vec<RetrievalResult> = matches
            .into_iter()
            .map(|m| RetrievalResult {
                score: rounded_similarity(self.metric, m.distance),
                content: m.content,
                metadata: m.metadata,
                department: department.to_string(),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(results)
    }

    /// One fan-out leg. Failures are absorbed here: partial results
    /// beat a failed request.
    async fn search_department(
        &self,
        embedding: &[f32],
        department: &str,
        top_k: usize,
    ) -> Vec<RetrievalResult> {
        let collection = self.roles.collection_for(department);

        match self.index.query(&collection, embedding, top_k).await {
            Ok(matches) => matches
                .into_iter()
                .map(|m| RetrievalResult {
                    score: rounded_similarity(self.metric, m.distance),
                    content: m.content,
                    metadata: m.metadata,
                    department: department.to_string(),
                })
                .collect(),
            Err(e) => {
                warn!(
                    department,
                    collection,
                    error = %e,
                    "Retrieval failed for department, skipping"
                );
                Vec::new()
            }
        }
    }
}

/// Similarity rounded to 4 decimal places, matching what callers see
/// in source listings
fn rounded_similarity(metric: DistanceMetric, distance: f32) -> f32 {
    let similarity = similarity_from_distance(metric, distance);
    (similarity * 10_000.0).round() / 10_000.0
}

fn content_key(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

// No per-department quota: a department with many near matches can
// legitimately fill every top_k slot even when the role can access
// other departments. Callers that need balanced coverage must query
// departments individually via retrieve_from_department.
