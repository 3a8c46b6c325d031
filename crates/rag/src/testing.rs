//! Test fixtures shared across the crate's test modules.

use async_trait::async_trait;
use docquery_common::embeddings::Embedder;
use docquery_common::errors::Result;
use std::collections::HashMap;

/// Embedder with scripted vectors per exact text, so tests control
/// similarity scores precisely. Unknown texts get a fixed off-axis
/// vector.
pub(crate) struct TestEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl TestEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
        }
    }

    pub(crate) fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension);
        self.vectors.insert(text.to_string(), vector);
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        self.vectors.get(text).cloned().unwrap_or_else(|| {
            let mut fallback = vec![0.0; self.dimension];
            if let Some(last) = fallback.last_mut() {
                *last = 1.0;
            }
            fallback
        })
    }
}

#[async_trait]
impl Embedder for TestEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        "test-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
