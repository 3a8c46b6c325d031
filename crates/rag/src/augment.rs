//! Query augmentation engine
//!
//! Generates alternate phrasings of a query before retrieval to
//! improve recall. The primary path asks the LLM for N rephrasings;
//! heuristic expansion takes over only when the LLM call fails. Results
//! are cached in a bounded LRU keyed by (query, role).

use crate::expand::expand_query;
use docquery_common::config::RagConfig;
use docquery_common::errors::Result;
use docquery_common::llm::{ChatMessage, CompletionRequest, LlmClient};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hard bounds for the number of generated phrasings
const MIN_AUGMENTATIONS: usize = 1;
const MAX_AUGMENTATIONS: usize = 4;

/// A query with its generated alternates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedQuerySet {
    /// The query as asked
    pub original: String,

    /// Alternate phrasings (possibly empty)
    pub augmented: Vec<String>,

    /// `[original] + augmented`, ready for retrieval fan-out
    pub all_queries: Vec<String>,
}

impl AugmentedQuerySet {
    fn passthrough(query: &str) -> Self {
        Self {
            original: query.to_string(),
            augmented: Vec::new(),
            all_queries: vec![query.to_string()],
        }
    }
}

/// Engine statistics, reported to operators
#[derive(Debug, Clone, Serialize)]
pub struct AugmenterStats {
    pub enabled: bool,
    pub num_augmentations: usize,
    pub cache_size: usize,
    pub cache_capacity: usize,
}

/// Generates and caches query alternates
pub struct QueryAugmenter {
    llm: Arc<dyn LlmClient>,
    enabled: bool,
    num_augmentations: usize,
    cache: Mutex<LruCache<String, AugmentedQuerySet>>,
}

impl QueryAugmenter {
    pub fn new(llm: Arc<dyn LlmClient>, config: &RagConfig) -> Self {
        // Out-of-range values are clamped, not rejected
        let num_augmentations = config
            .num_augmentations
            .clamp(MIN_AUGMENTATIONS, MAX_AUGMENTATIONS);
        let capacity = NonZeroUsize::new(config.augment_cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);

        info!(
            enabled = config.enable_augmentation,
            num_augmentations,
            cache_capacity = capacity.get(),
            "Query augmenter initialized"
        );

        Self {
            llm,
            enabled: config.enable_augmentation,
            num_augmentations,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Generate alternate phrasings for a query.
    ///
    /// Never fails: LLM errors fall back to heuristic expansion, and a
    /// disabled engine or empty query returns the query unchanged.
    pub async fn augment(&self, query: &str, user_role: Option<&str>) -> AugmentedQuerySet {
        if !self.enabled || query.trim().is_empty() {
            return AugmentedQuerySet::passthrough(query);
        }

        let key = cache_key(query, user_role);
        if let Some(hit) = self.cache.lock().get(&key) {
            debug!(query = %truncate_for_log(query), "Augmentation cache hit");
            return hit.clone();
        }

        let augmented = match self.augment_with_llm(query, user_role).await {
            Ok(queries) => queries,
            Err(e) => {
                warn!(error = %e, "LLM augmentation failed, using heuristic fallback");
                expand_query(query, self.num_augmentations)
            }
        };

        let mut all_queries = Vec::with_capacity(augmented.len() + 1);
        all_queries.push(query.to_string());
        all_queries.extend(augmented.iter().cloned());

        let result = AugmentedQuerySet {
            original: query.to_string(),
            augmented,
            all_queries,
        };

        self.cache.lock().put(key, result.clone());

        info!(
            count = result.augmented.len(),
            query = %truncate_for_log(query),
            "Generated augmented queries"
        );

        result
    }

    async fn augment_with_llm(&self, query: &str, user_role: Option<&str>) -> Result<Vec<String>> {
        let role_context = user_role
            .map(|role| format!("\nUser role: {}\n", role))
            .unwrap_or_default();

        let prompt = format!(
            "Generate {n} alternative ways to ask this question.\n\
             Each should be a natural, slightly different phrasing of the same intent.\n\
             These will be used to search documents for better retrieval.\n\
             {role_context}\n\
             Original question: \"{query}\"\n\n\
             Output exactly {n} questions, one per line.\n\
             Do NOT include numbers, bullets, or explanations - just the questions.",
            n = self.num_augmentations,
            role_context = role_context,
            query = query,
        );

        let request = CompletionRequest {
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: 256,
            temperature: 0.7,
        };

        let response = self.llm.complete(&request).await?;

        // Fewer than N usable lines is accepted as-is; no retry
        Ok(parse_query_lines(&response, self.num_augmentations))
    }

    /// Engine statistics
    pub fn stats(&self) -> AugmenterStats {
        let cache = self.cache.lock();
        AugmenterStats {
            enabled: self.enabled,
            num_augmentations: self.num_augmentations,
            cache_size: cache.len(),
            cache_capacity: cache.cap().get(),
        }
    }

    /// Drop all cached augmentations
    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock();
        let old_size = cache.len();
        cache.clear();
        info!(old_size, "Cleared augmentation cache");
    }
}

/// Parse LLM output lines into queries, stripping enumeration markers
fn parse_query_lines(response: &str, limit: usize) -> Vec<String> {
    let mut queries = Vec::new();

    for line in response.lines() {
        if queries.len() >= limit {
            break;
        }
        let cleaned = line
            .trim()
            .trim_start_matches(|c: char| {
                c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*' | '•' | ' ')
            })
            .trim();

        if !cleaned.is_empty() && !queries.iter().any(|q| q == cleaned) {
            queries.push(cleaned.to_string());
        }
    }

    queries
}

fn cache_key(query: &str, user_role: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update(b":");
    hasher.update(user_role.unwrap_or("none").as_bytes());
    hex::encode(hasher.finalize())
}

fn truncate_for_log(query: &str) -> String {
    query.chars().take(48).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docquery_common::llm::MockLlm;

    fn config(num: usize, cache_size: usize) -> RagConfig {
        RagConfig {
            num_augmentations: num,
            augment_cache_size: cache_size,
            ..RagConfig::default()
        }
    }

    #[tokio::test]
    async fn test_llm_augmentation_primary_path() {
        let llm = Arc::new(MockLlm::new(
            "How can I take time off?\nWhat is the vacation process?\nExtra line ignored",
        ));
        let augmenter = QueryAugmenter::new(llm, &config(2, 10));

        let result = augmenter.augment("How do I request leave?", Some("Employee")).await;

        assert_eq!(result.original, "How do I request leave?");
        assert_eq!(result.augmented.len(), 2);
        assert_eq!(result.augmented[0], "How can I take time off?");
        assert_eq!(result.all_queries.len(), 3);
        assert_eq!(result.all_queries[0], "How do I request leave?");
    }

    #[tokio::test]
    async fn test_enumeration_markers_stripped() {
        let llm = Arc::new(MockLlm::new("1. First phrasing\n- Second phrasing\n* Third"));
        let augmenter = QueryAugmenter::new(llm, &config(3, 10));

        let result = augmenter.augment("anything", None).await;
        assert_eq!(
            result.augmented,
            vec!["First phrasing", "Second phrasing", "Third"]
        );
    }

    #[tokio::test]
    async fn test_thin_llm_output_accepted_without_retry() {
        let llm = Arc::new(MockLlm::new("Only one line"));
        let augmenter = QueryAugmenter::new(llm, &config(4, 10));

        let result = augmenter.augment("anything", None).await;
        assert_eq!(result.augmented.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_on_llm_failure() {
        let augmenter = QueryAugmenter::new(Arc::new(MockLlm::failing()), &config(2, 10));

        let result = augmenter.augment("How do I request leave?", Some("Employee")).await;

        // Heuristic expansion kicks in with no network dependency
        assert!(!result.augmented.is_empty());
        assert!(result.augmented.iter().all(|q| !q.is_empty()));
    }

    #[tokio::test]
    async fn test_disabled_engine_passes_through() {
        let mut cfg = config(2, 10);
        cfg.enable_augmentation = false;
        let augmenter = QueryAugmenter::new(Arc::new(MockLlm::new("unused")), &cfg);

        let result = augmenter.augment("a question", None).await;
        assert!(result.augmented.is_empty());
        assert_eq!(result.all_queries, vec!["a question"]);
    }

    #[tokio::test]
    async fn test_empty_query_passes_through() {
        let augmenter = QueryAugmenter::new(Arc::new(MockLlm::new("unused")), &config(2, 10));
        let result = augmenter.augment("", Some("HR")).await;
        assert!(result.augmented.is_empty());
    }

    #[tokio::test]
    async fn test_cache_avoids_repeat_llm_calls() {
        let llm = Arc::new(MockLlm::with_replies(vec![
            "first call line".to_string(),
            "second call line".to_string(),
        ]));
        let augmenter = QueryAugmenter::new(llm, &config(1, 10));

        let first = augmenter.augment("same question", Some("HR")).await;
        let second = augmenter.augment("same question", Some("HR")).await;

        // The second call is served from cache, not the LLM's next reply
        assert_eq!(first, second);
        assert_eq!(second.augmented, vec!["first call line"]);
    }

    #[tokio::test]
    async fn test_cache_is_role_scoped() {
        let llm = Arc::new(MockLlm::with_replies(vec![
            "hr phrasing".to_string(),
            "finance phrasing".to_string(),
        ]));
        let augmenter = QueryAugmenter::new(llm, &config(1, 10));

        let hr = augmenter.augment("same question", Some("HR")).await;
        let finance = augmenter.augment("same question", Some("Finance")).await;

        assert_ne!(hr.augmented, finance.augmented);
    }

    #[tokio::test]
    async fn test_lru_bound_evicts() {
        let augmenter = QueryAugmenter::new(Arc::new(MockLlm::new("line")), &config(1, 2));

        augmenter.augment("q1", None).await;
        augmenter.augment("q2", None).await;
        augmenter.augment("q3", None).await;

        assert_eq!(augmenter.stats().cache_size, 2);
    }

    #[tokio::test]
    async fn test_num_augmentations_clamped() {
        let augmenter = QueryAugmenter::new(Arc::new(MockLlm::new("x")), &config(9, 10));
        assert_eq!(augmenter.stats().num_augmentations, 4);

        let augmenter = QueryAugmenter::new(Arc::new(MockLlm::new("x")), &config(0, 10));
        assert_eq!(augmenter.stats().num_augmentations, 1);
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let augmenter = QueryAugmenter::new(Arc::new(MockLlm::new("line")), &config(1, 10));
        augmenter.augment("q1", None).await;
        assert_eq!(augmenter.stats().cache_size, 1);

        augmenter.clear_cache();
        assert_eq!(augmenter.stats().cache_size, 0);
    }

    #[test]
    fn test_parse_query_lines_dedup() {
        let parsed = parse_query_lines("same\nsame\ndifferent", 5);
        assert_eq!(parsed, vec!["same", "different"]);
    }
}
