//! DocQuery RAG Pipeline
//!
//! The question-answering core: role-gated multi-collection retrieval
//! with query augmentation, grounded answer generation, and confidence
//! scoring.
//!
//! Request flow:
//! 1. Sanitize and validate the question
//! 2. Rewrite follow-ups into standalone questions (history-aware)
//! 3. Augment the query with alternate phrasings
//! 4. Fan out retrieval across the role's department collections
//! 5. Gate on relevance, budget tokens, generate, and package

pub mod augment;
pub mod expand;
pub mod format;
pub mod pipeline;
pub mod prompts;
pub mod retriever;

#[cfg(test)]
pub(crate) mod testing;

pub use augment::{AugmentedQuerySet, QueryAugmenter};
pub use format::{ConversationTurn, SourceRef, TurnRole};
pub use pipeline::{QueryResponse, RagPipeline};
pub use retriever::{DocumentRetriever, RetrievalResult};
