// src/recommendation/mod.rs
//! Embedding-based job recommendation: chunk postings, embed them into a
//! flat vector index and match candidate resumes against it.

pub mod builder;
pub mod chunking;
pub mod embeddings;
pub mod evaluation;
pub mod index;
pub mod recommender;

use std::sync::Arc;
use tokio::sync::RwLock;

pub use builder::{IndexBuilder, IndexReport};
pub use embeddings::{EmbeddingModel, OllamaEmbeddingClient};
pub use index::{JobIndex, SearchHit};
pub use recommender::{JobRecommender, Recommendation, RecommendationError};

/// The live index, swapped in place when it is rebuilt.
pub type SharedIndex = Arc<RwLock<Option<JobIndex>>>;
