//! Semantic job matching over sentence embeddings.
//!
//! Job records and queries are normalized, embedded with a local
//! fastembed model, and ranked by exact nearest-neighbor search.
//!
//! # Architecture
//!
//! - `preprocess`: Markup stripping and text normalization
//! - `embeddings`: Encoder seam, fastembed wrapper, job/query embedding
//! - `index`: In-memory squared-L2 index paired with job records
//! - `storage`: jobs.index / jobs.json persistence
//! - `service`: High-level matcher (build, search, resume matching)

pub mod embeddings;
mod index;
mod preprocess;
mod service;
mod storage;

pub use embeddings::{EmbeddingError, EmbeddingModel, JobEmbedder, TextEncoder};
pub use index::{Embeddings, IndexError, JobMatch, VectorIndex};
pub use preprocess::normalize_text;
pub use service::{IndexSource, MatcherError, SemanticMatcher};
pub use storage::{IndexStorage, IndexStorageError};
