//! Semantic job matching service.
//!
//! Owns one embedder and one vector index:
//! - builds the index from a job corpus and persists it
//! - answers free-text queries and resume queries against it
//!
//! `build_index` and `load_index` take `&mut self`, searches take `&self`;
//! share a matcher across threads behind an `RwLock`.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SemanticSearchConfig;
use crate::jobs::{self, CorpusError, JobRecord};
use crate::resume::Resume;
use crate::semantic::embeddings::{EmbeddingError, EmbeddingModel, JobEmbedder, TextEncoder};
use crate::semantic::index::{IndexError, JobMatch, VectorIndex};
use crate::semantic::storage::{IndexStorage, IndexStorageError};

/// Errors that can occur during semantic matching operations.
#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] IndexStorageError),

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),
}

impl MatcherError {
    /// The persisted index is missing and must be rebuilt from the corpus.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MatcherError::Storage(IndexStorageError::NotFound(_)))
    }
}

/// Where the matcher's index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Loaded,
    Built,
}

pub struct SemanticMatcher {
    embedder: JobEmbedder,
    index: VectorIndex,
}

impl SemanticMatcher {
    /// Create a matcher with an empty index sized for the encoder.
    pub fn new(encoder: Arc<dyn TextEncoder>) -> Self {
        let embedder = JobEmbedder::new(encoder);
        let index = VectorIndex::new(embedder.dimensions());
        Self { embedder, index }
    }

    /// Load the configured fastembed model; models are cached under
    /// `base_path/models`.
    pub fn from_config(config: &SemanticSearchConfig, base_path: &Path) -> Result<Self, MatcherError> {
        let timeout = Duration::from_secs(config.download_timeout_secs);
        let model = EmbeddingModel::new(&config.model, base_path.to_path_buf(), Some(timeout))?;
        Ok(Self::new(Arc::new(model)))
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[cfg(test)]
    pub fn embedder(&self) -> &JobEmbedder {
        &self.embedder
    }

    /// Embed `jobs` in chunks of `batch_size` and append them to the index
    /// in a single call. The result does not depend on `batch_size`.
    pub fn build_index(&mut self, jobs: Vec<JobRecord>, batch_size: usize) -> Result<usize, MatcherError> {
        let now = Instant::now();
        let batch_size = batch_size.max(1);

        let mut vectors = Vec::with_capacity(jobs.len());
        for (n, chunk) in jobs.chunks(batch_size).enumerate() {
            vectors.extend(self.embedder.embed_jobs(chunk)?);
            log::debug!("embedded batch {} ({} jobs)", n + 1, chunk.len());
        }

        let count = jobs.len();
        self.index.add(jobs, vectors)?;

        log::info!(
            "indexed {} jobs in {}ms ({} total)",
            count,
            now.elapsed().as_millis(),
            self.index.len()
        );

        Ok(count)
    }

    /// Build from a corpus file and persist the pair into `index_dir`.
    pub fn index_jobs(
        &mut self,
        jobs_path: &Path,
        index_dir: &Path,
        batch_size: usize,
    ) -> Result<usize, MatcherError> {
        let jobs = jobs::load_jobs(jobs_path)?;
        let count = self.build_index(jobs, batch_size)?;
        self.save_index(index_dir)?;
        Ok(count)
    }

    pub fn save_index(&self, index_dir: &Path) -> Result<(), MatcherError> {
        let storage = IndexStorage::in_dir(index_dir);
        storage.save(&self.index, &self.embedder.encoder().model_id_hash())?;
        log::info!("saved {} jobs to {}", self.index.len(), storage.index_path().display());
        Ok(())
    }

    /// Replace the in-memory index with the persisted pair in `index_dir`.
    /// On error the current index is kept.
    pub fn load_index(&mut self, index_dir: &Path) -> Result<(), MatcherError> {
        let storage = IndexStorage::in_dir(index_dir);
        let encoder = self.embedder.encoder();
        let index = storage.load(&encoder.model_id_hash(), encoder.dimensions())?;

        log::info!("loaded {} jobs from {}", index.len(), index_dir.display());
        self.index = index;
        Ok(())
    }

    /// Load the persisted index, or build it from the corpus and save it
    /// when it does not exist yet.
    pub fn load_or_build(
        &mut self,
        jobs_path: &Path,
        index_dir: &Path,
        batch_size: usize,
    ) -> Result<IndexSource, MatcherError> {
        match self.load_index(index_dir) {
            Ok(()) => Ok(IndexSource::Loaded),
            Err(e) if e.is_not_found() => {
                log::info!("no index in {}, building from {}", index_dir.display(), jobs_path.display());
                self.index_jobs(jobs_path, index_dir, batch_size)?;
                Ok(IndexSource::Built)
            }
            Err(e) => Err(e),
        }
    }

    /// Jobs most similar to `query`, best first.
    pub fn search_jobs(&self, query: &str, k: usize) -> Result<Vec<JobMatch>, MatcherError> {
        let query_embedding = self.embedder.embed_query(query)?;
        Ok(self.index.search(&query_embedding, k)?)
    }

    /// Top `k` jobs for the resume summary, keeping only scores at or above
    /// `min_similarity`. Dropped results are not backfilled.
    pub fn match_resume_to_jobs(
        &self,
        resume: &Resume,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<JobMatch>, MatcherError> {
        let summary = resume.summary();
        log::debug!("resume summary: {summary}");

        let results = self.search_jobs(&summary, k)?;
        for result in &results {
            log::debug!(
                "candidate score={:.3} {} at {}",
                result.score,
                result.job.title,
                result.job.company
            );
        }

        Ok(results
            .into_iter()
            .filter(|result| result.score >= min_similarity)
            .collect())
    }
}
