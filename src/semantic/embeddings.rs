//! Embedding generation.
//!
//! - [`TextEncoder`]: the seam between the matcher and a sentence model
//! - [`EmbeddingModel`]: fastembed-backed encoder with a local model cache
//! - [`JobEmbedder`]: normalizes text, structures job records, and
//!   guarantees one `dimensions`-long vector per input

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::jobs::JobRecord;
use crate::semantic::preprocess::normalize_text;

/// Default download timeout for model files (5 minutes)
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Separator between labeled job fields.
const FIELD_SEPARATOR: &str = " | ";

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Model download timed out after {0} seconds")]
    DownloadTimeout(u64),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("Model returned {got} vectors of width {width}, expected {expected} of width {dimensions}")]
    ShapeMismatch {
        expected: usize,
        got: usize,
        dimensions: usize,
        width: usize,
    },
}

/// A sentence-embedding model.
///
/// Implementations must be deterministic: the same text always yields the
/// same vector.
pub trait TextEncoder: Send + Sync {
    /// Model name, used to tag persisted indexes.
    fn name(&self) -> &str;

    /// Width of every vector this encoder returns.
    fn dimensions(&self) -> usize;

    /// Encode a batch of already normalized texts, one vector per text.
    /// The vector for a text must not depend on the other texts in the
    /// batch.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// SHA256 of the model name, stored in the index header.
    fn model_id_hash(&self) -> [u8; 32] {
        model_id_hash(self.name())
    }
}

/// Compute SHA256 hash of a model name for storage identification.
pub fn model_id_hash(model_name: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(model_name.as_bytes());
    hasher.finalize().into()
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl EmbeddingModel {
    /// Load the named model, downloading it into `cache_dir/models` on
    /// first use.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        download_timeout: Option<Duration>,
    ) -> Result<Self, EmbeddingError> {
        let model_enum = Self::parse_model_name(model_name)?;
        let timeout = download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT);

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        log::info!(
            "loading embedding model '{}' (download timeout {}s)",
            model_name,
            timeout.as_secs()
        );

        let mut model = with_timeout(timeout, move || {
            let options = InitOptions::new(model_enum)
                .with_cache_dir(models_dir)
                .with_show_download_progress(true);
            TextEmbedding::try_new(options)
        })?
        .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" | "allminiml6v2q" => {
                Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q)
            }
            "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            _ => Err(EmbeddingError::InvalidModel(format!(
                "Unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5 (add -q suffix to MiniLM for quantized)",
                name
            ))),
        }
    }

    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        let test_embeddings = model
            .embed(vec!["test"], None)
            .map_err(|e| EmbeddingError::InitFailed(format!("Failed to probe dimensions: {}", e)))?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))
    }
}

impl TextEncoder for EmbeddingModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        // one sequence per run: padding must not depend on batch neighbours
        model
            .embed(texts.to_vec(), Some(1))
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
    }
}

/// Run `init` on its own thread and give up after `timeout`. A timed out
/// thread is left to finish in the background; its result is dropped.
fn with_timeout<T, F>(timeout: Duration, init: F) -> Result<T, EmbeddingError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("model-init".to_string())
        .spawn(move || {
            let _ = tx.send(init());
        })
        .map_err(|e| EmbeddingError::InitFailed(format!("Failed to spawn loader: {}", e)))?;

    match rx.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(EmbeddingError::DownloadTimeout(timeout.as_secs()))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(EmbeddingError::InitFailed(
            "model loader exited without a result".to_string(),
        )),
    }
}

/// Turns job records, queries and resume summaries into vectors.
#[derive(Clone)]
pub struct JobEmbedder {
    encoder: Arc<dyn TextEncoder>,
}

impl JobEmbedder {
    pub fn new(encoder: Arc<dyn TextEncoder>) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> &dyn TextEncoder {
        self.encoder.as_ref()
    }

    pub fn dimensions(&self) -> usize {
        self.encoder.dimensions()
    }

    /// Normalize and embed a batch of texts, one vector per text.
    pub fn embed_texts<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let cleaned: Vec<String> = texts.iter().map(|t| normalize_text(t.as_ref())).collect();
        self.encode_checked(&cleaned)
    }

    /// Normalize and embed a single text.
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_texts(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }

    pub fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_text(query)
    }

    #[allow(dead_code)]
    pub fn embed_job(&self, job: &JobRecord) -> Result<Vec<f32>, EmbeddingError> {
        self.encode_checked(&[job_text(job)])?
            .pop()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }

    /// Embed many job records in one model call.
    pub fn embed_jobs(&self, jobs: &[JobRecord]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let texts: Vec<String> = jobs.iter().map(job_text).collect();
        self.encode_checked(&texts)
    }

    /// Encode texts that are already normalized and verify the output shape.
    fn encode_checked(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let vectors = self.encoder.encode(texts)?;
        let dimensions = self.encoder.dimensions();

        let bad_width = vectors.iter().map(Vec::len).find(|&w| w != dimensions);
        if vectors.len() != texts.len() || bad_width.is_some() {
            return Err(EmbeddingError::ShapeMismatch {
                expected: texts.len(),
                got: vectors.len(),
                dimensions,
                width: bad_width.unwrap_or(dimensions),
            });
        }

        Ok(vectors)
    }
}

/// Build the labeled text for a job. Each value is normalized on its own,
/// the label is added afterwards so it survives normalization. Fields that
/// are empty after cleaning are left out.
pub fn job_text(job: &JobRecord) -> String {
    let skills = job
        .skills
        .iter()
        .map(|skill| normalize_text(skill))
        .filter(|skill| !skill.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let fields = [
        ("Job Title", normalize_text(&job.title)),
        ("Company", normalize_text(&job.company)),
        (
            "Location",
            normalize_text(job.location.as_deref().unwrap_or_default()),
        ),
        ("Required Skills", skills),
        ("Job Description", normalize_text(&job.description)),
    ];

    fields
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR)
}
