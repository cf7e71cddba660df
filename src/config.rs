use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.yaml";

/// all-MiniLM-L6-v2 is fast on CPU and produces 384-dim vectors
const DEFAULT_SEMANTIC_MODEL: &str = "all-MiniLM-L6-v2";
const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_K: usize = 5;
const DEFAULT_MIN_SIMILARITY: f32 = 0.0;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

const DEFAULT_JOBS_PATH: &str = "data/jobs.json";
const DEFAULT_INDEX_DIR: &str = "data/vector_index";

/// Configuration for semantic matching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticSearchConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_semantic_model")]
    pub model: String,

    /// Jobs embedded per model call while building the index
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Results returned when no `k` is given
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Resume matches scoring below this are dropped [0.0, 1.0]
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_SEMANTIC_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            default_k: DEFAULT_K,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

fn default_semantic_model() -> String {
    DEFAULT_SEMANTIC_MODEL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_min_similarity() -> f32 {
    DEFAULT_MIN_SIMILARITY
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_jobs_path() -> String {
    DEFAULT_JOBS_PATH.to_string()
}

fn default_index_dir() -> String {
    DEFAULT_INDEX_DIR.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Scraped job corpus, relative to the base path
    #[serde(default = "default_jobs_path")]
    pub jobs_path: String,

    /// Directory holding jobs.index and jobs.json, relative to the base path
    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs_path: default_jobs_path(),
            index_dir: default_index_dir(),
            semantic_search: SemanticSearchConfig::default(),
            base_path: ".".to_string(),
        }
    }
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        let sem = &self.semantic_search;

        if sem.model.trim().is_empty() {
            bail!("semantic_search.model must not be empty");
        }

        if !(0.0..=1.0).contains(&sem.min_similarity) {
            bail!(
                "semantic_search.min_similarity must be between 0.0 and 1.0, got {}",
                sem.min_similarity
            );
        }

        if sem.batch_size == 0 {
            bail!("semantic_search.batch_size must be greater than 0");
        }

        if sem.default_k == 0 {
            bail!("semantic_search.default_k must be greater than 0");
        }

        if sem.download_timeout_secs == 0 {
            bail!("semantic_search.download_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Load `<base_path>/config.yaml`, writing defaults if it does not exist.
    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let base = Path::new(base_path);
        std::fs::create_dir_all(base)
            .with_context(|| format!("failed to create base directory {base_path}"))?;

        let config_path = base.join(CONFIG_FILE_NAME);

        // create new if does not exist
        if !config_path.exists() {
            std::fs::write(&config_path, serde_yml::to_string(&Self::default())?)
                .context("failed to write default config")?;
        }

        let config_str =
            std::fs::read_to_string(&config_path).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(self.base_path().join(CONFIG_FILE_NAME), config_str)
            .context("failed to save config")?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        Path::new(&self.base_path)
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.base_path().join(&self.jobs_path)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.base_path().join(&self.index_dir)
    }
}
