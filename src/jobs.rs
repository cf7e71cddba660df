use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::HashSet, path::Path, time::Instant};

/// Read `null` the same as a missing key. Scrapers emit `null` for fields
/// they could not extract.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single job posting as delivered by the scrapers.
///
/// Fields the matcher does not know about are kept in `extra` so a record
/// survives a save/load round trip unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("job corpus not found at {0}")]
    NotFound(String),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("malformed job corpus: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read a JSON array of job records.
pub fn load_jobs(path: &Path) -> Result<Vec<JobRecord>, CorpusError> {
    if !path.exists() {
        return Err(CorpusError::NotFound(path.display().to_string()));
    }

    let now = Instant::now();
    let data = std::fs::read(path)?;
    let jobs: Vec<JobRecord> = serde_json::from_slice(&data)?;

    log::debug!(
        "loaded {} jobs from {} in {}ms",
        jobs.len(),
        path.display(),
        now.elapsed().as_millis()
    );

    if jobs.is_empty() {
        log::warn!("job corpus {} is empty", path.display());
    }

    Ok(jobs)
}

/// Drop records whose url was already seen. Records without a url are
/// dropped too, since the url is their identity outside the index.
pub fn dedup_by_url(jobs: Vec<JobRecord>) -> Vec<JobRecord> {
    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|job| !job.url.is_empty() && seen.insert(job.url.clone()))
        .collect()
}

/// Plain case-insensitive substring filter. Every criterion that is set
/// must match.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobFilter {
    pub title: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
}

impl JobFilter {
    pub fn lowercase(&mut self) {
        self.title = self.title.as_ref().map(|title| title.to_lowercase());
        self.location = self.location.as_ref().map(|l| l.to_lowercase());
        self.company = self.company.as_ref().map(|c| c.to_lowercase());
    }

    pub fn matches(&self, job: &JobRecord) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            match needle {
                Some(needle) => haystack.to_lowercase().contains(needle.as_str()),
                None => true,
            }
        }

        contains(&job.title, &self.title)
            && contains(job.location.as_deref().unwrap_or_default(), &self.location)
            && contains(&job.company, &self.company)
    }

    pub fn apply<'a>(&self, jobs: &'a [JobRecord]) -> Vec<&'a JobRecord> {
        let mut query = self.clone();
        query.lowercase();
        jobs.iter().filter(|job| query.matches(job)).collect()
    }
}
