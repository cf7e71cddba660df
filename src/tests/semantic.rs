//! Integration tests for semantic matching.
//!
//! Most tests run against [`HashingEncoder`], a deterministic bag-of-words
//! stand-in for the sentence model. Tests that need the real model are
//! marked #[ignore]. Run with: cargo test -- --ignored

use std::path::Path;
use std::sync::Arc;

use crate::jobs::JobRecord;
use crate::resume::Resume;
use crate::semantic::{
    EmbeddingError, EmbeddingModel, IndexError, IndexSource, IndexStorage, IndexStorageError,
    MatcherError, SemanticMatcher, TextEncoder,
};

/// Hashes every word into one of `dimensions` buckets and L2-normalizes the
/// counts, so texts sharing words end up close together.
pub struct HashingEncoder {
    name: String,
    dimensions: usize,
}

impl HashingEncoder {
    pub fn new(dimensions: usize) -> Self {
        Self::named("hashing-test", dimensions)
    }

    pub fn named(name: &str, dimensions: usize) -> Self {
        Self {
            name: name.to_string(),
            dimensions,
        }
    }

    fn bucket(&self, word: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % self.dimensions as u64) as usize
    }

    fn encode_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            vector[self.bucket(&word.to_lowercase())] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl TextEncoder for HashingEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.encode_one(text)).collect())
    }
}

fn matcher() -> SemanticMatcher {
    SemanticMatcher::new(Arc::new(HashingEncoder::new(512)))
}

fn job(title: &str, company: &str, location: &str, skills: &[&str], description: &str, url: &str) -> JobRecord {
    JobRecord {
        title: title.to_string(),
        company: company.to_string(),
        location: Some(location.to_string()),
        skills: skills.iter().map(|s| s.to_string()).collect(),
        description: description.to_string(),
        url: url.to_string(),
        ..Default::default()
    }
}

fn python_and_frontend() -> Vec<JobRecord> {
    vec![
        job(
            "Senior Python Developer",
            "Tech Corp",
            "Bangalore",
            &["Python", "Django", "AWS"],
            "Build scalable APIs",
            "http://x/1",
        ),
        job(
            "Frontend Developer",
            "Web Inc",
            "Mumbai",
            &["JavaScript", "React"],
            "UI work",
            "http://x/2",
        ),
    ]
}

fn corpus() -> Vec<JobRecord> {
    let mut jobs = python_and_frontend();
    jobs.push(job(
        "Data Engineer",
        "Data Labs",
        "Pune",
        &["Spark", "Python", "Airflow"],
        "Maintain batch pipelines",
        "http://x/3",
    ));
    jobs.push(job(
        "Rust Systems Engineer",
        "Ferrous",
        "Remote",
        &["Rust", "Linux"],
        "Write low latency services",
        "http://x/4",
    ));
    jobs
}

fn write_corpus(dir: &Path, jobs: &[JobRecord]) -> std::path::PathBuf {
    let path = dir.join("jobs.json");
    std::fs::write(&path, serde_json::to_vec(jobs).unwrap()).unwrap();
    path
}

fn backend_resume() -> Resume {
    serde_json::from_value(serde_json::json!({
        "name": "A. Candidate",
        "skills": [{"name": "Python", "level": "expert"}, "AWS", "Django"],
        "about": "Backend developer building python services",
        "projects": [{"title": "api", "description": "Scalable APIs on AWS"}]
    }))
    .unwrap()
}

#[test]
fn test_python_query_finds_python_job() {
    let mut matcher = matcher();
    matcher.build_index(python_and_frontend(), 32).unwrap();

    let results = matcher
        .search_jobs("Python backend developer with AWS experience", 1)
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].job.company, "Tech Corp");
    assert_eq!(results[0].job.url, "http://x/1");
}

#[test]
fn test_self_query_scores_one() {
    let mut matcher = matcher();
    let jobs = corpus();
    matcher.build_index(jobs.clone(), 32).unwrap();

    let text = crate::semantic::embeddings::job_text(&jobs[3]);
    let results = matcher.search_jobs(&text, 1).unwrap();

    assert_eq!(results[0].job, jobs[3]);
    assert!((results[0].score - 1.0).abs() < 1e-5);
}

#[test]
fn test_results_sorted_and_capped_by_corpus_size() {
    let mut matcher = matcher();
    matcher.build_index(corpus(), 32).unwrap();

    let results = matcher.search_jobs("python developer", 10).unwrap();
    assert_eq!(results.len(), 4);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(results.iter().all(|r| r.score > 0.0 && r.score <= 1.0));
}

#[test]
fn test_empty_index_returns_nothing() {
    let matcher = matcher();
    assert!(matcher.index().is_empty());
    assert!(matcher.search_jobs("anything at all", 5).unwrap().is_empty());
}

#[test]
fn test_result_independent_of_batch_size() {
    let mut single = matcher();
    let mut batched = matcher();
    single.build_index(corpus(), 1).unwrap();
    batched.build_index(corpus(), 3).unwrap();

    assert!(single.index().vectors().eq(batched.index().vectors()));

    let a = single.search_jobs("rust services on linux", 4).unwrap();
    let b = batched.search_jobs("rust services on linux", 4).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_build_index_appends() {
    let mut matcher = matcher();
    let jobs = corpus();
    matcher.build_index(jobs[..2].to_vec(), 32).unwrap();
    let added = matcher.build_index(jobs[2..].to_vec(), 32).unwrap();

    assert_eq!(added, 2);
    assert_eq!(matcher.index().len(), 4);
    assert_eq!(matcher.index().records(), jobs.as_slice());
}

#[test]
fn test_add_count_mismatch_leaves_index_unchanged() {
    let mut matcher = matcher();
    matcher.build_index(python_and_frontend(), 32).unwrap();

    let jobs = corpus();
    let vectors = matcher.embedder().embed_jobs(&jobs[..2]).unwrap();

    let mut index = matcher.index().clone();
    let err = index.add(jobs[..3].to_vec(), vectors).unwrap_err();

    assert!(matches!(
        err,
        IndexError::CountMismatch {
            records: 3,
            vectors: 2
        }
    ));
    assert_eq!(index.len(), 2);
    assert_eq!(index.vector_count(), 2);
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let index_dir = dir.path().join("vector_index");

    let mut matcher = matcher();
    matcher.build_index(corpus(), 2).unwrap();
    matcher.save_index(&index_dir).unwrap();

    let mut reloaded = self::matcher();
    reloaded.load_index(&index_dir).unwrap();

    assert_eq!(reloaded.index().records(), matcher.index().records());
    assert_eq!(
        reloaded.search_jobs("data pipelines with spark", 3).unwrap(),
        matcher.search_jobs("data pipelines with spark", 3).unwrap()
    );
}

#[test]
fn test_load_missing_index_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut matcher = matcher();
    let err = matcher.load_index(dir.path()).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_load_with_other_model_fails() {
    let dir = tempfile::tempdir().unwrap();

    let mut matcher = matcher();
    matcher.build_index(corpus(), 32).unwrap();
    matcher.save_index(dir.path()).unwrap();

    let mut other = SemanticMatcher::new(Arc::new(HashingEncoder::named("other-model", 512)));
    let err = other.load_index(dir.path()).unwrap_err();

    assert!(matches!(
        err,
        MatcherError::Storage(IndexStorageError::ModelMismatch)
    ));
    assert!(other.index().is_empty());
}

#[test]
fn test_load_or_build_builds_once() {
    let dir = tempfile::tempdir().unwrap();
    let jobs_path = write_corpus(dir.path(), &corpus());
    let index_dir = dir.path().join("vector_index");

    let mut first = matcher();
    let source = first.load_or_build(&jobs_path, &index_dir, 32).unwrap();
    assert_eq!(source, IndexSource::Built);
    assert!(IndexStorage::in_dir(&index_dir).exists());

    // the corpus is no longer needed once the index exists
    std::fs::remove_file(&jobs_path).unwrap();

    let mut second = matcher();
    let source = second.load_or_build(&jobs_path, &index_dir, 32).unwrap();
    assert_eq!(source, IndexSource::Loaded);
    assert_eq!(second.index().len(), 4);
}

#[test]
fn test_corpus_with_null_fields_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let jobs_path = dir.path().join("jobs.json");
    std::fs::write(
        &jobs_path,
        r#"[{"title":"Python Developer","company":"Tech Corp","location":null,"description":null,"skills":null,"url":"http://x/1"},
            {"title":"Frontend Developer","company":"Web Inc","skills":["React"],"description":"UI work","url":"http://x/2"}]"#,
    )
    .unwrap();

    let mut matcher = matcher();
    let source = matcher
        .load_or_build(&jobs_path, &dir.path().join("vector_index"), 32)
        .unwrap();
    assert_eq!(source, IndexSource::Built);

    let results = matcher.search_jobs("python developer", 1).unwrap();
    assert_eq!(results[0].job.company, "Tech Corp");
    assert_eq!(results[0].job.description, "");
}

#[test]
fn test_load_or_build_without_corpus_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut matcher = matcher();
    let err = matcher
        .load_or_build(&dir.path().join("missing.json"), &dir.path().join("idx"), 32)
        .unwrap_err();
    assert!(matches!(err, MatcherError::Corpus(_)));
}

#[test]
fn test_resume_zero_threshold_is_top_k() {
    let mut matcher = matcher();
    matcher.build_index(corpus(), 32).unwrap();
    let resume = backend_resume();

    let matched = matcher.match_resume_to_jobs(&resume, 3, 0.0).unwrap();
    let searched = matcher.search_jobs(&resume.summary(), 3).unwrap();

    assert_eq!(matched, searched);
    assert_eq!(matched[0].job.company, "Tech Corp");
}

#[test]
fn test_resume_threshold_drops_weak_matches() {
    let mut matcher = matcher();
    matcher.build_index(corpus(), 32).unwrap();
    let resume = backend_resume();

    let all = matcher.match_resume_to_jobs(&resume, 4, 0.0).unwrap();
    let cutoff = all[1].score;
    let strong = matcher.match_resume_to_jobs(&resume, 4, cutoff).unwrap();

    assert!(strong.len() >= 2);
    assert!(strong.iter().all(|r| r.score >= cutoff));
    assert_eq!(strong[..], all[..strong.len()]);
}

#[test]
fn test_resume_threshold_one_may_return_nothing() {
    let mut matcher = matcher();
    matcher.build_index(corpus(), 32).unwrap();

    let results = matcher
        .match_resume_to_jobs(&backend_resume(), 4, 1.0)
        .unwrap();
    assert!(results.is_empty());
}

#[test]
#[ignore = "requires model download (~23MB)"]
fn test_real_model_ranks_python_job_first() {
    let dir = tempfile::tempdir().unwrap();
    let model: Arc<dyn TextEncoder> = Arc::new(
        EmbeddingModel::new("all-MiniLM-L6-v2", dir.path().to_path_buf(), None)
            .expect("Failed to initialize embedding model"),
    );
    assert_eq!(model.dimensions(), 384);

    let mut matcher = SemanticMatcher::new(model.clone());
    matcher.build_index(python_and_frontend(), 32).unwrap();

    let results = matcher
        .search_jobs("Python backend developer with AWS experience", 1)
        .unwrap();
    assert_eq!(results[0].job.company, "Tech Corp");

    let index_dir = dir.path().join("vector_index");
    matcher.save_index(&index_dir).unwrap();
    let mut reloaded = SemanticMatcher::new(model);
    reloaded.load_index(&index_dir).unwrap();
    assert_eq!(reloaded.index().len(), 2);
}
