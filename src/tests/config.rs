use crate::config::Config;

fn base(dir: &tempfile::TempDir) -> &str {
    dir.path().to_str().unwrap()
}

#[test]
fn test_defaults_written_on_first_load() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_with(base(&dir)).unwrap();

    assert!(dir.path().join("config.yaml").exists());
    assert_eq!(config.semantic_search.model, "all-MiniLM-L6-v2");
    assert_eq!(config.semantic_search.batch_size, 32);
    assert_eq!(config.semantic_search.default_k, 5);
    assert_eq!(config.semantic_search.min_similarity, 0.0);
    assert_eq!(config.jobs_path(), dir.path().join("data/jobs.json"));
    assert_eq!(config.index_dir(), dir.path().join("data/vector_index"));
}

#[test]
fn test_missing_keys_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "jobs_path: scraped/all_jobs.json\nsemantic_search:\n  default_k: 10\n",
    )
    .unwrap();

    let config = Config::load_with(base(&dir)).unwrap();
    assert_eq!(config.jobs_path(), dir.path().join("scraped/all_jobs.json"));
    assert_eq!(config.semantic_search.default_k, 10);
    assert_eq!(config.semantic_search.batch_size, 32);

    // resaved with the filled-in keys
    let saved = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    assert!(saved.contains("index_dir"));
    assert!(saved.contains("min_similarity"));
}

#[test]
fn test_out_of_range_min_similarity_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "semantic_search:\n  min_similarity: 1.5\n",
    )
    .unwrap();

    let err = Config::load_with(base(&dir)).unwrap_err();
    assert!(err.to_string().contains("min_similarity"));
}

#[test]
fn test_zero_batch_size_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "semantic_search:\n  batch_size: 0\n",
    )
    .unwrap();

    assert!(Config::load_with(base(&dir)).is_err());
}

#[test]
fn test_malformed_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.yaml"), "semantic_search: [1, 2").unwrap();

    assert!(Config::load_with(base(&dir)).is_err());
}
