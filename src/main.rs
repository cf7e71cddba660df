use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod jobs;
mod lock;
mod resume;
mod semantic;
#[cfg(test)]
mod tests;

use config::Config;
use jobs::JobFilter;
use lock::IndexLock;
use semantic::{IndexSource, SemanticMatcher};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the persisted index, building it first if it does not exist.
fn open_matcher(config: &Config) -> anyhow::Result<SemanticMatcher> {
    let index_dir = config.index_dir();
    let sem = &config.semantic_search;
    let mut matcher = SemanticMatcher::from_config(sem, config.base_path())
        .context("failed to load embedding model")?;

    {
        let _guard = IndexLock::shared(&index_dir)?;
        match matcher.load_index(&index_dir) {
            Ok(()) => {
                if matcher.index().is_empty() {
                    log::warn!("index in {} holds no jobs", index_dir.display());
                }
                return Ok(matcher);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e).context("failed to load index"),
        }
    }

    // another reader may be building it; wait, then load what it saved
    let _guard = IndexLock::exclusive(&index_dir)?;
    let source = matcher
        .load_or_build(&config.jobs_path(), &index_dir, sem.batch_size)
        .context("failed to build index")?;
    if source == IndexSource::Built {
        log::info!("built new index in {}", index_dir.display());
    }

    Ok(matcher)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = cli::Args::parse();

    let base_path = std::env::var("JOBMATCH_BASE_PATH").unwrap_or_else(|_| ".".to_string());
    let config = Config::load_with(&base_path)?;
    let sem = &config.semantic_search;

    match args.command {
        cli::Command::Index {
            jobs,
            index_dir,
            batch_size,
            dedup,
        } => {
            let jobs_path = jobs.unwrap_or_else(|| config.jobs_path());
            let index_dir = index_dir.unwrap_or_else(|| config.index_dir());
            let batch_size = batch_size.unwrap_or(sem.batch_size);

            let mut corpus = jobs::load_jobs(&jobs_path)?;
            if dedup {
                let before = corpus.len();
                corpus = jobs::dedup_by_url(corpus);
                log::info!("dropped {} duplicate jobs", before - corpus.len());
            }

            let _guard = IndexLock::try_exclusive(&index_dir)
                .with_context(|| format!("cannot lock {}", index_dir.display()))?;

            let _span = tracing::info_span!("index", jobs = corpus.len()).entered();
            let mut matcher = SemanticMatcher::from_config(sem, config.base_path())
                .context("failed to load embedding model")?;
            let count = matcher.build_index(corpus, batch_size)?;
            matcher.save_index(&index_dir)?;

            println!("{count} jobs indexed into {}", index_dir.display());
            Ok(())
        }

        cli::Command::Search { query, k } => {
            let matcher = open_matcher(&config)?;
            let results = matcher.search_jobs(&query, k.unwrap_or(sem.default_k))?;
            print_json(&results)
        }

        cli::Command::MatchResume {
            resume,
            k,
            min_similarity,
        } => {
            let resume = read_resume(&resume)?;
            let matcher = open_matcher(&config)?;
            let results = matcher.match_resume_to_jobs(
                &resume,
                k.unwrap_or(sem.default_k),
                min_similarity.unwrap_or(sem.min_similarity),
            )?;
            print_json(&results)
        }

        cli::Command::Filter {
            title,
            location,
            company,
            count,
        } => {
            let corpus = jobs::load_jobs(&config.jobs_path())?;
            let filter = JobFilter {
                title,
                location,
                company,
            };
            let found = filter.apply(&corpus);

            if count {
                println!("{} jobs found", found.len());
                return Ok(());
            }

            print_json(&found)
        }
    }
}

fn read_resume(path: &Path) -> anyhow::Result<resume::Resume> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read resume {}", path.display()))?;
    serde_json::from_slice(&data).context("resume is malformed")
}
