use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Embed the job corpus and save the vector index
    Index {
        /// Job corpus (JSON array). Defaults to `jobs_path` from config.
        #[clap(long)]
        jobs: Option<PathBuf>,

        /// Where to write jobs.index and jobs.json
        #[clap(long)]
        index_dir: Option<PathBuf>,

        /// Jobs embedded per model call
        #[clap(long)]
        batch_size: Option<usize>,

        /// Drop jobs whose url was already seen
        #[clap(long, default_value = "false")]
        dedup: bool,
    },

    /// Semantic search over the indexed jobs
    Search {
        /// Free-text query, e.g. "python backend developer with aws"
        query: String,

        /// Number of results
        #[clap(short, long)]
        k: Option<usize>,
    },

    /// Match a resume (JSON) against the indexed jobs
    MatchResume {
        /// Path to resume.json
        resume: PathBuf,

        /// Number of candidates to consider
        #[clap(short, long)]
        k: Option<usize>,

        /// Drop matches scoring below this [0.0, 1.0]
        #[clap(long)]
        min_similarity: Option<f32>,
    },

    /// Plain substring filter over the job corpus
    Filter {
        /// Title contains
        #[clap(short, long)]
        title: Option<String>,

        /// Location contains
        #[clap(short, long)]
        location: Option<String>,

        /// Company contains
        #[clap(short, long)]
        company: Option<String>,

        /// Only print the number of matches
        #[clap(long, default_value = "false")]
        count: bool,
    },
}
