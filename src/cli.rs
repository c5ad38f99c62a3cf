use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tree-dups", version)]
#[command(about = "Find identical files and identical directory trees, ranked by size")]
pub struct Cli {
    /// Root directories to scan
    #[arg(required = true, value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Maximum number of files to hash across all roots [default: 10000]
    #[arg(long, value_name = "N")]
    pub max_to_walk: Option<usize>,

    /// Directory name never to enter (repeatable; adds to the configured list)
    #[arg(long, value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Abort the whole scan on the first unreadable file or directory
    #[arg(long)]
    pub fail_fast: bool,

    /// List the largest duplicate groups first instead of the smallest
    #[arg(long)]
    pub largest_first: bool,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Number of parallel threads for hashing (default: number of CPU cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// TOML file with default settings
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write a debug log to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Hide the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}
