pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod hasher;
pub mod logging;
pub mod scanner;
pub mod sizes;
pub mod utils;

pub use cli::Cli;
pub use config::Settings;
pub use duplicates::{
    DuplicateGroup, DuplicateIndex, FingerprintRecord, SortOrder, build_report, print_results,
    write_json,
};
pub use error::{ErrorPolicy, ScanError, ScanFailure};
pub use hasher::{
    ChildFingerprint, Fingerprint, hash_children, hash_file, hash_link_to_dir, hash_reader,
};
pub use scanner::{Budget, ScanSummary, Scanner};
pub use sizes::SizeAggregator;
pub use utils::{EntryInfo, format_human_elapsed, list_entries};
