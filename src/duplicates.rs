use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;
use indicatif::{HumanBytes, HumanCount};
use log::info;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::ScanFailure;
use crate::hasher::Fingerprint;
use crate::scanner::ScanSummary;

/// Every path sharing one fingerprint, and the bytes they add up to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintRecord {
    pub paths: Vec<PathBuf>,
    pub total_size: u64,
}

/// Fingerprint (hex) to owning paths, filled during the walk.
///
/// Append-only: paths are never removed or re-recorded.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    records: HashMap<String, FingerprintRecord>,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `path` as an owner of `fingerprint`, contributing `size` bytes.
    pub fn record(&mut self, fingerprint: &Fingerprint, path: &Path, size: u64) {
        let record = self.records.entry(fingerprint.to_hex()).or_default();
        record.paths.push(path.to_path_buf());
        record.total_size += size;
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&FingerprintRecord> {
        self.records.get(&fingerprint.to_hex())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FingerprintRecord)> {
        self.records.iter()
    }

    /// Number of distinct fingerprints seen.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Direction the report is ordered in, by aggregate size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Smallest duplicated footprint first.
    #[default]
    Ascending,
    /// Largest duplicated footprint first.
    Descending,
}

/// A fingerprint owned by two or more paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub fingerprint: String,
    #[serde(serialize_with = "crate::utils::serialize_paths_lossy")]
    pub paths: Vec<PathBuf>,
    pub total_size: u64,
}

/// Keeps only fingerprints with more than one owner, ordered by total size.
///
/// Groups of equal size are ordered by fingerprint so repeated runs over the
/// same tree print the same report.
pub fn build_report(index: DuplicateIndex, order: SortOrder) -> Vec<DuplicateGroup> {
    let total_groups = index.len();
    let mut groups: Vec<DuplicateGroup> = index
        .records
        .into_iter()
        .filter(|(_, record)| record.paths.len() > 1)
        .map(|(fingerprint, record)| DuplicateGroup {
            fingerprint,
            paths: record.paths,
            total_size: record.total_size,
        })
        .collect();

    groups.sort_by(|a, b| {
        let by_size = match order {
            SortOrder::Ascending => a.total_size.cmp(&b.total_size),
            SortOrder::Descending => b.total_size.cmp(&a.total_size),
        };
        by_size.then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });

    info!(
        "Duplicate analysis complete: {} unique fingerprints, {} duplicate groups",
        HumanCount(total_groups as u64),
        HumanCount(groups.len() as u64)
    );
    groups
}

pub fn print_results(groups: &[DuplicateGroup], summary: &ScanSummary) {
    if groups.is_empty() {
        println!("{}", "No duplicates found!".green());
    }

    for group in groups {
        println!(
            "{} {} ({}, {} owners)",
            "Duplicate group".yellow().bold(),
            group.fingerprint.dimmed(),
            HumanBytes(group.total_size),
            group.paths.len()
        );
        for path in &group.paths {
            println!("  {}", path.display());
        }
    }

    if summary.budget_exhausted {
        println!(
            "{}",
            format!(
                "File budget reached after {} files; directory fingerprints may be incomplete",
                HumanCount(summary.files_hashed as u64)
            )
            .yellow()
        );
    }
    if summary.interrupted {
        println!("{}", "Scan interrupted; results are partial".yellow());
    }
    print_failures(&summary.failures);
}

fn print_failures(failures: &[ScanFailure]) {
    if failures.is_empty() {
        return;
    }
    println!(
        "{}",
        format!("{} entries could not be read:", failures.len()).red().bold()
    );
    for failure in failures {
        println!("  {}: {}", failure.path.display(), failure.message);
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    files_hashed: usize,
    directories_fingerprinted: usize,
    incomplete_directories: usize,
    budget_exhausted: bool,
    interrupted: bool,
    groups: &'a [DuplicateGroup],
    failures: &'a [ScanFailure],
}

/// Writes the report and scan summary as a JSON document.
pub fn write_json<W: Write>(
    mut writer: W,
    groups: &[DuplicateGroup],
    summary: &ScanSummary,
) -> Result<()> {
    let report = JsonReport {
        generated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
        files_hashed: summary.files_hashed,
        directories_fingerprinted: summary.dirs_fingerprinted,
        incomplete_directories: summary.incomplete_dirs,
        budget_exhausted: summary.budget_exhausted,
        interrupted: summary.interrupted,
        groups,
        failures: &summary.failures,
    };
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writeln!(writer)?;
    Ok(())
}
