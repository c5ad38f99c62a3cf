use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::duplicates::DuplicateIndex;
use crate::error::{ErrorPolicy, ScanError, ScanFailure};
use crate::hasher::{ChildFingerprint, Fingerprint, hash_children, hash_file, hash_link_to_dir};
use crate::sizes::SizeAggregator;
use crate::utils::list_entries;

/// Directory a sync client keeps its cache in; never walked by default.
pub const DEFAULT_EXCLUDED_DIR: &str = ".dropbox.cache";

/// Default ceiling on the number of files hashed in one run.
pub const DEFAULT_MAX_TO_WALK: usize = 10_000;

/// Process-wide ceiling on hashed files.
///
/// Reservation is an atomic check-and-increment, so hashing on the rayon
/// pool can never overshoot the ceiling.
#[derive(Debug)]
pub struct Budget {
    ceiling: usize,
    used: AtomicUsize,
}

impl Budget {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            used: AtomicUsize::new(0),
        }
    }

    /// Claims one file slot, or returns `false` once the ceiling is met.
    pub fn try_reserve(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.ceiling).then_some(used + 1)
            })
            .is_ok()
    }

    /// Gives back a slot whose file could not be hashed.
    pub fn release(&self) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| used.checked_sub(1));
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used() >= self.ceiling
    }
}

/// Counters and failures collected over one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    pub files_hashed: usize,
    pub dirs_fingerprinted: usize,
    /// Directories composed without at least one non-excluded child.
    pub incomplete_dirs: usize,
    pub budget_exhausted: bool,
    pub interrupted: bool,
    pub failures: Vec<ScanFailure>,
}

/// Depth-first, post-order walker that owns all state of one run.
pub struct Scanner {
    budget: Budget,
    policy: ErrorPolicy,
    excluded: Vec<String>,
    sizes: SizeAggregator,
    index: DuplicateIndex,
    dir_fingerprints: HashMap<PathBuf, Fingerprint>,
    summary: ScanSummary,
    interrupt: Arc<AtomicBool>,
    progress: ProgressBar,
}

impl Scanner {
    pub fn new(max_to_walk: usize, policy: ErrorPolicy) -> Self {
        Self {
            budget: Budget::new(max_to_walk),
            policy,
            excluded: vec![DEFAULT_EXCLUDED_DIR.to_string()],
            sizes: SizeAggregator::new(policy),
            index: DuplicateIndex::new(),
            dir_fingerprints: HashMap::new(),
            summary: ScanSummary::default(),
            interrupt: Arc::new(AtomicBool::new(false)),
            progress: ProgressBar::hidden(),
        }
    }

    /// Replaces the list of directory names that are never entered.
    pub fn with_excluded(mut self, names: Vec<String>) -> Self {
        self.excluded = names;
        self
    }

    /// Stops the walk cooperatively once `flag` is set.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = if enabled {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        self
    }

    /// Walks every root in order, filling the index.
    ///
    /// Under [`ErrorPolicy::Abort`] the first unreadable entry ends the run
    /// with an error; otherwise failures are collected in the summary.
    pub fn scan(&mut self, roots: &[PathBuf]) -> Result<(), ScanError> {
        for root in roots {
            info!("Scanning {}", root.display());
            if let Err(err) = check_is_dir(root) {
                self.handle_failure(err)?;
                continue;
            }
            match self.walk_dir(root)? {
                Some(fingerprint) => debug!("Root '{}': {}", root.display(), fingerprint),
                None => warn!("Root '{}' was not fingerprinted", root.display()),
            }
        }
        self.progress.finish_and_clear();

        info!(
            "Scan complete: {} files hashed, {} directories fingerprinted, {} failures",
            HumanCount(self.summary.files_hashed as u64),
            HumanCount(self.summary.dirs_fingerprinted as u64),
            self.summary.failures.len()
        );
        Ok(())
    }

    pub fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    pub fn index(&self) -> &DuplicateIndex {
        &self.index
    }

    /// Fingerprint recorded for a directory during this run.
    pub fn dir_fingerprint(&self, dir: &Path) -> Option<Fingerprint> {
        self.dir_fingerprints.get(dir).copied()
    }

    pub fn into_parts(self) -> (DuplicateIndex, ScanSummary) {
        (self.index, self.summary)
    }

    fn should_stop(&mut self) -> bool {
        if self.interrupt.load(Ordering::SeqCst) {
            self.summary.interrupted = true;
            return true;
        }
        false
    }

    fn is_excluded(&self, name: &OsStr) -> bool {
        self.excluded.iter().any(|excluded| OsStr::new(excluded) == name)
    }

    fn handle_failure(&mut self, err: ScanError) -> Result<(), ScanError> {
        match self.policy {
            ErrorPolicy::Abort => Err(err),
            ErrorPolicy::Continue => {
                warn!("Skipping: {}", err);
                self.summary.failures.push(ScanFailure::from(&err));
                Ok(())
            }
        }
    }

    /// Fingerprints `dir` after all of its children, returning `None` when
    /// the directory was never entered.
    fn walk_dir(&mut self, dir: &Path) -> Result<Option<Fingerprint>, ScanError> {
        if let Some(&fingerprint) = self.dir_fingerprints.get(dir) {
            debug!("Already fingerprinted '{}'", dir.display());
            return Ok(Some(fingerprint));
        }
        if self.should_stop() {
            return Ok(None);
        }
        // Only a file actually refused a slot ends the walk. A budget that
        // is exactly used up still lets directories without files finalize.
        if self.summary.budget_exhausted {
            debug!("Budget exhausted, not entering '{}'", dir.display());
            return Ok(None);
        }
        debug!("Walking '{}' ({} files so far)", dir.display(), self.budget.used());
        self.progress.set_message(dir.display().to_string());

        let entries = match list_entries(dir) {
            Ok(entries) => entries,
            Err(err) => {
                self.sizes.mark_unreadable(dir);
                self.handle_failure(err)?;
                return Ok(None);
            }
        };
        let mut fingerprints: Vec<Option<Fingerprint>> = vec![None; entries.len()];

        // Claim budget slots in listing order so the same files are chosen
        // on every run; only the hashing itself is parallel.
        let mut reserved = Vec::new();
        for (idx, _) in entries.iter().enumerate().filter(|(_, e)| !e.is_dir) {
            if self.should_stop() {
                break;
            }
            if !self.budget.try_reserve() {
                self.summary.budget_exhausted = true;
                break;
            }
            reserved.push(idx);
        }

        let hashed: Vec<Result<Fingerprint, ScanError>> = reserved
            .par_iter()
            .map(|&idx| {
                let entry = &entries[idx];
                if entry.links_to_dir {
                    Ok(hash_link_to_dir(&entry.path))
                } else {
                    hash_file(&entry.path)
                }
            })
            .collect();

        for (idx, result) in reserved.into_iter().zip(hashed) {
            let entry = &entries[idx];
            match result {
                Ok(fingerprint) => {
                    self.index.record(&fingerprint, &entry.path, entry.size);
                    self.summary.files_hashed += 1;
                    self.progress.inc(1);
                    fingerprints[idx] = Some(fingerprint);
                }
                Err(err) => {
                    self.budget.release();
                    self.handle_failure(err)?;
                }
            }
        }

        for (idx, entry) in entries.iter().enumerate().filter(|(_, e)| e.is_dir) {
            if self.is_excluded(&entry.name) {
                debug!("Skipping excluded directory '{}'", entry.path.display());
                continue;
            }
            fingerprints[idx] = self.walk_dir(&entry.path)?;
        }

        let mut incomplete = false;
        let mut children = Vec::with_capacity(entries.len());
        for (entry, fingerprint) in entries.iter().zip(fingerprints) {
            if fingerprint.is_none() && !(entry.is_dir && self.is_excluded(&entry.name)) {
                debug!(
                    "'{}' composed without a fingerprint for '{}'",
                    dir.display(),
                    entry.path.display()
                );
                incomplete = true;
            }
            children.push(ChildFingerprint::new(entry.name.clone(), fingerprint));
        }
        if incomplete {
            self.summary.incomplete_dirs += 1;
        }

        let fingerprint = hash_children(&children);
        let size = match self.sizes.dir_size(dir) {
            Ok(size) => size,
            Err(err) => {
                self.handle_failure(err)?;
                0
            }
        };
        let sizing_failures = self.sizes.take_failures();
        self.summary.failures.extend(sizing_failures);

        self.index.record(&fingerprint, dir, size);
        self.dir_fingerprints.insert(dir.to_path_buf(), fingerprint);
        self.summary.dirs_fingerprinted += 1;
        debug!("Fingerprinted '{}': {} ({} bytes)", dir.display(), fingerprint, size);

        Ok(Some(fingerprint))
    }
}

fn check_is_dir(path: &Path) -> Result<(), ScanError> {
    let metadata = fs::metadata(path).map_err(|e| ScanError::unreadable(path, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::unreadable(
            path,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }
    Ok(())
}
