use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{ErrorPolicy, ScanError, ScanFailure};
use crate::utils::list_entries;

/// Memoized total size of the files beneath each directory.
#[derive(Debug, Default)]
pub struct SizeAggregator {
    memo: HashMap<PathBuf, u64>,
    policy: ErrorPolicy,
    failures: Vec<ScanFailure>,
}

impl SizeAggregator {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            memo: HashMap::new(),
            policy,
            failures: Vec::new(),
        }
    }

    /// Total bytes of all files under `dir`, recursively.
    ///
    /// Subdirectories already sized are taken from the memo instead of being
    /// listed again. Failing to list `dir` itself is always an error; under
    /// [`ErrorPolicy::Continue`] an unreadable subdirectory counts as 0.
    pub fn dir_size(&mut self, dir: &Path) -> Result<u64, ScanError> {
        if let Some(&size) = self.memo.get(dir) {
            return Ok(size);
        }

        let mut size = 0u64;
        for entry in list_entries(dir)? {
            if !entry.is_dir {
                size += entry.size;
                continue;
            }
            size += match self.dir_size(&entry.path) {
                Ok(sub) => sub,
                Err(err) if self.policy == ErrorPolicy::Continue => {
                    warn!("Counting '{}' as empty: {}", entry.path.display(), err);
                    self.failures.push(ScanFailure::from(&err));
                    self.mark_unreadable(&entry.path);
                    0
                }
                Err(err) => return Err(err),
            };
        }

        debug!("Size of '{}': {} bytes", dir.display(), size);
        self.memo.insert(dir.to_path_buf(), size);
        Ok(size)
    }

    /// Memoizes a directory that could not be listed as holding nothing.
    pub fn mark_unreadable(&mut self, dir: &Path) {
        self.memo.insert(dir.to_path_buf(), 0);
    }

    pub fn cached(&self, dir: &Path) -> Option<u64> {
        self.memo.get(dir).copied()
    }

    /// Failures met while sizing, drained so each is reported once.
    pub fn take_failures(&mut self) -> Vec<ScanFailure> {
        std::mem::take(&mut self.failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_dir_size_sums_nested_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), b"hello").unwrap();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("sub/b.txt"), b"abc").unwrap();
        fs::write(root.join("sub/deeper/c.txt"), b"zz").unwrap();
        fs::create_dir(root.join("empty")).unwrap();

        let mut sizes = SizeAggregator::new(ErrorPolicy::Abort);
        assert_eq!(sizes.dir_size(root).unwrap(), 10);
        assert_eq!(sizes.cached(&root.join("sub")), Some(5));
        assert_eq!(sizes.cached(&root.join("sub/deeper")), Some(2));
        assert_eq!(sizes.cached(&root.join("empty")), Some(0));
    }

    #[test]
    fn test_memo_is_reused_instead_of_relisting() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/b.txt"), b"abc").unwrap();

        let mut sizes = SizeAggregator::new(ErrorPolicy::Abort);
        assert_eq!(sizes.dir_size(&root.join("sub")).unwrap(), 3);

        // Grow the subtree on disk; the memoized value must win.
        fs::write(root.join("sub/late.txt"), b"1234").unwrap();
        fs::write(root.join("top.txt"), b"1").unwrap();
        assert_eq!(sizes.dir_size(root).unwrap(), 4);
    }

    #[test]
    fn test_marked_unreadable_dir_counts_as_empty() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/b.txt"), b"abc").unwrap();
        fs::write(root.join("top.txt"), b"1").unwrap();

        let mut sizes = SizeAggregator::new(ErrorPolicy::Continue);
        sizes.mark_unreadable(&root.join("sub"));
        assert_eq!(sizes.dir_size(root).unwrap(), 1);
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let mut sizes = SizeAggregator::new(ErrorPolicy::Continue);
        assert!(sizes.dir_size(&dir.path().join("gone")).is_err());
        assert!(sizes.take_failures().is_empty());
    }
}
