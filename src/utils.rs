use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serializer;
use walkdir::WalkDir;

use crate::error::ScanError;

/// One direct child of a listed directory.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: OsString,
    pub path: PathBuf,
    pub is_dir: bool,
    /// A symbolic link whose target is a directory. It is listed as a
    /// non-directory and never walked into.
    pub links_to_dir: bool,
    pub size: u64,
}

/// Lists the direct children of `dir`, sorted by file name.
///
/// Symbolic links are not followed: a link is reported as a non-directory
/// entry with the size of the link itself.
pub fn list_entries(dir: &Path) -> Result<Vec<EntryInfo>, ScanError> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            ScanError::unreadable(path, e.into())
        })?;
        let is_dir = entry.file_type().is_dir();
        let links_to_dir = entry.path_is_symlink()
            && fs::metadata(entry.path()).is_ok_and(|target| target.is_dir());
        let size = if is_dir {
            0
        } else {
            entry
                .metadata()
                .map_err(|e| ScanError::unreadable(entry.path(), e.into()))?
                .len()
        };
        entries.push(EntryInfo {
            name: entry.file_name().to_os_string(),
            path: entry.into_path(),
            is_dir,
            links_to_dir,
            size,
        });
    }

    Ok(entries)
}

/// Serializes a path as a string, replacing invalid UTF-8 sequences.
pub fn serialize_path_lossy<S: Serializer>(
    path: &Path,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

pub fn serialize_paths_lossy<S: Serializer>(
    paths: &[PathBuf],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(paths.iter().map(|path| path.to_string_lossy()))
}

pub fn format_human_elapsed(elapsed: std::time::Duration) -> String {
    let elapsed_secs = elapsed.as_secs();
    let elapsed_subsec_millis = elapsed.subsec_millis();
    if elapsed_secs >= 3600 {
        let hours = elapsed_secs / 3600;
        let minutes = (elapsed_secs % 3600) / 60;
        let seconds = elapsed_secs % 60;
        format!("{hours}:{minutes:02}:{seconds:02}.{elapsed_subsec_millis:03} (h:mm:ss.mmm)")
    } else if elapsed_secs >= 60 {
        let minutes = elapsed_secs / 60;
        let seconds = elapsed_secs % 60;
        format!("{minutes}:{seconds:02}.{elapsed_subsec_millis:03} (m:ss.mmm)")
    } else {
        format!("{}.{:03} seconds", elapsed_secs, elapsed_subsec_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_list_entries_sorted_with_sizes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), b"12345").unwrap();
        fs::write(dir.path().join("a.txt"), b"1").unwrap();
        fs::create_dir(dir.path().join("c")).unwrap();

        let entries = list_entries(dir.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.to_string_lossy().into_owned()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "c"]);
        assert_eq!(entries[0].size, 1);
        assert_eq!(entries[1].size, 5);
        assert!(entries[2].is_dir);
        assert_eq!(entries[2].path, dir.path().join("c"));
    }

    #[cfg(unix)]
    #[test]
    fn test_list_entries_flags_links_to_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("file.txt"), b"abc").unwrap();
        std::os::unix::fs::symlink(dir.path().join("target"), dir.path().join("dir-link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("file.txt"), dir.path().join("file-link")).unwrap();

        let entries = list_entries(dir.path()).unwrap();
        let by_name = |name: &str| entries.iter().find(|e| e.name == name).unwrap();
        assert!(!by_name("dir-link").is_dir);
        assert!(by_name("dir-link").links_to_dir);
        assert!(!by_name("file-link").links_to_dir);
        assert!(!by_name("file.txt").links_to_dir);
        assert!(by_name("target").is_dir);
    }

    #[test]
    fn test_list_entries_missing_dir_is_unreadable() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");
        assert!(matches!(
            list_entries(&missing),
            Err(ScanError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_format_human_elapsed() {
        assert_eq!(format_human_elapsed(Duration::from_millis(1500)), "1.500 seconds");
        assert_eq!(format_human_elapsed(Duration::from_secs(61)), "1:01.000 (m:ss.mmm)");
        assert_eq!(
            format_human_elapsed(Duration::from_secs(3723)),
            "1:02:03.000 (h:mm:ss.mmm)"
        );
    }
}
