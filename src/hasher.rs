use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use log::debug;
use serde::{Serialize, Serializer};

use crate::error::ScanError;

/// Read size used when streaming file contents into the digest.
pub const CHUNK_SIZE: usize = 10 * 1024;

/// Content digest of a file, or of a directory's children.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; blake3::OUT_LEN]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; blake3::OUT_LEN] {
        &self.0
    }

    /// Lowercase hex form, used as the index key and in reports.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Streams `reader` to exhaustion through BLAKE3 in `CHUNK_SIZE` reads.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0; CHUNK_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().into())
}

/// Fingerprints the contents of the file at `path`.
///
/// The file handle is dropped on every return path.
pub fn hash_file(path: &Path) -> Result<Fingerprint, ScanError> {
    let file = fs::File::open(path).map_err(|e| ScanError::unreadable(path, e))?;
    let fingerprint = hash_reader(file).map_err(|e| ScanError::unreadable(path, e))?;
    debug!("Hashed '{}': {}", path.display(), fingerprint);
    Ok(fingerprint)
}

/// Fingerprint of a symbolic link to a directory: the digest of no content.
///
/// Links are never followed, so a link to a directory matches an empty file.
pub fn hash_link_to_dir(path: &Path) -> Fingerprint {
    let fingerprint = blake3::Hasher::new().finalize().into();
    debug!("Link to directory '{}': {}", path.display(), fingerprint);
    fingerprint
}

/// A direct child of a directory being finalized.
///
/// `fingerprint` is `None` when the child was never fingerprinted: it was
/// excluded, unreadable, or left behind by the file budget.
#[derive(Debug, Clone)]
pub struct ChildFingerprint {
    pub name: OsString,
    pub fingerprint: Option<Fingerprint>,
}

impl ChildFingerprint {
    pub fn new(name: impl Into<OsString>, fingerprint: Option<Fingerprint>) -> Self {
        Self {
            name: name.into(),
            fingerprint,
        }
    }
}

/// Derives a directory fingerprint from its direct children.
///
/// Children are ordered by name (byte-wise) and their fingerprints fed, in
/// that order, into a single digest. Children without a fingerprint add
/// nothing. Absolute paths, timestamps and permissions never take part.
pub fn hash_children(children: &[ChildFingerprint]) -> Fingerprint {
    let mut sorted: Vec<&ChildFingerprint> = children.iter().collect();
    sorted.sort_by(|a, b| a.name.as_encoded_bytes().cmp(b.name.as_encoded_bytes()));

    let mut hasher = blake3::Hasher::new();
    for child in sorted {
        if let Some(fingerprint) = &child.fingerprint {
            hasher.update(fingerprint.as_bytes());
        }
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn fp(content: &[u8]) -> Fingerprint {
        hash_reader(Cursor::new(content)).unwrap()
    }

    #[test]
    fn test_hash_reader_matches_one_shot_digest_across_chunks() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = hash_reader(Cursor::new(&data)).unwrap();
        assert_eq!(streamed, Fingerprint::from(blake3::hash(&data)));
    }

    #[test]
    fn test_link_to_dir_hashes_as_empty_content() {
        assert_eq!(hash_link_to_dir(Path::new("any/link")), fp(b""));
    }

    #[test]
    fn test_hex_is_lowercase_and_fixed_length() {
        let hex = fp(b"hello").to_hex();
        assert_eq!(hex.len(), blake3::OUT_LEN * 2);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(hex, blake3::hash(b"hello").to_hex().to_string());
    }

    #[test]
    fn test_hash_file_reports_missing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.txt");
        match hash_file(&missing) {
            Err(ScanError::Unreadable { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected unreadable error, got {:?}", other),
        }
    }

    #[test]
    fn test_hash_file_matches_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(hash_file(&path).unwrap(), fp(b"hello"));
    }

    #[test]
    fn test_children_are_ordered_by_name_not_listing_order() {
        let forward = [
            ChildFingerprint::new("1.txt", Some(fp(b"X"))),
            ChildFingerprint::new("2.txt", Some(fp(b"Y"))),
        ];
        let reversed = [forward[1].clone(), forward[0].clone()];
        assert_eq!(hash_children(&forward), hash_children(&reversed));
    }

    #[test]
    fn test_swapping_contents_between_names_changes_fingerprint() {
        let a = [
            ChildFingerprint::new("1.txt", Some(fp(b"X"))),
            ChildFingerprint::new("2.txt", Some(fp(b"Y"))),
        ];
        let b = [
            ChildFingerprint::new("2.txt", Some(fp(b"X"))),
            ChildFingerprint::new("1.txt", Some(fp(b"Y"))),
        ];
        assert_ne!(hash_children(&a), hash_children(&b));
    }

    #[test]
    fn test_missing_child_contributes_nothing() {
        let with_gap = [
            ChildFingerprint::new("a", Some(fp(b"A"))),
            ChildFingerprint::new("b", None),
        ];
        let without = [ChildFingerprint::new("a", Some(fp(b"A")))];
        assert_eq!(hash_children(&with_gap), hash_children(&without));
    }

    #[test]
    fn test_empty_directory_digest_is_digest_of_nothing() {
        assert_eq!(hash_children(&[]), fp(b""));
    }
}
