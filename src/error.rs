use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while walking and fingerprinting a tree.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A directory could not be listed, or a file could not be opened or read.
    #[error("cannot read '{}': {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    pub fn unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Unreadable { path, .. } => path,
        }
    }
}

/// What the walker does when a file or directory cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Record the failure, leave the entry out of the index and keep walking.
    #[default]
    Continue,
    /// Stop the whole run on the first failure.
    Abort,
}

/// An entry left out of the index because it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    #[serde(serialize_with = "crate::utils::serialize_path_lossy")]
    pub path: PathBuf,
    pub message: String,
}

impl From<&ScanError> for ScanFailure {
    fn from(err: &ScanError) -> Self {
        match err {
            ScanError::Unreadable { path, source } => Self {
                path: path.clone(),
                message: source.to_string(),
            },
        }
    }
}
