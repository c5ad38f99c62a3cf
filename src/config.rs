//! Run settings: built-in defaults, overridden by an optional TOML file,
//! overridden by command-line flags.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::duplicates::SortOrder;
use crate::error::ErrorPolicy;
use crate::scanner::{DEFAULT_EXCLUDED_DIR, DEFAULT_MAX_TO_WALK, Scanner};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub max_to_walk: usize,
    pub exclude: Vec<String>,
    pub on_error: ErrorPolicy,
    pub order: SortOrder,
    pub threads: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_to_walk: DEFAULT_MAX_TO_WALK,
            exclude: vec![DEFAULT_EXCLUDED_DIR.to_string()],
            on_error: ErrorPolicy::default(),
            order: SortOrder::default(),
            threads: None,
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid settings file")
    }

    /// Reads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: '{}'", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: '{}'", path.display()))
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(max_to_walk) = cli.max_to_walk {
            self.max_to_walk = max_to_walk;
        }
        for name in &cli.exclude {
            if !self.exclude.contains(name) {
                self.exclude.push(name.clone());
            }
        }
        if cli.fail_fast {
            self.on_error = ErrorPolicy::Abort;
        }
        if cli.largest_first {
            self.order = SortOrder::Descending;
        }
        if cli.threads.is_some() {
            self.threads = cli.threads;
        }
    }

    pub fn scanner(&self) -> Scanner {
        Scanner::new(self.max_to_walk, self.on_error).with_excluded(self.exclude.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_to_walk, 10_000);
        assert_eq!(settings.exclude, [".dropbox.cache"]);
        assert_eq!(settings.on_error, ErrorPolicy::Continue);
        assert_eq!(settings.order, SortOrder::Ascending);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            max_to_walk = 50
            on_error = "abort"
            order = "descending"
            "#,
        )
        .unwrap();
        assert_eq!(settings.max_to_walk, 50);
        assert_eq!(settings.on_error, ErrorPolicy::Abort);
        assert_eq!(settings.order, SortOrder::Descending);
        assert_eq!(settings.exclude, [".dropbox.cache"]);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Settings::from_toml_str("max_to_wlak = 3").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut settings = Settings::from_toml_str("max_to_walk = 50\nexclude = [\".git\"]").unwrap();
        let cli = Cli::try_parse_from([
            "tree-dups",
            "--max-to-walk",
            "7",
            "--exclude",
            "node_modules",
            "--fail-fast",
            "root",
        ])
        .unwrap();
        settings.apply_cli(&cli);
        assert_eq!(settings.max_to_walk, 7);
        assert_eq!(settings.exclude, [".git", "node_modules"]);
        assert_eq!(settings.on_error, ErrorPolicy::Abort);
        assert_eq!(settings.order, SortOrder::Ascending);
    }

    #[test]
    fn test_load_without_path_is_default() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }
}
