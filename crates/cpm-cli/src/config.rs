//! Optional `cpm-migrate.toml` configuration.
//!
//! ```toml
//! patterns = ["**/*.fsproj"]
//! exclude = ["legacy/**"]
//! restrict_sources = true
//! missing_version = "distinct"
//! ```

use anyhow::{Context, Result};
use cpm_pkg::MissingVersionPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Looked up at the solution root when `--config` is not given.
pub const CONFIG_FILE: &str = "cpm-migrate.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Extra descriptor globs
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extra exclude globs
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub restrict_sources: Option<bool>,

    #[serde(default)]
    pub missing_version: Option<MissingVersionPolicy>,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Load `explicit` if given, otherwise `cpm-migrate.toml` at `root` if present.
    pub fn locate(explicit: Option<&Path>, root: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        let default = root.join(CONFIG_FILE);
        if default.is_file() {
            tracing::debug!(path = %default.display(), "loading configuration");
            Self::from_path(&default)
        } else {
            Ok(Self::default())
        }
    }
}

/// The directory a solution argument refers to.
pub fn solution_root(solution: &Path) -> PathBuf {
    if solution.is_file() {
        match solution.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    } else {
        solution.to_path_buf()
    }
}
