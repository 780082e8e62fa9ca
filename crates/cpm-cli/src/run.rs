//! Implementation of a `cpm-migrate` run.

use crate::config::Config;
use crate::persist::{persist, PersistError};
use anyhow::Context;
use cpm_pkg::{
    DiscoveryOptions, Migration, MigrationOptions, MigrationReport, MissingVersionPolicy,
    Solution, SourcesOutcome,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a run failed, split by whether files may have been changed.
#[derive(Error, Debug)]
pub enum RunError {
    /// Nothing was written
    #[error(transparent)]
    Aborted(#[from] anyhow::Error),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl RunError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Aborted(_) | Self::Persist(PersistError::Stage { .. }) => 1,
            Self::Persist(PersistError::Commit { .. }) => 3,
        }
    }
}

/// Options for a run, after merging the command line with the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub solution: PathBuf,
    pub patterns: Vec<String>,
    pub excludes: Vec<String>,
    pub missing_version: MissingVersionPolicy,
    pub restrict_sources: bool,
    /// Plan and report without writing
    pub dry_run: bool,
}

impl RunOptions {
    /// Options with defaults for everything but the solution
    pub fn new(solution: impl Into<PathBuf>) -> Self {
        Self {
            solution: solution.into(),
            patterns: Vec::new(),
            excludes: Vec::new(),
            missing_version: MissingVersionPolicy::default(),
            restrict_sources: true,
            dry_run: false,
        }
    }

    /// Fill in whatever the command line left open from `config`.
    ///
    /// Patterns and excludes from both are unioned, config entries first.
    #[must_use]
    pub fn with_config(
        mut self,
        config: Config,
        missing_version: Option<MissingVersionPolicy>,
        no_restrict_sources: bool,
    ) -> Self {
        self.patterns = union(config.patterns, self.patterns);
        self.excludes = union(config.exclude, self.excludes);
        self.missing_version = missing_version
            .or(config.missing_version)
            .unwrap_or_default();
        self.restrict_sources = !no_restrict_sources && config.restrict_sources.unwrap_or(true);
        self
    }
}

fn union(first: Vec<String>, second: Vec<String>) -> Vec<String> {
    let mut merged = first;
    for item in second {
        if !merged.contains(&item) {
            merged.push(item);
        }
    }
    merged
}

/// Result of a run.
#[derive(Debug)]
pub struct RunResult {
    pub root: PathBuf,
    pub report: MigrationReport,
    /// Files written, or that would be written in a dry run
    pub written: usize,
    pub dry_run: bool,
}

impl RunResult {
    fn relative<'a>(&self, path: &'a Path) -> std::path::Display<'a> {
        path.strip_prefix(&self.root).unwrap_or(path).display()
    }

    /// Print a summary of the migration.
    pub fn print_summary(&self) {
        let report = &self.report;
        println!(
            "Found {} package reference(s) in {} descriptor(s)",
            report.declarations, report.descriptors
        );

        if !report.rewritten.is_empty() {
            println!("Versions removed from:");
            for path in &report.rewritten {
                println!("  ~ {}", self.relative(path));
            }
        }

        let state = if report.manifest_changed { "written" } else { "unchanged" };
        println!("{} ({state}):", self.relative(&report.manifest));
        for package in &report.packages {
            println!("  {} {}", package.name, package.version);
        }

        if let SourcesOutcome::Restricted { source } = &report.sources {
            println!("Package sources restricted to '{source}'");
        }

        for warning in &report.warnings {
            println!("warning: {warning}");
        }

        if self.dry_run {
            println!("Dry run: {} file(s) would be written", self.written);
        } else if self.written == 0 {
            println!("Nothing to do.");
        } else {
            println!("Wrote {} file(s)", self.written);
        }
    }
}

/// Migrate the solution described by `options`.
pub fn run(options: &RunOptions) -> Result<RunResult, RunError> {
    let discovery = DiscoveryOptions::new(options.patterns.clone(), options.excludes.clone());
    let solution = Solution::discover(&options.solution, &discovery)
        .with_context(|| format!("Failed to discover {}", options.solution.display()))?;
    let input = solution.load().context("Failed to read solution files")?;

    let plan = Migration::new(MigrationOptions {
        missing_version: options.missing_version,
        restrict_sources: options.restrict_sources,
    })
    .plan(input)
    .context("Migration aborted, no files were changed")?;

    let written = if options.dry_run {
        for write in &plan.writes {
            tracing::info!(path = %write.path.display(), kind = ?write.kind, "would write");
        }
        plan.writes.len()
    } else {
        persist(&plan.writes)?
    };
    tracing::info!(written, dry_run = options.dry_run, "migration complete");

    Ok(RunResult {
        root: solution.root,
        report: plan.report,
        written,
        dry_run: options.dry_run,
    })
}
