//! Planning a migration from in-place versions to a central manifest.
//!
//! A plan is computed entirely in memory. Nothing is written here: callers
//! persist [`MigrationPlan::writes`] only once planning has succeeded for
//! the whole solution.

use crate::manifest::{generate_manifest, pinned_versions, update_manifest};
use crate::reconcile::{MissingVersionPolicy, Reconciler, ResolvedVersion};
use crate::rewrite::strip_versions;
use crate::sources::{restrict_sources, SkipReason, SourceConfig, SourceRestriction};
use crate::{DependencyDeclaration, Descriptor, DescriptorError, ReconcileError, RewriteError};
use cpm_core::Document;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort planning. No file has been touched when one is returned.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

/// A file read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Everything a migration reads.
#[derive(Debug, Clone)]
pub struct MigrationInput {
    pub descriptors: Vec<SourceFile>,
    /// Path the central manifest is written to
    pub manifest_path: PathBuf,
    /// The central manifest, if one already exists
    pub manifest: Option<String>,
    /// The source configuration, if one exists
    pub source_config: Option<SourceFile>,
}

/// Options that change how a migration is planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    pub missing_version: MissingVersionPolicy,
    pub restrict_sources: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            missing_version: MissingVersionPolicy::default(),
            restrict_sources: true,
        }
    }
}

/// What a planned write replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Descriptor,
    Manifest,
    SourceConfig,
}

/// New content for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: PathBuf,
    pub content: String,
    pub kind: FileKind,
}

/// How the source restriction step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourcesOutcome {
    Restricted { source: String },
    Skipped { reason: String },
    Disabled,
}

/// Summary of a planned migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Number of descriptors read
    pub descriptors: usize,
    /// Number of package references found in them
    pub declarations: usize,
    /// Descriptors that had versions removed
    pub rewritten: Vec<PathBuf>,
    /// Packages pinned in the manifest
    pub packages: Vec<ResolvedVersion>,
    /// Packages never given a version
    pub unversioned: Vec<String>,
    pub manifest: PathBuf,
    /// False when the manifest already had exactly this content
    pub manifest_changed: bool,
    pub sources: SourcesOutcome,
    pub warnings: Vec<String>,
}

/// The result of planning: every pending write and what it amounts to.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub writes: Vec<FileWrite>,
    pub report: MigrationReport,
}

impl MigrationPlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Plans migrations with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Migration {
    options: MigrationOptions,
}

impl Migration {
    #[must_use]
    pub fn new(options: MigrationOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Compute every write needed to migrate `input`.
    ///
    /// Descriptors are parsed in parallel and reconciled in input order, so
    /// the same input always produces the same plan.
    pub fn plan(&self, input: MigrationInput) -> Result<MigrationPlan, MigrationError> {
        let MigrationInput {
            descriptors,
            manifest_path,
            manifest,
            source_config,
        } = input;

        let parsed: Vec<(Descriptor, Vec<DependencyDeclaration>)> = descriptors
            .into_par_iter()
            .map(|file| -> Result<_, DescriptorError> {
                let descriptor = Descriptor::parse(file.path, file.content)?;
                let declarations = descriptor.declarations();
                tracing::debug!(
                    path = %descriptor.path().display(),
                    declarations = declarations.len(),
                    "parsed descriptor"
                );
                Ok((descriptor, declarations))
            })
            .collect::<Result<_, _>>()?;

        let existing = manifest
            .map(|content| {
                Document::parse(content).map_err(|source| DescriptorError {
                    path: manifest_path.clone(),
                    source,
                })
            })
            .transpose()?;

        let mut reconciler = Reconciler::new(self.options.missing_version);
        if let Some(document) = &existing {
            let pinned = pinned_versions(document, &manifest_path);
            tracing::debug!(pinned = pinned.len(), "seeded from existing manifest");
            reconciler.seed(&pinned);
        }
        for (_, declarations) in &parsed {
            reconciler.accumulate(declarations);
        }

        let declarations: usize = parsed.iter().map(|(_, d)| d.len()).sum();
        let resolution = reconciler.finalize()?;
        tracing::info!(
            packages = resolution.resolved.len(),
            unversioned = resolution.unversioned.len(),
            "reconciled versions"
        );

        let mut writes = Vec::new();
        let mut rewritten = Vec::new();
        for (descriptor, declarations) in &parsed {
            let rewrite = strip_versions(descriptor, declarations)?;
            if rewrite.changed {
                rewritten.push(rewrite.path.clone());
                writes.push(FileWrite {
                    path: rewrite.path,
                    content: rewrite.content,
                    kind: FileKind::Descriptor,
                });
            }
        }

        let content = match &existing {
            Some(document) => update_manifest(document, &manifest_path, &resolution.resolved)?,
            None => generate_manifest(&resolution.resolved),
        };
        let manifest_changed = existing.as_ref().map(Document::source) != Some(content.as_str());
        if manifest_changed {
            writes.push(FileWrite {
                path: manifest_path.clone(),
                content,
                kind: FileKind::Manifest,
            });
        }

        let mut warnings: Vec<String> = resolution
            .unversioned
            .iter()
            .map(|name| format!("'{name}' has no version anywhere and is left unmanaged"))
            .collect();

        let sources = if self.options.restrict_sources {
            match Self::restrict(source_config) {
                Ok((source, write)) => {
                    writes.push(write);
                    SourcesOutcome::Restricted { source }
                }
                Err(reason) => {
                    tracing::warn!(%reason, "source restriction skipped");
                    warnings.push(format!("source restriction skipped: {reason}"));
                    SourcesOutcome::Skipped {
                        reason: reason.to_string(),
                    }
                }
            }
        } else {
            SourcesOutcome::Disabled
        };

        Ok(MigrationPlan {
            writes,
            report: MigrationReport {
                descriptors: parsed.len(),
                declarations,
                rewritten,
                packages: resolution.resolved,
                unversioned: resolution.unversioned,
                manifest: manifest_path,
                manifest_changed,
                sources,
                warnings,
            },
        })
    }

    fn restrict(config: Option<SourceFile>) -> Result<(String, FileWrite), SkipReason> {
        let file = config.ok_or(SkipReason::NotFound)?;
        let parsed =
            SourceConfig::parse(file.content).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
        match restrict_sources(&parsed) {
            SourceRestriction::Restricted { source, content } => {
                tracing::info!(%source, path = %file.path.display(), "restricted package sources");
                Ok((
                    source,
                    FileWrite {
                        path: file.path,
                        content,
                        kind: FileKind::SourceConfig,
                    },
                ))
            }
            SourceRestriction::Skipped(reason) => Err(reason),
        }
    }
}
