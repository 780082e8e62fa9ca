//! Central package management migration for MSBuild solutions.
//!
//! This crate provides:
//! - Discovery of project files and build overrides in a solution
//! - Extraction of `PackageReference` declarations and their versions
//! - Version reconciliation with conflict detection
//! - Format-preserving removal of in-place versions
//! - Generation of `Directory.Packages.props`
//! - Optional restriction of `nuget.config` to a single package source

mod descriptor;
mod manifest;
mod migrate;
mod reconcile;
mod rewrite;
mod solution;
mod sources;

pub use descriptor::{
    locate_version, parse_declarations, DependencyDeclaration, Descriptor, DescriptorError,
    VersionForm, VersionLocation, INCLUDE_ATTRIBUTE, ITEM_GROUP, PACKAGE_REFERENCE,
    VERSION_LOCATIONS,
};
pub use manifest::{
    generate_manifest, pinned_versions, read_manifest, update_manifest, MANAGE_CENTRALLY_PROPERTY,
    MANIFEST_FILE, PACKAGE_VERSION,
};
pub use migrate::{
    FileKind, FileWrite, Migration, MigrationError, MigrationInput, MigrationOptions,
    MigrationPlan, MigrationReport, SourceFile, SourcesOutcome,
};
pub use reconcile::{
    compare_versions, Conflict, ConflictError, MissingVersionError, MissingVersionPolicy,
    ObservedVersion, Observation, ReconcileError, ReconciliationResult, Reconciler,
    ResolvedVersion, VersionMap,
};
pub use rewrite::{strip_versions, Rewrite, RewriteError};
pub use solution::{
    parse_solution_projects, DiscoveryError, DiscoveryOptions, Solution, BUILD_OVERRIDE_PATTERNS,
    DEFAULT_EXCLUDES, DEFAULT_PATTERN, PROJECT_EXTENSIONS,
};
pub use sources::{
    restrict_sources, PackageSource, SkipReason, SourceConfig, SourceRestriction,
    SOURCE_CONFIG_FILE,
};
