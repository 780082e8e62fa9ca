//! Version reconciliation across a solution.
//!
//! This module provides:
//! - Accumulation of every observed version per package name
//! - Seeding from an existing central manifest
//! - Conflict detection with a configurable policy for missing versions

use crate::DependencyDeclaration;
use semver::Version;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors that end reconciliation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    MissingVersion(#[from] MissingVersionError),
}

/// One or more packages are declared with different versions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("version conflicts in {} package(s):\n  {}", .conflicts.len(), format_conflicts(.conflicts))]
pub struct ConflictError {
    pub conflicts: Vec<Conflict>,
}

impl ConflictError {
    /// Names of every conflicting package, in first-seen order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.conflicts.iter().map(|c| c.name.as_str())
    }
}

fn format_conflicts(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n  ")
}

/// Declarations without a version were found under [`MissingVersionPolicy::Fail`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} package reference(s) have no version:\n  {}", .declarations.len(), format_missing(.declarations))]
pub struct MissingVersionError {
    /// Package name and the descriptor that declared it
    pub declarations: Vec<(String, PathBuf)>,
}

fn format_missing(declarations: &[(String, PathBuf)]) -> String {
    declarations
        .iter()
        .map(|(name, path)| format!("{name} (in {})", path.display()))
        .collect::<Vec<_>>()
        .join("\n  ")
}

/// How declarations without a version take part in reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingVersionPolicy {
    /// Absence is a version of its own and can conflict
    #[default]
    Distinct,
    /// Absence is reported but never conflicts
    Ignore,
    /// Any absence aborts the migration
    Fail,
}

impl MissingVersionPolicy {
    /// Every policy, in the order they are documented
    pub const ALL: [Self; 3] = [Self::Distinct, Self::Ignore, Self::Fail];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Distinct => "distinct",
            Self::Ignore => "ignore",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for MissingVersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissingVersionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown missing-version policy '{s}' (expected distinct, ignore or fail)"))
    }
}

/// A version as observed on one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObservedVersion {
    Declared(String),
    /// The declaration carried no version
    Absent,
}

impl ObservedVersion {
    #[must_use]
    pub fn as_declared(&self) -> Option<&str> {
        match self {
            Self::Declared(v) => Some(v),
            Self::Absent => None,
        }
    }
}

impl From<Option<&str>> for ObservedVersion {
    fn from(version: Option<&str>) -> Self {
        version.map_or(Self::Absent, |v| Self::Declared(v.to_string()))
    }
}

impl fmt::Display for ObservedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared(v) => f.write_str(v),
            Self::Absent => f.write_str("(no version)"),
        }
    }
}

/// One distinct version of a package and every file that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub version: ObservedVersion,
    pub sources: Vec<PathBuf>,
}

/// A package declared with more than one distinct version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub name: String,
    /// Ordered by version precedence, absence last
    pub observations: Vec<Observation>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.name)?;
        for (i, observation) in self.observations.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let sources: Vec<_> = observation
                .sources
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            write!(f, "{} ({})", observation.version, sources.join(", "))?;
        }
        Ok(())
    }
}

/// Order two observed versions by semver precedence.
///
/// Versions that are not valid semver sort after those that are and
/// compare lexically among themselves. Absence sorts last.
#[must_use]
pub fn compare_versions(a: &ObservedVersion, b: &ObservedVersion) -> Ordering {
    match (a, b) {
        (ObservedVersion::Absent, ObservedVersion::Absent) => Ordering::Equal,
        (ObservedVersion::Absent, _) => Ordering::Greater,
        (_, ObservedVersion::Absent) => Ordering::Less,
        (ObservedVersion::Declared(a), ObservedVersion::Declared(b)) => {
            match (parse_semver(a), parse_semver(b)) {
                (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.cmp(b),
            }
        }
    }
}

/// NuGet allows two- and four-part versions; two-part ones are padded so
/// `1.0` orders next to `1.0.0`.
fn parse_semver(version: &str) -> Option<Version> {
    Version::parse(version).ok().or_else(|| {
        let core_len = version.find(['-', '+']).unwrap_or(version.len());
        let (core, rest) = version.split_at(core_len);
        match core.split('.').count() {
            1 => Version::parse(&format!("{core}.0.0{rest}")).ok(),
            2 => Version::parse(&format!("{core}.0{rest}")).ok(),
            _ => None,
        }
    })
}

/// Name to observations, keeping first-seen name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMap {
    order: Vec<String>,
    entries: HashMap<String, Vec<Observation>>,
}

impl VersionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` declares `name` at `version`.
    pub fn record(&mut self, name: &str, version: ObservedVersion, source: &Path) {
        if !self.entries.contains_key(name) {
            self.order.push(name.to_string());
        }
        let observations = self.entries.entry(name.to_string()).or_default();

        match observations.iter_mut().find(|o| o.version == version) {
            Some(observation) => {
                if !observation.sources.iter().any(|s| s == source) {
                    observation.sources.push(source.to_path_buf());
                }
            }
            None => observations.push(Observation {
                version,
                sources: vec![source.to_path_buf()],
            }),
        }
    }

    /// Add everything `other` observed. Names new to `self` keep `other`'s order.
    pub fn merge(&mut self, other: Self) {
        let Self { order, mut entries } = other;
        for name in order {
            let Some(observations) = entries.remove(&name) else {
                continue;
            };
            for observation in observations {
                for source in &observation.sources {
                    self.record(&name, observation.version.clone(), source);
                }
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[Observation]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Every name with its observations, in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Observation])> {
        self.order
            .iter()
            .map(|name| (name.as_str(), self.entries[name].as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// A package pinned to one version.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ResolvedVersion {
    pub name: String,
    pub version: String,
}

/// The outcome of a successful reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// One version per package, in first-seen order
    pub resolved: Vec<ResolvedVersion>,
    /// Packages only ever declared without a version
    pub unversioned: Vec<String>,
}

impl ReconciliationResult {
    /// Look up the resolved version of `name`
    #[must_use]
    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.resolved
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.version.as_str())
    }
}

/// Accumulates declarations and decides one version per package.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: MissingVersionPolicy,
    versions: VersionMap,
    /// Versions pinned by an existing central manifest
    pinned: HashMap<String, String>,
}

impl Reconciler {
    #[must_use]
    pub fn new(policy: MissingVersionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn versions(&self) -> &VersionMap {
        &self.versions
    }

    /// Seed with the entries of an existing central manifest.
    ///
    /// Seeded names come first in the result. A later declaration of a
    /// pinned name without a version is centrally managed and counts as
    /// observing the pinned version.
    pub fn seed(&mut self, entries: &[DependencyDeclaration]) {
        for entry in entries {
            let Some(version) = entry.version.as_deref() else {
                continue;
            };
            self.pinned
                .entry(entry.name.clone())
                .or_insert_with(|| version.to_string());
            self.versions
                .record(&entry.name, ObservedVersion::Declared(version.to_string()), &entry.source);
        }
    }

    /// Record every declaration in `declarations`.
    pub fn accumulate(&mut self, declarations: &[DependencyDeclaration]) {
        for declaration in declarations {
            self.versions.record(
                &declaration.name,
                declaration.version.as_deref().into(),
                &declaration.source,
            );
        }
    }

    /// Fold in a reconciler that accumulated another part of the solution.
    pub fn merge(&mut self, other: Self) {
        for (name, version) in other.pinned {
            self.pinned.entry(name).or_insert(version);
        }
        self.versions.merge(other.versions);
    }

    /// Decide one version per package.
    ///
    /// Every conflicting name is reported, not just the first.
    pub fn finalize(&self) -> Result<ReconciliationResult, ReconcileError> {
        let mut result = ReconciliationResult::default();
        let mut conflicts = Vec::new();
        let mut missing = Vec::new();

        for (name, observations) in self.versions.iter() {
            let observations = self.resolve_managed(name, observations);

            if self.policy == MissingVersionPolicy::Fail {
                if let Some(absent) = observations.iter().find(|o| o.version == ObservedVersion::Absent) {
                    missing.extend(absent.sources.iter().map(|s| (name.to_string(), s.clone())));
                }
            }

            let mut compared: Vec<Observation> = observations
                .iter()
                .filter(|o| {
                    self.policy == MissingVersionPolicy::Distinct
                        || o.version != ObservedVersion::Absent
                })
                .cloned()
                .collect();

            if compared.len() > 1 {
                compared.sort_by(|a, b| compare_versions(&a.version, &b.version));
                conflicts.push(Conflict {
                    name: name.to_string(),
                    observations: compared,
                });
                continue;
            }

            match observations.iter().find_map(|o| o.version.as_declared()) {
                Some(version) => result.resolved.push(ResolvedVersion {
                    name: name.to_string(),
                    version: version.to_string(),
                }),
                None => result.unversioned.push(name.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(MissingVersionError { declarations: missing }.into());
        }
        if !conflicts.is_empty() {
            return Err(ConflictError { conflicts }.into());
        }
        Ok(result)
    }

    /// Replace absence with the pinned version for centrally managed names.
    fn resolve_managed(&self, name: &str, observations: &[Observation]) -> Vec<Observation> {
        let Some(pinned) = self.pinned.get(name) else {
            return observations.to_vec();
        };

        let mut map = VersionMap::new();
        for observation in observations {
            let version = match &observation.version {
                ObservedVersion::Absent => ObservedVersion::Declared(pinned.clone()),
                declared => declared.clone(),
            };
            for source in &observation.sources {
                map.record(name, version.clone(), source);
            }
        }
        map.get(name).map(<[Observation]>::to_vec).unwrap_or_default()
    }
}
