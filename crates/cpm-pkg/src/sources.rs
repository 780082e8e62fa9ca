//! Restricting package resolution to a single feed in `nuget.config`.
//!
//! When a solution pulls from exactly one package source, every package is
//! mapped to it with a wildcard `packageSourceMapping`. Anything else is left
//! alone and reported as a skip.

use cpm_core::{escape, Document, EditSet, ElementId};
use std::fmt;

/// File name of the source configuration, matched case-insensitively.
pub const SOURCE_CONFIG_FILE: &str = "nuget.config";

const CONFIGURATION: &str = "configuration";
const PACKAGE_SOURCES: &str = "packageSources";
const PACKAGE_SOURCE_MAPPING: &str = "packageSourceMapping";
const ADD: &str = "add";
const KEY: &str = "key";
const VALUE: &str = "value";

/// One `<add>` entry under `<packageSources>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    pub key: Option<String>,
    pub url: Option<String>,
}

/// A parsed source configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    document: Document,
}

impl SourceConfig {
    pub fn parse(content: impl Into<String>) -> Result<Self, cpm_core::ParseError> {
        Document::parse(content).map(|document| Self { document })
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    fn package_sources(&self) -> Option<ElementId> {
        let root = self.document.root();
        self.document.children_named(root, PACKAGE_SOURCES).next()
    }

    /// Every configured source in declaration order
    #[must_use]
    pub fn sources(&self) -> Vec<PackageSource> {
        let Some(sources) = self.package_sources() else {
            return Vec::new();
        };
        self.document
            .children_named(sources, ADD)
            .map(|id| {
                let element = self.document.element(id);
                PackageSource {
                    key: element.attribute(KEY).map(|a| a.value.clone()),
                    url: element.attribute(VALUE).map(|a| a.value.clone()),
                }
            })
            .collect()
    }

    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.document.elements_named(PACKAGE_SOURCE_MAPPING).next().is_some()
    }
}

/// Why source restriction was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No source configuration at the solution root
    NotFound,
    /// The configuration could not be parsed
    Unreadable(String),
    NoSources,
    MultipleSources(usize),
    /// The single source has no `key` attribute
    MissingKey,
    AlreadyMapped,
    /// The document element is not `<configuration>` or has no end tag
    NoConfiguration,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no {SOURCE_CONFIG_FILE} found"),
            Self::Unreadable(reason) => write!(f, "{SOURCE_CONFIG_FILE} could not be parsed: {reason}"),
            Self::NoSources => f.write_str("no package sources are configured"),
            Self::MultipleSources(n) => write!(f, "{n} package sources are configured, expected exactly one"),
            Self::MissingKey => f.write_str("the package source has no key"),
            Self::AlreadyMapped => f.write_str("a packageSourceMapping is already present"),
            Self::NoConfiguration => f.write_str("no <configuration> element to add a mapping to"),
        }
    }
}

/// Outcome of [`restrict_sources`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRestriction {
    /// All packages now map to `source`; `content` is the new file text
    Restricted { source: String, content: String },
    Skipped(SkipReason),
}

/// Map every package to the single configured source.
///
/// Never fails: configurations that cannot be restricted safely are
/// returned as [`SourceRestriction::Skipped`].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn restrict_sources(config: &SourceConfig) -> SourceRestriction {
    use SourceRestriction::Skipped;

    if config.is_mapped() {
        return Skipped(SkipReason::AlreadyMapped);
    }

    let sources = config.sources();
    let key = match sources.as_slice() {
        [] => return Skipped(SkipReason::NoSources),
        [single] => match &single.key {
            Some(key) if !key.trim().is_empty() => key.clone(),
            _ => return Skipped(SkipReason::MissingKey),
        },
        many => return Skipped(SkipReason::MultipleSources(many.len())),
    };

    let document = config.document();
    let root = document.element(document.root());
    let Some(end_tag) = root.end_tag.filter(|_| root.name.local() == CONFIGURATION) else {
        return Skipped(SkipReason::NoConfiguration);
    };

    let source = document.source();
    let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };
    let indent = config
        .package_sources()
        .and_then(|id| document.indentation(id))
        .filter(|indent| !indent.is_empty())
        .unwrap_or("  ");

    let block = mapping_block(&key, indent, newline);
    let close = end_tag.start as usize;
    let line_start = source[..close].rfind('\n').map_or(0, |i| i + 1);

    let mut edits = EditSet::new();
    if source[line_start..close].trim().is_empty() {
        edits.insert(line_start as u32, block);
    } else {
        edits.insert(end_tag.start, format!("{newline}{block}"));
    }

    match edits.apply(source) {
        Ok(content) => SourceRestriction::Restricted { source: key, content },
        Err(_) => Skipped(SkipReason::NoConfiguration),
    }
}

/// The mapping element, one line per element, each line terminated
fn mapping_block(key: &str, indent: &str, newline: &str) -> String {
    let lines = [
        (1, format!("<{PACKAGE_SOURCE_MAPPING}>")),
        (2, format!("<packageSource {KEY}=\"{}\">", escape(key))),
        (3, "<package pattern=\"*\" />".to_string()),
        (2, "</packageSource>".to_string()),
        (1, format!("</{PACKAGE_SOURCE_MAPPING}>")),
    ];
    lines
        .iter()
        .map(|(depth, line)| format!("{}{line}{newline}", indent.repeat(*depth)))
        .collect()
}
