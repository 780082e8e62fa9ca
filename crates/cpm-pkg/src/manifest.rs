//! The central package manifest, `Directory.Packages.props`.
//!
//! ```xml
//! <Project>
//!   <PropertyGroup>
//!     <ManagePackageVersionsCentrally>true</ManagePackageVersionsCentrally>
//!   </PropertyGroup>
//!   <ItemGroup>
//!     <PackageVersion Include="Serilog" Version="3.1.1" />
//!   </ItemGroup>
//! </Project>
//! ```

use crate::descriptor::{parse_items, ITEM_GROUP};
use crate::{DependencyDeclaration, DescriptorError, ResolvedVersion, RewriteError};
use cpm_core::{escape, Document, EditSet, Span};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

/// File name of the central manifest at the solution root.
pub const MANIFEST_FILE: &str = "Directory.Packages.props";

/// Property that switches on central package management.
pub const MANAGE_CENTRALLY_PROPERTY: &str = "ManagePackageVersionsCentrally";

/// Item that pins a package version in the manifest.
pub const PACKAGE_VERSION: &str = "PackageVersion";

const INDENT: &str = "  ";

/// Render the manifest for `resolved`, keeping its order.
///
/// The output is deterministic: the same input always yields the same bytes.
#[must_use]
pub fn generate_manifest(resolved: &[ResolvedVersion]) -> String {
    let mut out = String::new();
    out.push_str("<Project>\n");
    let _ = writeln!(out, "{INDENT}<PropertyGroup>");
    let _ = writeln!(
        out,
        "{INDENT}{INDENT}<{MANAGE_CENTRALLY_PROPERTY}>true</{MANAGE_CENTRALLY_PROPERTY}>"
    );
    let _ = writeln!(out, "{INDENT}</PropertyGroup>");
    let _ = writeln!(out, "{INDENT}<ItemGroup>");
    for package in resolved {
        let _ = writeln!(
            out,
            "{INDENT}{INDENT}<{PACKAGE_VERSION} Include=\"{}\" Version=\"{}\" />",
            escape(&package.name),
            escape(&package.version)
        );
    }
    let _ = writeln!(out, "{INDENT}</ItemGroup>");
    out.push_str("</Project>\n");
    out
}

/// Read the pinned versions of an existing manifest.
///
/// Versions are looked up with the same locations as descriptors, so
/// hand-written `<PackageVersion><Version>..</Version></PackageVersion>`
/// entries are understood as well.
pub fn read_manifest(
    path: impl AsRef<Path>,
    content: impl Into<String>,
) -> Result<Vec<DependencyDeclaration>, DescriptorError> {
    let path = path.as_ref();
    let document = Document::parse(content).map_err(|source| DescriptorError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(pinned_versions(&document, path))
}

/// The `PackageVersion` items of a parsed manifest.
#[must_use]
pub fn pinned_versions(document: &Document, path: &Path) -> Vec<DependencyDeclaration> {
    parse_items(document, path, PACKAGE_VERSION)
}

/// Add what an existing manifest lacks, keeping everything else as written.
///
/// Packages already pinned are left alone. New pins go into the last
/// `ItemGroup` that already holds `PackageVersion` items, or into a new
/// `ItemGroup` before `</Project>`, which is also where the
/// central-management switch goes when no element sets it. A manifest
/// that needs nothing comes back unchanged.
///
/// # Errors
///
/// Returns an error if the insertions cannot be applied to the source.
pub fn update_manifest(
    document: &Document,
    path: &Path,
    resolved: &[ResolvedVersion],
) -> Result<String, RewriteError> {
    let source = document.source();
    let pinned: HashSet<String> = pinned_versions(document, path)
        .into_iter()
        .map(|declaration| declaration.name)
        .collect();
    let missing: Vec<&ResolvedVersion> = resolved
        .iter()
        .filter(|package| !pinned.contains(&package.name))
        .collect();
    let switched = document
        .elements_named(MANAGE_CENTRALLY_PROPERTY)
        .next()
        .is_some();
    if missing.is_empty() && switched {
        return Ok(source.to_string());
    }

    let root = document.root();
    let Some(root_end) = document.element(root).end_tag else {
        // `<Project />` has nothing to keep
        return Ok(generate_manifest(resolved));
    };

    let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };
    let indent = document
        .children(root)
        .next()
        .and_then(|id| document.indentation(id))
        .filter(|indent| !indent.is_empty())
        .unwrap_or(INDENT);

    let mut edits = EditSet::new();
    let mut tail = String::new();
    if !switched {
        let _ = write!(
            tail,
            "{indent}<PropertyGroup>{newline}\
             {indent}{indent}<{MANAGE_CENTRALLY_PROPERTY}>true</{MANAGE_CENTRALLY_PROPERTY}>{newline}\
             {indent}</PropertyGroup>{newline}"
        );
    }

    if !missing.is_empty() {
        let group = document
            .children_named(root, ITEM_GROUP)
            .filter(|id| document.element(*id).end_tag.is_some())
            .filter(|id| document.children_named(*id, PACKAGE_VERSION).next().is_some())
            .last();
        match group.and_then(|id| document.element(id).end_tag.map(|end| (id, end))) {
            Some((group, group_end)) => {
                let item_indent = document
                    .children_named(group, PACKAGE_VERSION)
                    .last()
                    .and_then(|id| document.indentation(id))
                    .filter(|indent| !indent.is_empty())
                    .map_or_else(|| indent.repeat(2), str::to_string);
                let lines = package_lines(&missing, &item_indent, newline);
                insert_before(&mut edits, source, group_end, lines, newline);
            }
            None => {
                let _ = write!(tail, "{indent}<{ITEM_GROUP}>{newline}");
                tail.push_str(&package_lines(&missing, &indent.repeat(2), newline));
                let _ = write!(tail, "{indent}</{ITEM_GROUP}>{newline}");
            }
        }
    }

    if !tail.is_empty() {
        insert_before(&mut edits, source, root_end, tail, newline);
    }
    edits.apply(source).map_err(|source| RewriteError::Edit {
        path: path.to_path_buf(),
        source,
    })
}

fn package_lines(packages: &[&ResolvedVersion], indent: &str, newline: &str) -> String {
    packages
        .iter()
        .map(|package| {
            format!(
                "{indent}<{PACKAGE_VERSION} Include=\"{}\" Version=\"{}\" />{newline}",
                escape(&package.name),
                escape(&package.version)
            )
        })
        .collect()
}

/// Insert `block` on its own line(s) just before the end tag `tag`
#[allow(clippy::cast_possible_truncation)]
fn insert_before(edits: &mut EditSet, source: &str, tag: Span, block: String, newline: &str) {
    let close = tag.start as usize;
    let line_start = source[..close].rfind('\n').map_or(0, |i| i + 1);
    if source[line_start..close].trim().is_empty() {
        edits.insert(line_start as u32, block);
    } else {
        edits.insert(tag.start, format!("{newline}{block}"));
    }
}
