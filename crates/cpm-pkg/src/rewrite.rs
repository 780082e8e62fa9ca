//! Removing in-place versions from descriptors.

use crate::{DependencyDeclaration, Descriptor, VersionLocation};
use cpm_core::{EditError, EditSet};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while stripping versions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("declaration of '{name}' belongs to {}, not {}", .found.display(), .expected.display())]
    ForeignDeclaration {
        name: String,
        expected: PathBuf,
        found: PathBuf,
    },

    #[error("{} has no {location} for '{name}'", .path.display())]
    MissingVersionSite {
        path: PathBuf,
        name: String,
        location: VersionLocation,
    },

    #[error("failed to edit {}: {source}", .path.display())]
    Edit { path: PathBuf, source: EditError },
}

/// New content for one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub path: PathBuf,
    pub content: String,
    /// False when no declaration carried a version
    pub changed: bool,
}

/// Remove the recorded version of every declaration from `descriptor`.
///
/// Only the attribute or child element each declaration points at is
/// removed; every other byte of the file is kept as it was.
pub fn strip_versions(
    descriptor: &Descriptor,
    declarations: &[DependencyDeclaration],
) -> Result<Rewrite, RewriteError> {
    let document = descriptor.document();
    let mut edits = EditSet::new();

    for declaration in declarations {
        if declaration.source != descriptor.path() {
            return Err(RewriteError::ForeignDeclaration {
                name: declaration.name.clone(),
                expected: descriptor.path().to_path_buf(),
                found: declaration.source.clone(),
            });
        }

        let Some(location) = declaration.location else {
            continue;
        };
        let span = document
            .get(declaration.element)
            .and_then(|_| location.removal_span(document, declaration.element))
            .ok_or_else(|| RewriteError::MissingVersionSite {
                path: descriptor.path().to_path_buf(),
                name: declaration.name.clone(),
                location,
            })?;
        edits.remove(span);
    }

    let changed = !edits.is_empty();
    let content = edits
        .apply(document.source())
        .map_err(|source| RewriteError::Edit {
            path: descriptor.path().to_path_buf(),
            source,
        })?;

    Ok(Rewrite {
        path: descriptor.path().to_path_buf(),
        content,
        changed,
    })
}
