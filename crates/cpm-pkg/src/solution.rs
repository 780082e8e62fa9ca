//! Discovering the descriptors of a solution.
//!
//! A solution is either a `.sln` file, whose directory is the root, or a
//! directory. Descriptors are found with glob patterns below the root, plus
//! the projects a `.sln` lists explicitly.
//!
//! ```text
//! Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "App", "src\App\App.csproj", "{...}"
//! ```

use crate::manifest::MANIFEST_FILE;
use crate::migrate::{MigrationInput, SourceFile};
use crate::sources::SOURCE_CONFIG_FILE;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Descriptors matched when no other pattern is given.
pub const DEFAULT_PATTERN: &str = "**/*.csproj";

/// Build overrides that can declare package references for every project below them.
pub const BUILD_OVERRIDE_PATTERNS: [&str; 2] =
    ["**/Directory.Build.props", "**/Directory.Build.targets"];

/// Build output directories never hold source descriptors.
pub const DEFAULT_EXCLUDES: [&str; 2] = ["**/bin/**", "**/obj/**"];

/// Project file extensions recognised in `.sln` files.
pub const PROJECT_EXTENSIONS: [&str; 3] = ["csproj", "fsproj", "vbproj"];

/// Errors that can occur while discovering a solution.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("solution not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("failed to walk {}: {}", .0.path().display(), .0.error())]
    Walk(#[from] glob::GlobError),
}

/// Patterns that select descriptors below the solution root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Unioned with [`DEFAULT_PATTERN`] and [`BUILD_OVERRIDE_PATTERNS`]
    pub patterns: Vec<String>,
    /// Unioned with [`DEFAULT_EXCLUDES`], matched against root-relative paths
    pub excludes: Vec<String>,
}

impl DiscoveryOptions {
    #[must_use]
    pub fn new(patterns: Vec<String>, excludes: Vec<String>) -> Self {
        Self { patterns, excludes }
    }

    fn all_patterns(&self) -> Vec<&str> {
        let mut patterns = vec![DEFAULT_PATTERN];
        patterns.extend(self.patterns.iter().map(String::as_str));
        patterns.extend(BUILD_OVERRIDE_PATTERNS);
        patterns
    }

    fn all_excludes(&self) -> Result<Vec<glob::Pattern>, DiscoveryError> {
        DEFAULT_EXCLUDES
            .into_iter()
            .chain(self.excludes.iter().map(String::as_str))
            .map(compile)
            .collect()
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

fn compile(pattern: &str) -> Result<glob::Pattern, DiscoveryError> {
    glob::Pattern::new(pattern).map_err(|source| DiscoveryError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// A discovered solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub root: PathBuf,
    /// The `.sln` file, when discovery started from one
    pub solution_file: Option<PathBuf>,
    /// Every descriptor, in discovery order
    pub descriptors: Vec<PathBuf>,
    /// Where the central manifest lives, whether or not it exists yet
    pub manifest_path: PathBuf,
    /// The source configuration at the root, if any
    pub source_config: Option<PathBuf>,
}

impl Solution {
    /// Discover the solution at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not exist, a pattern is invalid, or a
    /// directory cannot be read.
    pub fn discover(path: impl AsRef<Path>, options: &DiscoveryOptions) -> Result<Self, DiscoveryError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DiscoveryError::NotFound(path.to_path_buf()));
        }

        let (root, solution_file) = if path.is_file() {
            let root = normalize(path.parent().unwrap_or_else(|| Path::new(".")));
            (root, Some(path.to_path_buf()))
        } else {
            (normalize(path), None)
        };

        let manifest_path = normalize(&root.join(MANIFEST_FILE));
        let excludes = options.all_excludes()?;
        let mut seen = HashSet::new();
        let mut descriptors = Vec::new();

        let mut accept = |candidate: PathBuf, descriptors: &mut Vec<PathBuf>| {
            let candidate = normalize(&candidate);
            if candidate == manifest_path || is_excluded(&candidate, &root, &excludes) {
                return;
            }
            if seen.insert(candidate.clone()) {
                descriptors.push(candidate);
            }
        };

        if let Some(sln) = &solution_file {
            let content = read(sln)?;
            for relative in parse_solution_projects(&content) {
                let candidate = root.join(relative);
                if candidate.is_file() {
                    accept(candidate, &mut descriptors);
                } else {
                    tracing::warn!(path = %candidate.display(), "project listed in solution does not exist");
                }
            }
        }

        let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
        for pattern in options.all_patterns() {
            let full = format!("{}/{}", escaped_root.trim_end_matches('/'), pattern);
            let entries = glob::glob(&full).map_err(|source| DiscoveryError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
            for entry in entries {
                let candidate = entry?;
                if candidate.is_file() {
                    accept(candidate, &mut descriptors);
                }
            }
        }

        let source_config = find_source_config(&root)?;
        tracing::info!(
            root = %root.display(),
            descriptors = descriptors.len(),
            "discovered solution"
        );

        Ok(Self {
            root,
            solution_file,
            descriptors,
            manifest_path,
            source_config,
        })
    }

    /// Read every file the migration needs.
    ///
    /// # Errors
    ///
    /// Returns an error if a descriptor, the manifest or the source
    /// configuration exists but cannot be read.
    pub fn load(&self) -> Result<MigrationInput, DiscoveryError> {
        let descriptors = self
            .descriptors
            .iter()
            .map(|path| Ok(SourceFile::new(path.clone(), read(path)?)))
            .collect::<Result<Vec<_>, DiscoveryError>>()?;

        let manifest = if self.manifest_path.is_file() {
            Some(read(&self.manifest_path)?)
        } else {
            None
        };

        let source_config = match &self.source_config {
            Some(path) => Some(SourceFile::new(path.clone(), read(path)?)),
            None => None,
        };

        Ok(MigrationInput {
            descriptors,
            manifest_path: self.manifest_path.clone(),
            manifest,
            source_config,
        })
    }
}

fn read(path: &Path) -> Result<String, DiscoveryError> {
    std::fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Drop `.` components, so `./src/App.csproj` and `src/App.csproj` compare equal
fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

fn is_excluded(path: &Path, root: &Path, excludes: &[glob::Pattern]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = relative.to_string_lossy().replace('\\', "/");
    excludes.iter().any(|pattern| pattern.matches(&relative))
}

/// Find `nuget.config` at `root`, whatever its casing.
fn find_source_config(root: &Path) -> Result<Option<PathBuf>, DiscoveryError> {
    let entries = std::fs::read_dir(root).map_err(|source| DiscoveryError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut matches: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.eq_ignore_ascii_case(SOURCE_CONFIG_FILE))
        })
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

fn project_line() -> &'static Regex {
    static PROJECT_LINE: OnceLock<Regex> = OnceLock::new();
    PROJECT_LINE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*Project\("\{[0-9A-Fa-f-]+\}"\)\s*=\s*"[^"]*"\s*,\s*"([^"]+)""#)
            .expect("project line pattern is valid")
    })
}

/// Project paths listed in a `.sln` file, relative to its directory.
///
/// Solution folders and other non-project entries are skipped. Windows
/// separators are normalised to `/`.
#[must_use]
pub fn parse_solution_projects(content: &str) -> Vec<PathBuf> {
    project_line()
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str().replace('\\', "/"))
        .filter(|path| {
            Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| PROJECT_EXTENSIONS.iter().any(|p| p.eq_ignore_ascii_case(ext)))
        })
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SLN: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio Version 17
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Api", "src\Api\Api.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "Solution Items", "Solution Items", "{22222222-2222-2222-2222-222222222222}"
EndProject
Project("{F2A71F9B-5D33-465A-A702-920D77279786}") = "Core", "src\Core\Core.fsproj", "{33333333-3333-3333-3333-333333333333}"
EndProject
Global
EndGlobal
"#;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<Project />").unwrap();
    }

    fn relative(solution: &Solution) -> Vec<String> {
        solution
            .descriptors
            .iter()
            .map(|p| {
                p.strip_prefix(&solution.root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn parse_sln_project_lines() {
        let projects = parse_solution_projects(SLN);
        assert_eq!(
            projects,
            vec![
                PathBuf::from("src/Api/Api.csproj"),
                PathBuf::from("src/Core/Core.fsproj"),
            ]
        );
    }

    #[test]
    fn discover_directory_with_defaults() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/App/App.csproj");
        touch(tmp.path(), "src/Lib/Lib.csproj");
        touch(tmp.path(), "src/App/bin/Debug/Copy.csproj");
        touch(tmp.path(), "src/App/obj/App.csproj");
        touch(tmp.path(), "Directory.Build.props");
        touch(tmp.path(), "src/Directory.Build.targets");
        touch(tmp.path(), "src/Core/Core.fsproj");

        let solution = Solution::discover(tmp.path(), &DiscoveryOptions::default()).unwrap();
        assert_eq!(
            relative(&solution),
            vec![
                "src/App/App.csproj",
                "src/Lib/Lib.csproj",
                "Directory.Build.props",
                "src/Directory.Build.targets",
            ]
        );
        assert_eq!(solution.manifest_path, tmp.path().join(MANIFEST_FILE));
        assert_eq!(solution.solution_file, None);
        assert_eq!(solution.source_config, None);
    }

    #[test]
    fn extra_patterns_and_excludes() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/App/App.csproj");
        touch(tmp.path(), "src/Core/Core.fsproj");
        touch(tmp.path(), "legacy/Old/Old.csproj");

        let options = DiscoveryOptions::new(
            vec!["**/*.fsproj".to_string(), "src/**/*.csproj".to_string()],
            vec!["legacy/**".to_string()],
        );
        let solution = Solution::discover(tmp.path(), &options).unwrap();
        assert_eq!(
            relative(&solution),
            vec!["src/App/App.csproj", "src/Core/Core.fsproj"]
        );
    }

    #[test]
    fn discover_from_sln_file() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/Api/Api.csproj");
        touch(tmp.path(), "src/Core/Core.fsproj");
        touch(tmp.path(), "tools/Tool.csproj");
        fs::write(tmp.path().join("App.sln"), SLN).unwrap();

        let solution =
            Solution::discover(tmp.path().join("App.sln"), &DiscoveryOptions::default()).unwrap();
        assert_eq!(solution.root, tmp.path());
        assert_eq!(
            relative(&solution),
            vec!["src/Api/Api.csproj", "src/Core/Core.fsproj", "tools/Tool.csproj"]
        );
    }

    #[test]
    fn dot_components_are_dropped() {
        assert_eq!(normalize(Path::new("./src/App/App.csproj")), PathBuf::from("src/App/App.csproj"));
        assert_eq!(normalize(Path::new(".")), PathBuf::from("."));
        assert_eq!(normalize(Path::new("")), PathBuf::from("."));
        assert_eq!(normalize(Path::new("../up/./A.csproj")), PathBuf::from("../up/A.csproj"));
    }

    #[test]
    fn sln_projects_that_do_not_exist_are_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("App.sln"), SLN).unwrap();
        let solution =
            Solution::discover(tmp.path().join("App.sln"), &DiscoveryOptions::default()).unwrap();
        assert!(solution.descriptors.is_empty());
    }

    #[test]
    fn manifest_is_never_a_descriptor() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), MANIFEST_FILE);
        let options = DiscoveryOptions::new(vec!["*.props".to_string()], Vec::new());
        let solution = Solution::discover(tmp.path(), &options).unwrap();
        assert!(solution.descriptors.is_empty());
    }

    #[test]
    fn source_config_is_found_case_insensitively() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("NuGet.Config"), "<configuration />").unwrap();
        let solution = Solution::discover(tmp.path(), &DiscoveryOptions::default()).unwrap();
        assert_eq!(solution.source_config, Some(tmp.path().join("NuGet.Config")));
    }

    #[test]
    fn load_reads_every_file() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "App/App.csproj");
        fs::write(tmp.path().join(MANIFEST_FILE), "<Project />").unwrap();

        let input = Solution::discover(tmp.path(), &DiscoveryOptions::default())
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(input.descriptors.len(), 1);
        assert_eq!(input.descriptors[0].content, "<Project />");
        assert_eq!(input.manifest.as_deref(), Some("<Project />"));
        assert!(input.source_config.is_none());
    }

    #[test]
    fn missing_solution_and_bad_patterns() {
        let tmp = TempDir::new().unwrap();
        let err = Solution::discover(tmp.path().join("nope"), &DiscoveryOptions::default()).unwrap_err();
        assert!(matches!(err, DiscoveryError::NotFound(_)));

        let options = DiscoveryOptions::new(Vec::new(), vec!["[".to_string()]);
        let err = Solution::discover(tmp.path(), &options).unwrap_err();
        assert!(matches!(err, DiscoveryError::Pattern { .. }));
    }
}
