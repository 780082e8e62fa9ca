//! End-to-end migrations of solutions laid out in temporary directories

use cpm_pkg::{
    DiscoveryOptions, FileKind, Migration, MigrationError, MigrationOptions, MigrationPlan,
    MissingVersionPolicy, ReconcileError, Solution, SourcesOutcome, MANIFEST_FILE,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const APP: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Exe</OutputType>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Foo" Version="1.0.0" />
    <PackageReference Include="Serilog">
      <Version>3.1.1</Version>
    </PackageReference>
  </ItemGroup>
</Project>
"#;

const LIB: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <ItemGroup>
    <PackageReference Include="Foo" Version="1.0.0" PrivateAssets="all" />
  </ItemGroup>
</Project>
"#;

const SINGLE_SOURCE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <packageSources>
    <add key="main" value="https://api.nuget.org/v3/index.json" />
  </packageSources>
</configuration>
"#;

const TWO_SOURCES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <packageSources>
    <add key="main" value="https://api.nuget.org/v3/index.json" />
    <add key="mirror" value="https://mirror.example.com/v3/index.json" />
  </packageSources>
</configuration>
"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn plan(root: &Path, options: MigrationOptions) -> Result<MigrationPlan, MigrationError> {
    let input = Solution::discover(root, &DiscoveryOptions::default())
        .unwrap()
        .load()
        .unwrap();
    Migration::new(options).plan(input)
}

fn apply(plan: &MigrationPlan) {
    for write in &plan.writes {
        fs::write(&write.path, &write.content).unwrap();
    }
}

fn solution() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "src/App/App.csproj", APP);
    write(tmp.path(), "src/Lib/Lib.csproj", LIB);
    tmp
}

#[test]
fn consistent_versions_migrate() {
    let tmp = solution();
    let plan = plan(tmp.path(), MigrationOptions::default()).unwrap();
    apply(&plan);

    let manifest = fs::read_to_string(tmp.path().join(MANIFEST_FILE)).unwrap();
    assert_eq!(
        manifest,
        r#"<Project>
  <PropertyGroup>
    <ManagePackageVersionsCentrally>true</ManagePackageVersionsCentrally>
  </PropertyGroup>
  <ItemGroup>
    <PackageVersion Include="Foo" Version="1.0.0" />
    <PackageVersion Include="Serilog" Version="3.1.1" />
  </ItemGroup>
</Project>
"#
    );

    let app = fs::read_to_string(tmp.path().join("src/App/App.csproj")).unwrap();
    assert_eq!(
        app,
        r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Exe</OutputType>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Foo" />
    <PackageReference Include="Serilog">
    </PackageReference>
  </ItemGroup>
</Project>
"#
    );

    let lib = fs::read_to_string(tmp.path().join("src/Lib/Lib.csproj")).unwrap();
    assert_eq!(lib, LIB.replace(r#" Version="1.0.0""#, ""));
}

#[test]
fn conflict_names_every_package_and_writes_nothing() {
    let tmp = solution();
    write(
        tmp.path(),
        "src/A/A.csproj",
        r#"<Project><ItemGroup><PackageReference Include="Bar" Version="2.0.0" /></ItemGroup></Project>"#,
    );
    write(
        tmp.path(),
        "src/B/B.csproj",
        r#"<Project><ItemGroup>
  <PackageReference Include="Bar" Version="2.1.0" />
  <PackageReference Include="Foo" Version="1.1.0" />
</ItemGroup></Project>"#,
    );

    let err = plan(tmp.path(), MigrationOptions::default()).unwrap_err();
    let MigrationError::Reconcile(ReconcileError::Conflict(conflict)) = err else {
        panic!("expected conflict, got {err}");
    };
    let mut names: Vec<_> = conflict.names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["Bar", "Foo"]);

    let message = conflict.to_string();
    assert!(message.contains("2.0.0"));
    assert!(message.contains("2.1.0"));

    assert!(!tmp.path().join(MANIFEST_FILE).exists());
    assert_eq!(fs::read_to_string(tmp.path().join("src/App/App.csproj")).unwrap(), APP);
}

#[test]
fn second_run_changes_nothing() {
    let tmp = solution();
    write(tmp.path(), "nuget.config", SINGLE_SOURCE);

    let first = plan(tmp.path(), MigrationOptions::default()).unwrap();
    apply(&first);
    let manifest = fs::read_to_string(tmp.path().join(MANIFEST_FILE)).unwrap();

    let second = plan(tmp.path(), MigrationOptions::default()).unwrap();
    assert!(second.is_noop(), "unexpected writes: {:?}", second.writes);
    assert!(!second.report.manifest_changed);
    assert_eq!(second.report.packages, first.report.packages);
    assert!(second.report.unversioned.is_empty());
    assert_eq!(
        second.report.sources,
        SourcesOutcome::Skipped {
            reason: "a packageSourceMapping is already present".to_string()
        }
    );
    assert_eq!(fs::read_to_string(tmp.path().join(MANIFEST_FILE)).unwrap(), manifest);
}

#[test]
fn existing_manifest_entries_stay_first() {
    let tmp = solution();
    write(
        tmp.path(),
        MANIFEST_FILE,
        r#"<Project>
  <ItemGroup>
    <PackageVersion Include="Zeta" Version="9.0.0" />
  </ItemGroup>
</Project>"#,
    );

    let plan = plan(tmp.path(), MigrationOptions::default()).unwrap();
    let names: Vec<_> = plan.report.packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Zeta", "Foo", "Serilog"]);

    apply(&plan);
    assert_eq!(
        fs::read_to_string(tmp.path().join(MANIFEST_FILE)).unwrap(),
        r#"<Project>
  <ItemGroup>
    <PackageVersion Include="Zeta" Version="9.0.0" />
    <PackageVersion Include="Foo" Version="1.0.0" />
    <PackageVersion Include="Serilog" Version="3.1.1" />
  </ItemGroup>
  <PropertyGroup>
    <ManagePackageVersionsCentrally>true</ManagePackageVersionsCentrally>
  </PropertyGroup>
</Project>"#
    );
}

#[test]
fn single_source_is_restricted() {
    let tmp = solution();
    write(tmp.path(), "nuget.config", SINGLE_SOURCE);

    let plan = plan(tmp.path(), MigrationOptions::default()).unwrap();
    assert_eq!(
        plan.report.sources,
        SourcesOutcome::Restricted {
            source: "main".to_string()
        }
    );
    apply(&plan);

    let config = fs::read_to_string(tmp.path().join("nuget.config")).unwrap();
    assert!(config.contains(
        "  <packageSourceMapping>\n    <packageSource key=\"main\">\n      <package pattern=\"*\" />\n    </packageSource>\n  </packageSourceMapping>\n</configuration>"
    ));
}

#[test]
fn two_sources_are_left_alone() {
    let tmp = solution();
    write(tmp.path(), "nuget.config", TWO_SOURCES);

    let plan = plan(tmp.path(), MigrationOptions::default()).unwrap();
    assert!(matches!(plan.report.sources, SourcesOutcome::Skipped { .. }));
    assert!(plan.writes.iter().all(|w| w.kind != FileKind::SourceConfig));
    assert_eq!(plan.report.warnings.len(), 1);
}

#[test]
fn build_overrides_are_migrated_too() {
    let tmp = solution();
    write(
        tmp.path(),
        "Directory.Build.props",
        r#"<Project>
  <ItemGroup>
    <PackageReference Include="StyleCop.Analyzers" Version="1.1.118" />
  </ItemGroup>
</Project>
"#,
    );

    let plan = plan(tmp.path(), MigrationOptions::default()).unwrap();
    assert!(plan
        .report
        .packages
        .iter()
        .any(|p| p.name == "StyleCop.Analyzers" && p.version == "1.1.118"));
    assert!(plan
        .writes
        .iter()
        .any(|w| w.path == tmp.path().join("Directory.Build.props")));
}

#[test]
fn missing_version_policies() {
    let tmp = solution();
    write(
        tmp.path(),
        "src/Extra/Extra.csproj",
        r#"<Project><ItemGroup><PackageReference Include="Foo" /></ItemGroup></Project>"#,
    );

    let distinct = plan(tmp.path(), MigrationOptions::default()).unwrap_err();
    assert!(matches!(
        distinct,
        MigrationError::Reconcile(ReconcileError::Conflict(_))
    ));

    let ignore = plan(
        tmp.path(),
        MigrationOptions {
            missing_version: MissingVersionPolicy::Ignore,
            ..MigrationOptions::default()
        },
    )
    .unwrap();
    assert!(ignore.report.packages.iter().any(|p| p.name == "Foo"));

    let fail = plan(
        tmp.path(),
        MigrationOptions {
            missing_version: MissingVersionPolicy::Fail,
            ..MigrationOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(
        fail,
        MigrationError::Reconcile(ReconcileError::MissingVersion(_))
    ));
}
