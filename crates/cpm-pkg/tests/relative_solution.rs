//! Discovery from a solution file named relative to the working directory.
//!
//! Kept in its own test binary because it changes the process's current
//! directory.

use cpm_pkg::{DiscoveryOptions, FileKind, Migration, Solution, MANIFEST_FILE};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const SLN: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Api", "src\Api\Api.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
"#;

const API: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <ItemGroup>
    <PackageReference Include="Foo" Version="1.0.0" />
  </ItemGroup>
</Project>
"#;

#[test]
fn listed_projects_are_not_discovered_twice() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("src/Api")).unwrap();
    fs::write(tmp.path().join("src/Api/Api.csproj"), API).unwrap();
    fs::write(tmp.path().join("App.sln"), SLN).unwrap();

    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(tmp.path()).unwrap();

    let solution = Solution::discover("App.sln", &DiscoveryOptions::default()).unwrap();
    let plan = Migration::default().plan(solution.load().unwrap()).unwrap();

    std::env::set_current_dir(previous).unwrap();

    assert_eq!(solution.descriptors, vec![PathBuf::from("src/Api/Api.csproj")]);
    assert_eq!(solution.manifest_path, PathBuf::from(MANIFEST_FILE));
    assert_eq!(plan.report.descriptors, 1);
    assert_eq!(plan.report.declarations, 1);

    let written: Vec<_> = plan.writes.iter().map(|w| (w.path.clone(), w.kind)).collect();
    assert_eq!(
        written,
        vec![
            (PathBuf::from("src/Api/Api.csproj"), FileKind::Descriptor),
            (PathBuf::from(MANIFEST_FILE), FileKind::Manifest),
        ]
    );
}
