//! Build descriptors and the package declarations they contain.
//!
//! A descriptor is any MSBuild file that may carry `PackageReference`
//! items: project files and `Directory.Build.props` / `.targets` overrides.
//!
//! ```xml
//! <Project Sdk="Microsoft.NET.Sdk">
//!   <ItemGroup>
//!     <PackageReference Include="Serilog" Version="3.1.1" />
//!     <PackageReference Include="Polly">
//!       <Version>8.2.0</Version>
//!     </PackageReference>
//!   </ItemGroup>
//! </Project>
//! ```

use cpm_core::{Document, ElementId, ParseError, Span};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Grouping element that holds items.
pub const ITEM_GROUP: &str = "ItemGroup";

/// Item that declares a package dependency.
pub const PACKAGE_REFERENCE: &str = "PackageReference";

/// Attribute naming the package an item refers to.
pub const INCLUDE_ATTRIBUTE: &str = "Include";

/// A descriptor could not be parsed.
#[derive(Error, Debug)]
#[error("failed to parse {}: {source}", .path.display())]
pub struct DescriptorError {
    pub path: PathBuf,
    pub source: ParseError,
}

/// How a version is written on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionForm {
    /// `<PackageReference Include="X" Version="1.0" />`
    Attribute,
    /// `<PackageReference Include="X"><Version>1.0</Version></PackageReference>`
    Element,
}

/// One place a version can be written, with how to read and remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionLocation {
    form: VersionForm,
    name: &'static str,
}

impl VersionLocation {
    /// `Version="..."`
    pub const ATTRIBUTE: Self = Self::new(VersionForm::Attribute, "Version");
    /// `version="..."`
    pub const ATTRIBUTE_LOWER: Self = Self::new(VersionForm::Attribute, "version");
    /// `<Version>...</Version>`
    pub const ELEMENT: Self = Self::new(VersionForm::Element, "Version");
    /// `<version>...</version>`
    pub const ELEMENT_LOWER: Self = Self::new(VersionForm::Element, "version");

    const fn new(form: VersionForm, name: &'static str) -> Self {
        Self { form, name }
    }

    #[must_use]
    pub const fn form(&self) -> VersionForm {
        self.form
    }

    /// Attribute or child element name, matched case-sensitively
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Read the raw version text this location holds on `item`.
    ///
    /// Returns `None` if the attribute or child element is not present.
    /// An empty value is returned as an empty string.
    #[must_use]
    pub fn detect(&self, document: &Document, item: ElementId) -> Option<String> {
        match self.form {
            VersionForm::Attribute => document
                .element(item)
                .attribute(self.name)
                .map(|a| a.value.clone()),
            VersionForm::Element => document
                .children_named(item, self.name)
                .next()
                .map(|child| document.text(child)),
        }
    }

    /// Bytes to delete to remove this location from `item`
    #[must_use]
    pub fn removal_span(&self, document: &Document, item: ElementId) -> Option<Span> {
        match self.form {
            VersionForm::Attribute => document
                .element(item)
                .attribute(self.name)
                .map(|a| a.removal),
            VersionForm::Element => document
                .children_named(item, self.name)
                .next()
                .map(|child| document.removal_span(child)),
        }
    }
}

impl std::fmt::Display for VersionLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.form {
            VersionForm::Attribute => write!(f, "{} attribute", self.name),
            VersionForm::Element => write!(f, "<{}> element", self.name),
        }
    }
}

/// Version locations in lookup priority order.
///
/// Supporting a new way of writing versions means adding an entry here.
pub const VERSION_LOCATIONS: [VersionLocation; 4] = [
    VersionLocation::ATTRIBUTE,
    VersionLocation::ATTRIBUTE_LOWER,
    VersionLocation::ELEMENT,
    VersionLocation::ELEMENT_LOWER,
];

/// Find the first location in [`VERSION_LOCATIONS`] that is present on `item`.
#[must_use]
pub fn locate_version(document: &Document, item: ElementId) -> Option<(VersionLocation, String)> {
    VERSION_LOCATIONS
        .iter()
        .find_map(|location| location.detect(document, item).map(|v| (*location, v)))
}

/// A package declared by one item in one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDeclaration {
    /// Package id from the `Include` attribute
    pub name: String,
    /// Declared version, `None` if absent or blank
    pub version: Option<String>,
    /// Where the version was written; may be set with a blank version
    pub location: Option<VersionLocation>,
    /// Path of the descriptor that holds the item
    pub source: PathBuf,
    /// The item element
    pub element: ElementId,
}

/// A parsed descriptor file.
#[derive(Debug, Clone)]
pub struct Descriptor {
    path: PathBuf,
    document: Document,
}

impl Descriptor {
    /// Parse descriptor text read from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not well-formed XML.
    pub fn parse(path: impl Into<PathBuf>, content: impl Into<String>) -> Result<Self, DescriptorError> {
        let path = path.into();
        match Document::parse(content) {
            Ok(document) => Ok(Self { path, document }),
            Err(source) => Err(DescriptorError { path, source }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Every `PackageReference` declaration in this descriptor
    #[must_use]
    pub fn declarations(&self) -> Vec<DependencyDeclaration> {
        parse_declarations(self)
    }
}

/// Extract every `PackageReference` declaration from a descriptor.
///
/// Items are found under any `ItemGroup`, at any depth, matching local names
/// so namespaced legacy projects work too. Items without an `Include`
/// attribute (for example `Update` or `Remove` items) are skipped.
#[must_use]
pub fn parse_declarations(descriptor: &Descriptor) -> Vec<DependencyDeclaration> {
    parse_items(&descriptor.document, &descriptor.path, PACKAGE_REFERENCE)
}

/// Extract every declaration of item type `item` from `document`.
pub(crate) fn parse_items(document: &Document, path: &Path, item: &str) -> Vec<DependencyDeclaration> {
    let mut declarations = Vec::new();
    for group in document.elements_named(ITEM_GROUP) {
        for element in document.children_named(group, item) {
            let Some(include) = document.element(element).attribute(INCLUDE_ATTRIBUTE) else {
                continue;
            };

            let (location, version) = match locate_version(document, element) {
                Some((location, raw)) => {
                    let trimmed = raw.trim();
                    (Some(location), (!trimmed.is_empty()).then(|| trimmed.to_string()))
                }
                None => (None, None),
            };

            declarations.push(DependencyDeclaration {
                name: include.value.trim().to_string(),
                version,
                location,
                source: path.to_path_buf(),
                element,
            });
        }
    }
    declarations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declarations(source: &str) -> Vec<DependencyDeclaration> {
        Descriptor::parse("App.csproj", source).unwrap().declarations()
    }

    #[test]
    fn parse_all_four_version_locations() {
        let decls = declarations(
            r#"<Project>
  <ItemGroup>
    <PackageReference Include="A" Version="1.0.0" />
    <PackageReference Include="B" version="2.0.0" />
    <PackageReference Include="C"><Version>3.0.0</Version></PackageReference>
    <PackageReference Include="D"><version> 4.0.0 </version></PackageReference>
  </ItemGroup>
</Project>"#,
        );
        let found: Vec<_> = decls
            .iter()
            .map(|d| (d.name.as_str(), d.version.as_deref(), d.location))
            .collect();
        assert_eq!(
            found,
            vec![
                ("A", Some("1.0.0"), Some(VersionLocation::ATTRIBUTE)),
                ("B", Some("2.0.0"), Some(VersionLocation::ATTRIBUTE_LOWER)),
                ("C", Some("3.0.0"), Some(VersionLocation::ELEMENT)),
                ("D", Some("4.0.0"), Some(VersionLocation::ELEMENT_LOWER)),
            ]
        );
    }

    #[test]
    fn attribute_wins_over_child_element() {
        let decls = declarations(
            r#"<Project><ItemGroup>
  <PackageReference Include="A" Version="1.0.0"><Version>9.9.9</Version></PackageReference>
</ItemGroup></Project>"#,
        );
        assert_eq!(decls[0].version.as_deref(), Some("1.0.0"));
        assert_eq!(decls[0].location, Some(VersionLocation::ATTRIBUTE));
    }

    #[test]
    fn missing_and_blank_versions() {
        let decls = declarations(
            r#"<Project><ItemGroup>
  <PackageReference Include="NoVersion" />
  <PackageReference Include="Blank" Version="" />
</ItemGroup></Project>"#,
        );
        assert_eq!(decls[0].version, None);
        assert_eq!(decls[0].location, None);
        assert_eq!(decls[1].version, None);
        assert_eq!(decls[1].location, Some(VersionLocation::ATTRIBUTE));
    }

    #[test]
    fn items_without_include_are_ignored() {
        let decls = declarations(
            r#"<Project><ItemGroup>
  <PackageReference Update="Foo" Version="1.0.0" />
  <PackageReference include="lowercase" Version="1.0.0" />
  <PackageReference Include="Kept" Version="1.0.0" />
</ItemGroup></Project>"#,
        );
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "Kept");
    }

    #[test]
    fn nested_and_namespaced_groups() {
        let decls = declarations(
            r#"<msb:Project xmlns:msb="http://schemas.microsoft.com/developer/msbuild/2003">
  <msb:Choose>
    <msb:When Condition="'$(TargetFramework)' == 'net8.0'">
      <msb:ItemGroup>
        <msb:PackageReference Include="Deep" Version="1.0.0" />
      </msb:ItemGroup>
    </msb:When>
  </msb:Choose>
  <ItemGroup>
    <Reference Include="System.Xml" />
    <PackageReference Include="Flat" Version="2.0.0" />
  </ItemGroup>
</msb:Project>"#,
        );
        let names: Vec<_> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Deep", "Flat"]);
    }

    #[test]
    fn references_outside_item_groups_are_ignored() {
        let decls = declarations(
            r#"<Project><PackageReference Include="Stray" Version="1.0.0" /></Project>"#,
        );
        assert!(decls.is_empty());
    }

    #[test]
    fn declarations_remember_their_descriptor() {
        let decls = declarations(
            r#"<Project><ItemGroup><PackageReference Include="A" Version="1" /></ItemGroup></Project>"#,
        );
        assert_eq!(decls[0].source, PathBuf::from("App.csproj"));
    }

    #[test]
    fn removal_span_matches_detected_form() {
        let source = r#"<Project><ItemGroup>
    <PackageReference Include="C">
      <Version>3.0.0</Version>
    </PackageReference>
</ItemGroup></Project>"#;
        let descriptor = Descriptor::parse("App.csproj", source).unwrap();
        let decl = &descriptor.declarations()[0];
        let span = VersionLocation::ELEMENT
            .removal_span(descriptor.document(), decl.element)
            .unwrap();
        assert_eq!(span.slice(source), "\n      <Version>3.0.0</Version>");
        assert!(VersionLocation::ATTRIBUTE
            .removal_span(descriptor.document(), decl.element)
            .is_none());
    }

    #[test]
    fn parse_error_names_the_file() {
        let err = Descriptor::parse("Broken.csproj", "<Project><ItemGroup></Project>").unwrap_err();
        assert!(err.to_string().starts_with("failed to parse Broken.csproj"));
    }
}
