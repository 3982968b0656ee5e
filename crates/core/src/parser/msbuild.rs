//! MSBuild project file reader
//!
//! Extracts the handful of fields the graph needs from a `.csproj`,
//! `.vbproj`, `.vcproj` or `.vcxproj` document. Only elements in the
//! MSBuild 2003 namespace are recognised.
//!
//! Files are decoded before parsing: a byte order mark wins, then the
//! `encoding` of the XML declaration, then UTF-8. Old `.vcproj` files are
//! typically `Windows-1252`; some tools save `UTF-16` with a BOM.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use percent_encoding::percent_decode_str;
use roxmltree::{Document, Node};

use crate::error::DescriptorError;
use crate::graph::OutputType;

pub const MSBUILD_NAMESPACE: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

/// Project type GUIDs of ASP.NET / MVC / web site projects
const WEB_APPLICATION_GUIDS: &[&str] = &[
    "{349C5851-65DF-11DA-9384-00065B846F21}",
    "{603C0E0B-DB56-11DC-BE95-000D561079B0}",
    "{F85E285D-A4E0-4152-9332-AB1D724D3325}",
    "{E53F8FEA-EAE0-44A6-8774-FFD645390401}",
    "{E3E379DF-F4C6-4180-9B81-6769533ABE47}",
];

/// The fields of one project file that matter for the dependency graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub assembly_name: Option<String>,
    pub root_namespace: Option<String>,
    pub output_type: Option<String>,
    pub configuration_type: Option<String>,
    pub project_type_guids: Option<String>,
    /// `ProjectReference/@Include` values, percent-decoded
    pub project_references: Vec<String>,
    pub references: Vec<ExternalReference>,
}

/// A `<Reference>` to a binary assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    /// Compound definition, e.g. `log4net, Version=1.2.10.0, Culture=neutral`
    pub include: String,
    pub hint_path: Option<String>,
}

impl ProjectDescriptor {
    /// Display name: assembly name, then root namespace, then the file name
    pub fn display_name(&self, path: &Path) -> String {
        self.assembly_name
            .clone()
            .or_else(|| self.root_namespace.clone())
            .unwrap_or_else(|| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
    }

    /// Classification, most specific source first
    pub fn resolve_output_type(&self) -> OutputType {
        classify_project_type_guids(self.project_type_guids.as_deref())
            .or_else(|| self.output_type.as_deref().map(OutputType::from))
            .or_else(|| self.configuration_type.as_deref().map(OutputType::from))
            .unwrap_or_default()
    }
}

/// Map a `;`-separated list of project type GUIDs to a known output type
///
/// Returns `None` when no GUID is recognised.
pub fn classify_project_type_guids(guids: Option<&str>) -> Option<OutputType> {
    let guids: HashSet<String> = guids
        .unwrap_or_default()
        .to_uppercase()
        .split(';')
        .map(str::to_string)
        .collect();

    WEB_APPLICATION_GUIDS
        .iter()
        .any(|known| guids.contains(*known))
        .then_some(OutputType::WebApplication)
}

/// Parsed form of a reference's `Include` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyDefinition {
    /// Lower-cased assembly name
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

impl AssemblyDefinition {
    pub fn parse(definition: &str) -> Self {
        let mut parts = definition.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default().to_lowercase();
        let properties = parts
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();
        Self { name, properties }
    }
}

/// Read and parse the project file at `path`
pub fn read_descriptor(path: &Path) -> Result<ProjectDescriptor, DescriptorError> {
    let bytes = std::fs::read(path).map_err(|source| DescriptorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_descriptor(&decode_descriptor(&bytes), path)
}

/// Decode raw project file bytes to text
///
/// Undecodable sequences become U+FFFD rather than failing the read.
pub fn decode_descriptor(bytes: &[u8]) -> Cow<'_, str> {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| declared_encoding(bytes))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text
}

/// Encoding named by an `<?xml ... encoding="..."?>` declaration
///
/// Only ASCII-compatible encodings can be named this way without a BOM, so a
/// `UTF-16` label maps to UTF-8.
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let declaration = bytes.strip_prefix(b"<?xml")?;
    let end = declaration.windows(2).position(|window| window == b"?>")?;
    let declaration = std::str::from_utf8(&declaration[..end]).ok()?;

    let (_, rest) = declaration.split_once("encoding")?;
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let label = rest[1..].split(quote).next()?;
    Encoding::for_label(label.as_bytes()).map(Encoding::output_encoding)
}

/// Parse project file contents; `path` is only used for error reporting
pub fn parse_descriptor(text: &str, path: &Path) -> Result<ProjectDescriptor, DescriptorError> {
    let doc = Document::parse(text).map_err(|source| DescriptorError::Xml {
        path: path.to_path_buf(),
        source,
    })?;
    let root = doc.root();

    let project_references = root
        .descendants()
        .filter(|node| node.has_tag_name((MSBUILD_NAMESPACE, "ProjectReference")))
        .filter_map(|node| node.attribute("Include"))
        .map(|include| percent_decode_str(include).decode_utf8_lossy().into_owned())
        .collect();

    let references = root
        .descendants()
        .filter(|node| node.has_tag_name((MSBUILD_NAMESPACE, "Reference")))
        .map(|node| {
            let include = node
                .attribute("Include")
                .ok_or_else(|| DescriptorError::MissingInclude {
                    path: path.to_path_buf(),
                })?;
            let hint_path = node
                .children()
                .find(|child| child.has_tag_name((MSBUILD_NAMESPACE, "HintPath")))
                .and_then(non_empty_text);
            Ok(ExternalReference {
                include: include.to_string(),
                hint_path,
            })
        })
        .collect::<Result<Vec<_>, DescriptorError>>()?;

    Ok(ProjectDescriptor {
        assembly_name: find_text(root, "AssemblyName"),
        root_namespace: find_text(root, "RootNamespace"),
        output_type: find_text(root, "OutputType"),
        configuration_type: find_text(root, "ConfigurationType"),
        project_type_guids: find_text(root, "ProjectTypeGuids"),
        project_references,
        references,
    })
}

/// Text of the first descendant with the given MSBuild element name
fn find_text(root: Node<'_, '_>, name: &str) -> Option<String> {
    root.descendants()
        .find(|node| node.has_tag_name((MSBUILD_NAMESPACE, name)))
        .and_then(non_empty_text)
}

fn non_empty_text(node: Node<'_, '_>) -> Option<String> {
    node.text()
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="4.0" xmlns="{MSBUILD_NAMESPACE}">
{body}
</Project>"#
        )
    }

    fn parse(body: &str) -> ProjectDescriptor {
        parse_descriptor(&project(body), Path::new("test.csproj")).unwrap()
    }

    #[test]
    fn test_reads_property_fields() {
        let descriptor = parse(
            r#"<PropertyGroup>
                 <OutputType>Library</OutputType>
                 <RootNamespace>Acme.Core</RootNamespace>
                 <AssemblyName>Acme.Core.Lib</AssemblyName>
               </PropertyGroup>"#,
        );

        assert_eq!(descriptor.assembly_name.as_deref(), Some("Acme.Core.Lib"));
        assert_eq!(descriptor.root_namespace.as_deref(), Some("Acme.Core"));
        assert_eq!(descriptor.output_type.as_deref(), Some("Library"));
        assert_eq!(descriptor.configuration_type, None);
        assert_eq!(descriptor.display_name(Path::new("x/core.csproj")), "Acme.Core.Lib");
        assert_eq!(
            descriptor.resolve_output_type(),
            OutputType::Declared("Library".into())
        );
    }

    #[test]
    fn test_display_name_fallbacks() {
        let descriptor = parse("<PropertyGroup><RootNamespace>Acme</RootNamespace></PropertyGroup>");
        assert_eq!(descriptor.display_name(Path::new("a/b.csproj")), "Acme");

        let descriptor = parse("<PropertyGroup><AssemblyName></AssemblyName></PropertyGroup>");
        assert_eq!(descriptor.display_name(Path::new("a/Engine.vcxproj")), "Engine.vcxproj");
    }

    #[test]
    fn test_elements_outside_namespace_are_ignored() {
        let text = r#"<Project><PropertyGroup><AssemblyName>Old</AssemblyName></PropertyGroup></Project>"#;
        let descriptor = parse_descriptor(text, Path::new("old.vcproj")).unwrap();

        assert_eq!(descriptor, ProjectDescriptor::default());
        assert_eq!(descriptor.resolve_output_type(), OutputType::Unknown);
    }

    #[test]
    fn test_output_type_priority() {
        let web = parse(
            r#"<PropertyGroup>
                 <ProjectTypeGuids>{349c5851-65df-11da-9384-00065b846f21};{fae04ec0-301f-11d3-bf4b-00c04f79efbc}</ProjectTypeGuids>
                 <OutputType>Library</OutputType>
               </PropertyGroup>"#,
        );
        assert_eq!(web.resolve_output_type(), OutputType::WebApplication);

        let unknown_guid = parse(
            r#"<PropertyGroup>
                 <ProjectTypeGuids>{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}</ProjectTypeGuids>
                 <OutputType>Exe</OutputType>
               </PropertyGroup>"#,
        );
        assert_eq!(unknown_guid.resolve_output_type(), OutputType::Declared("Exe".into()));

        let native = parse(
            r#"<PropertyGroup Label="Configuration">
                 <ConfigurationType>DynamicLibrary</ConfigurationType>
               </PropertyGroup>"#,
        );
        assert_eq!(native.resolve_output_type(), OutputType::DynamicLibrary);
    }

    #[test]
    fn test_classify_project_type_guids() {
        assert_eq!(classify_project_type_guids(None), None);
        assert_eq!(classify_project_type_guids(Some("")), None);
        assert_eq!(
            classify_project_type_guids(Some("{E3E379DF-F4C6-4180-9B81-6769533ABE47}")),
            Some(OutputType::WebApplication)
        );
    }

    #[test]
    fn test_reads_references() {
        let descriptor = parse(
            r#"<ItemGroup>
                 <ProjectReference Include="..\Core%20Lib\Core.csproj">
                   <Name>Core</Name>
                 </ProjectReference>
                 <ProjectReference />
               </ItemGroup>
               <ItemGroup>
                 <Reference Include="System.Xml" />
                 <Reference Include="log4net, Version=1.2.10.0, Culture=neutral">
                   <HintPath>..\packages\log4net\log4net.dll</HintPath>
                 </Reference>
               </ItemGroup>"#,
        );

        assert_eq!(descriptor.project_references, vec![r"..\Core Lib\Core.csproj".to_string()]);
        assert_eq!(
            descriptor.references,
            vec![
                ExternalReference {
                    include: "System.Xml".into(),
                    hint_path: None,
                },
                ExternalReference {
                    include: "log4net, Version=1.2.10.0, Culture=neutral".into(),
                    hint_path: Some(r"..\packages\log4net\log4net.dll".into()),
                },
            ]
        );
    }

    #[test]
    fn test_reference_without_include_is_malformed() {
        let text = project("<ItemGroup><Reference /></ItemGroup>");
        let err = parse_descriptor(&text, Path::new("bad.csproj")).unwrap_err();
        assert!(matches!(err, DescriptorError::MissingInclude { .. }));
    }

    #[test]
    fn test_unparseable_xml_is_an_error() {
        let err = parse_descriptor("<Project><Unclosed></Project>", Path::new("bad.csproj")).unwrap_err();
        assert!(matches!(err, DescriptorError::Xml { .. }));
    }

    fn write_bytes(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_reads_windows_1252_descriptor() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bytes = format!(
            r#"<?xml version="1.0" encoding="Windows-1252"?>
<Project xmlns="{MSBUILD_NAMESPACE}"><PropertyGroup><AssemblyName>M"#
        )
        .into_bytes();
        bytes.push(0xFC);
        bytes.extend_from_slice(b"ller</AssemblyName></PropertyGroup></Project>");
        let path = write_bytes(&dir, "old.vcproj", &bytes);

        let descriptor = read_descriptor(&path).unwrap();

        assert_eq!(descriptor.assembly_name.as_deref(), Some("M\u{fc}ller"));
    }

    #[test]
    fn test_reads_utf16_descriptor_with_bom() {
        let dir = tempfile::TempDir::new().unwrap();
        let text = project("<PropertyGroup><AssemblyName>Wide</AssemblyName></PropertyGroup>")
            .replace("utf-8", "utf-16");
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
        let path = write_bytes(&dir, "wide.csproj", &bytes);

        let descriptor = read_descriptor(&path).unwrap();

        assert_eq!(descriptor.assembly_name.as_deref(), Some("Wide"));
    }

    #[test]
    fn test_decode_descriptor() {
        assert_eq!(decode_descriptor(b"\xEF\xBB\xBF<Project/>"), "<Project/>");
        assert_eq!(decode_descriptor(b"<Project Name=\"caf\xC3\xA9\"/>"), "<Project Name=\"caf\u{e9}\"/>");
        assert_eq!(
            decode_descriptor(b"<?xml version='1.0' encoding='iso-8859-1'?><P>\xE9</P>"),
            "<?xml version='1.0' encoding='iso-8859-1'?><P>\u{e9}</P>"
        );
        // no BOM, so the bytes cannot really be UTF-16
        assert_eq!(
            decode_descriptor(b"<?xml version=\"1.0\" encoding=\"utf-16\"?><P/>"),
            "<?xml version=\"1.0\" encoding=\"utf-16\"?><P/>"
        );
    }

    #[test]
    fn test_assembly_definition() {
        let def = AssemblyDefinition::parse(
            "Newtonsoft.Json , Version = 6.0.0.0, Culture=neutral, PublicKeyToken=30ad4fe6b2a6aeed, ",
        );
        assert_eq!(def.name, "newtonsoft.json");
        assert_eq!(def.properties.len(), 3);
        assert_eq!(def.properties["Version"], "6.0.0.0");
        assert_eq!(def.properties["PublicKeyToken"], "30ad4fe6b2a6aeed");

        let bare = AssemblyDefinition::parse("System.Core");
        assert_eq!(bare.name, "system.core");
        assert!(bare.properties.is_empty());
    }
}
