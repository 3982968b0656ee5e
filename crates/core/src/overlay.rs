//! Externally maintained module metadata
//!
//! The overlay file maps module paths to attribute overrides:
//!
//! ```json
//! {
//!     "src/app/app.csproj": { "team": "Payments" },
//!     "src/core/core.csproj": { "team": "Platform", "name": "Core" }
//! }
//! ```
//!
//! Modules that have no entry are collected with a `?` team so that the
//! operator can fill them in for the next run.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::OverlayError;
use crate::graph::{Module, ModuleRegistry, OutputType};

/// Team written for modules that are missing from the overlay
pub const NEW_MODULE_TEAM: &str = "?";

/// Attribute overrides for one module, keyed by attribute name
pub type ModuleAttributes = BTreeMap<String, Value>;

/// Overlay contents, keyed by module path
pub type Overlay = BTreeMap<String, ModuleAttributes>;

/// Module attributes the overlay may set; all of them hold text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridableField {
    Team,
    Name,
    OutputType,
}

impl OverridableField {
    pub const ALL: [OverridableField; 3] = [
        OverridableField::Team,
        OverridableField::Name,
        OverridableField::OutputType,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OverridableField::Team => "team",
            OverridableField::Name => "name",
            OverridableField::OutputType => "output_type",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    fn set(self, module: &mut Module, value: String) {
        match self {
            OverridableField::Team => module.team = value,
            OverridableField::Name => module.name = value,
            OverridableField::OutputType => module.output_type = OutputType::from(value.as_str()),
        }
    }
}

/// Placeholder entry written for a module missing from the overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewModuleRecord {
    pub team: String,
}

impl Default for NewModuleRecord {
    fn default() -> Self {
        Self {
            team: NEW_MODULE_TEAM.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayReport {
    /// Modules that received at least one override
    pub applied: usize,
    /// Modules without overlay metadata, keyed by path
    pub unseen: BTreeMap<String, NewModuleRecord>,
}

/// Read an overlay file
pub fn load(path: &Path) -> Result<Overlay, OverlayError> {
    let text = std::fs::read_to_string(path).map_err(|source| OverlayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| OverlayError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `overlay` to every module in `registry`
///
/// An entry with no attributes counts as missing.
pub fn merge(
    registry: &mut ModuleRegistry,
    overlay: &Overlay,
    sink: &mut dyn DiagnosticSink,
) -> Result<OverlayReport, OverlayError> {
    let mut report = OverlayReport::default();

    for id in registry.ids() {
        let Some(module) = registry.module_mut(id) else {
            continue;
        };
        match overlay.get(module.path()).filter(|attrs| !attrs.is_empty()) {
            Some(attributes) => {
                for (attribute, value) in attributes {
                    let field = OverridableField::from_name(attribute).ok_or_else(|| {
                        OverlayError::UnknownAttribute {
                            module: module.path().to_string(),
                            attribute: attribute.clone(),
                        }
                    })?;
                    let text = coerce_text(value).ok_or_else(|| {
                        OverlayError::InvalidAttributeValue {
                            module: module.path().to_string(),
                            attribute: attribute.clone(),
                            value: value.clone(),
                        }
                    })?;
                    field.set(module, text);
                }
                report.applied += 1;
            }
            None => {
                sink.emit(Diagnostic::NewModule {
                    path: module.path().to_string(),
                });
                report
                    .unseen
                    .insert(module.path().to_string(), NewModuleRecord::default());
            }
        }
    }

    Ok(report)
}

/// Write the placeholder records, tab-indented
pub fn write_new_metadata(
    path: &Path,
    unseen: &BTreeMap<String, NewModuleRecord>,
) -> Result<(), OverlayError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    unseen
        .serialize(&mut serializer)
        .map_err(|source| OverlayError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    std::fs::write(path, out).map_err(|source| OverlayError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `overlay_path`, merge it, and write unseen modules to
/// `new_metadata_path` when there are any
pub fn apply_file(
    registry: &mut ModuleRegistry,
    overlay_path: &Path,
    new_metadata_path: Option<&Path>,
    sink: &mut dyn DiagnosticSink,
) -> Result<OverlayReport, OverlayError> {
    let overlay = load(overlay_path)?;
    let report = merge(registry, &overlay, sink)?;

    if let Some(target) = new_metadata_path {
        if !report.unseen.is_empty() {
            write_new_metadata(target, &report.unseen)?;
        }
    }

    Ok(report)
}

/// Text form of an override; `None` for values that are not scalars
fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn overlay(value: Value) -> Overlay {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_merge_sets_team_and_reports_unseen() {
        let mut registry = ModuleRegistry::new();
        let a = registry.create("a/a.csproj", "A").unwrap();
        let b = registry.create("b/b.csproj", "B").unwrap();
        let mut diagnostics = Vec::new();

        let report = merge(
            &mut registry,
            &overlay(json!({ "a/a.csproj": { "team": "X" } })),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(registry.module(a).unwrap().team, "X");
        assert_eq!(registry.module(b).unwrap().team, "");
        assert_eq!(report.applied, 1);
        assert_eq!(
            report.unseen,
            BTreeMap::from([("b/b.csproj".to_string(), NewModuleRecord::default())])
        );
        assert_eq!(
            diagnostics,
            vec![Diagnostic::NewModule {
                path: "b/b.csproj".into()
            }]
        );
    }

    #[test]
    fn test_merge_coerces_scalars_to_text() {
        let mut registry = ModuleRegistry::new();
        let a = registry.create("a", "A").unwrap();
        let b = registry.create("b", "B").unwrap();
        let mut diagnostics = Vec::new();

        merge(
            &mut registry,
            &overlay(json!({
                "a": { "team": 42, "name": "Alpha", "output_type": "Web Application" },
                "b": { "team": true },
            })),
            &mut diagnostics,
        )
        .unwrap();

        let a = registry.module(a).unwrap();
        assert_eq!(a.team, "42");
        assert_eq!(a.name, "Alpha");
        assert_eq!(a.output_type, OutputType::WebApplication);
        assert_eq!(registry.module(b).unwrap().team, "true");
    }

    #[test]
    fn test_empty_entry_counts_as_unseen() {
        let mut registry = ModuleRegistry::new();
        registry.create("a", "A").unwrap();
        let mut diagnostics = Vec::new();

        let report = merge(&mut registry, &overlay(json!({ "a": {} })), &mut diagnostics).unwrap();

        assert_eq!(report.applied, 0);
        assert!(report.unseen.contains_key("a"));
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        let mut registry = ModuleRegistry::new();
        registry.create("a", "A").unwrap();
        let mut diagnostics = Vec::new();

        let err = merge(&mut registry, &overlay(json!({ "a": { "path": "b" } })), &mut diagnostics)
            .unwrap_err();

        assert!(matches!(err, OverlayError::UnknownAttribute { ref attribute, .. } if attribute == "path"));
    }

    #[test]
    fn test_non_scalar_value_is_rejected() {
        let mut registry = ModuleRegistry::new();
        registry.create("a", "A").unwrap();
        let mut diagnostics = Vec::new();

        let err = merge(
            &mut registry,
            &overlay(json!({ "a": { "team": ["x", "y"] } })),
            &mut diagnostics,
        )
        .unwrap_err();

        assert!(matches!(err, OverlayError::InvalidAttributeValue { .. }));
    }

    #[test]
    fn test_apply_file_writes_new_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let overlay_path = temp_dir.path().join("extra_attrs.json");
        let new_path = temp_dir.path().join("extra_attrs_new.json");
        fs::write(&overlay_path, r#"{ "a/a.csproj": { "team": "X" } }"#).unwrap();

        let mut registry = ModuleRegistry::new();
        registry.create("a/a.csproj", "A").unwrap();
        registry.create("c/c.csproj", "C").unwrap();
        let mut diagnostics = Vec::new();

        apply_file(&mut registry, &overlay_path, Some(&new_path), &mut diagnostics).unwrap();

        let written = fs::read_to_string(&new_path).unwrap();
        assert_eq!(written, "{\n\t\"c/c.csproj\": {\n\t\t\"team\": \"?\"\n\t}\n}");
    }

    #[test]
    fn test_apply_file_skips_output_when_all_known() {
        let temp_dir = TempDir::new().unwrap();
        let overlay_path = temp_dir.path().join("extra_attrs.json");
        let new_path = temp_dir.path().join("extra_attrs_new.json");
        fs::write(&overlay_path, r#"{ "a/a.csproj": { "team": "X" } }"#).unwrap();

        let mut registry = ModuleRegistry::new();
        registry.create("a/a.csproj", "A").unwrap();
        let mut diagnostics = Vec::new();

        let report = apply_file(&mut registry, &overlay_path, Some(&new_path), &mut diagnostics).unwrap();

        assert!(report.unseen.is_empty());
        assert!(!new_path.exists());
    }

    #[test]
    fn test_missing_overlay_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = ModuleRegistry::new();
        let mut diagnostics = Vec::new();

        let err = apply_file(
            &mut registry,
            &temp_dir.path().join("missing.json"),
            None,
            &mut diagnostics,
        )
        .unwrap_err();

        assert!(matches!(err, OverlayError::Io { .. }));
    }
}
