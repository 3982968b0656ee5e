//! Descriptor parser: turns project files into registry modules
//!
//! [`DescriptorParser::parse`] is reentrant. A project reference is resolved by
//! parsing the referenced file on the spot, and a module is created before its
//! references are followed, so revisiting a path (diamonds, cycles, the
//! directory walk reaching an already-referenced file) returns the existing
//! module instead of parsing again.
//!
//! # Module paths
//!
//! A project module is identified by its file's location relative to the base
//! directory, lower-cased and `/`-separated (e.g. `src/app/app.csproj`). A
//! binary referenced through a hint path lives in the same path space; one
//! referenced by name only is identified by its lower-cased assembly name.

use std::path::{Component, Path, PathBuf};

use crate::config::BrokenReferencePolicy;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::DescriptorError;
use crate::graph::{ModuleId, ModuleRegistry, OutputType};

pub mod msbuild;

use msbuild::AssemblyDefinition;

/// Parser for MSBuild project descriptors rooted at a base directory
pub struct DescriptorParser<'a> {
    base_dir: PathBuf,
    broken_references: BrokenReferencePolicy,
    sink: &'a mut dyn DiagnosticSink,
}

impl<'a> DescriptorParser<'a> {
    /// Create a parser whose module paths are relative to `base_dir`
    pub fn new(base_dir: &Path, sink: &'a mut dyn DiagnosticSink) -> Self {
        let base_dir = std::path::absolute(base_dir).unwrap_or_else(|_| base_dir.to_path_buf());
        Self {
            base_dir: normalize_lexically(&base_dir),
            broken_references: BrokenReferencePolicy::default(),
            sink,
        }
    }

    pub fn with_broken_reference_policy(mut self, policy: BrokenReferencePolicy) -> Self {
        self.broken_references = policy;
        self
    }

    /// Parse a descriptor into `registry`, following its references
    ///
    /// Returns the existing module untouched if the descriptor's path is
    /// already registered.
    ///
    /// # Errors
    /// Unreadable or malformed descriptors, and broken project references
    /// under [`BrokenReferencePolicy::Fail`].
    pub fn parse(
        &mut self,
        registry: &mut ModuleRegistry,
        descriptor: &Path,
    ) -> Result<ModuleId, DescriptorError> {
        let descriptor = std::path::absolute(descriptor)
            .map(|path| normalize_lexically(&path))
            .map_err(|source| DescriptorError::Io {
                path: descriptor.to_path_buf(),
                source,
            })?;

        let path = module_path(&self.base_dir, &descriptor);
        if let Some(existing) = registry.find_by_path(&path) {
            return Ok(existing);
        }

        self.sink.emit(Diagnostic::ParsingDescriptor {
            path: descriptor.clone(),
        });
        let project = msbuild::read_descriptor(&descriptor)?;

        let id = registry.create(&path, &project.display_name(&descriptor))?;
        if let Some(module) = registry.module_mut(id) {
            module.output_type = project.resolve_output_type();
        }

        let project_dir = descriptor.parent().unwrap_or(&self.base_dir).to_path_buf();

        for include in &project.project_references {
            let target = normalize_lexically(&project_dir.join(msbuild_path(include)));
            if !target.exists() {
                match self.broken_references {
                    BrokenReferencePolicy::Warn => {
                        self.sink.emit(Diagnostic::BrokenReference {
                            from: descriptor.clone(),
                            to: target,
                        });
                        continue;
                    }
                    BrokenReferencePolicy::Fail => {
                        return Err(DescriptorError::BrokenReference {
                            from: descriptor,
                            to: target,
                        });
                    }
                }
            }
            let referenced = self.parse(registry, &target)?;
            registry.add_reference(id, referenced);
        }

        for reference in &project.references {
            let assembly = AssemblyDefinition::parse(&reference.include);
            let reference_path = match &reference.hint_path {
                Some(hint) => {
                    let hint = normalize_lexically(&project_dir.join(msbuild_path(hint)));
                    module_path(&self.base_dir, &hint)
                }
                None => assembly.name.clone(),
            };

            let referenced = match registry.find_by_path(&reference_path) {
                Some(existing) => existing,
                None => {
                    let created = registry.create(&reference_path, &assembly.name)?;
                    if let Some(module) = registry.module_mut(created) {
                        module.output_type = OutputType::DynamicLibrary;
                    }
                    created
                }
            };
            registry.add_reference(id, referenced);
        }

        Ok(id)
    }
}

/// Identity path of `file` relative to `base_dir`
///
/// Both paths should be absolute and lexically normalized. The result is
/// lower-cased and uses `/` separators; files outside `base_dir` keep their
/// leading `..` segments.
pub fn module_path(base_dir: &Path, file: &Path) -> String {
    let relative = pathdiff::diff_paths(file, base_dir).unwrap_or_else(|| file.to_path_buf());
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
        .to_lowercase()
}

/// Convert an MSBuild path (always `\`-separated) for the host platform
fn msbuild_path(raw: &str) -> PathBuf {
    PathBuf::from(raw.replace('\\', "/"))
}

/// Fold `.` and `..` components without touching the file system
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
