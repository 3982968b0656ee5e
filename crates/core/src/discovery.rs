//! Project discovery over a source tree
//!
//! Walks the base directory for project descriptors and feeds each one to the
//! [`DescriptorParser`]. Files already reached through another project's
//! references are recognised by path and not parsed twice.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::config::DiscoveryConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::DiscoveryError;
use crate::graph::ModuleRegistry;
use crate::parser::DescriptorParser;

/// Build the full, unfiltered module registry for `base_dir`
///
/// # Errors
/// Returns `DiscoveryError` if the base directory is inaccessible or any
/// descriptor cannot be parsed.
///
/// # Example
/// ```no_run
/// use projgraph_core::config::DiscoveryConfig;
/// use projgraph_core::diagnostics::TracingSink;
/// use projgraph_core::discovery;
///
/// let registry = discovery::discover(
///     std::path::Path::new("my_solution"),
///     &DiscoveryConfig::default(),
///     &mut TracingSink,
/// ).unwrap();
/// println!("Found {} modules", registry.len());
/// ```
pub fn discover(
    base_dir: &Path,
    config: &DiscoveryConfig,
    sink: &mut dyn DiagnosticSink,
) -> Result<ModuleRegistry, DiscoveryError> {
    let base_dir = base_dir
        .canonicalize()
        .map_err(|source| DiscoveryError::BaseDir {
            path: base_dir.to_path_buf(),
            source,
        })?;
    sink.emit(Diagnostic::ScanningDirectory {
        path: base_dir.clone(),
    });

    let files = discover_project_files(&base_dir, config, &mut *sink)?;

    let mut registry = ModuleRegistry::new();
    let mut parser = DescriptorParser::new(&base_dir, &mut *sink)
        .with_broken_reference_policy(config.broken_references);
    for file in &files {
        parser.parse(&mut registry, file)?;
    }

    Ok(registry)
}

/// Find project descriptors under `root`
///
/// Returns absolute paths in a deterministic (file name sorted, depth-first)
/// order. Directories listed in `config.skipped_dirs` are not entered;
/// `.gitignore` rules are not applied.
pub fn discover_project_files(
    root: &Path,
    config: &DiscoveryConfig,
    sink: &mut dyn DiagnosticSink,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let canonical_root = root.canonicalize().map_err(|source| DiscoveryError::BaseDir {
        path: root.to_path_buf(),
        source,
    })?;
    let glob_matcher = build_glob_matcher(&config.project_extensions)?;

    let mut files = Vec::new();
    for result in build_walker(&canonical_root, &config.skipped_dirs) {
        match result {
            Ok(entry) => {
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    continue;
                }
                if let Ok(rel_path) = entry.path().strip_prefix(&canonical_root) {
                    if glob_matcher.is_match(rel_path) {
                        files.push(entry.into_path());
                    }
                }
            }
            Err(err) => {
                sink.emit(Diagnostic::WalkError {
                    message: err.to_string(),
                });
            }
        }
    }

    Ok(files)
}

/// Case-insensitive `**/*.<ext>` matcher for every project extension
fn build_glob_matcher(extensions: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for extension in extensions {
        builder.add(
            GlobBuilder::new(&format!("**/*.{extension}"))
                .case_insensitive(true)
                .build()?,
        );
    }
    builder.build()
}

/// Walk everything except the skipped directories
fn build_walker(root: &Path, skipped_dirs: &[String]) -> ignore::Walk {
    let skipped = skipped_dirs.to_vec();
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            entry.depth() == 0
                || !is_dir
                || !skipped
                    .iter()
                    .any(|name| entry.file_name() == name.as_str())
        });
    builder.build()
}
