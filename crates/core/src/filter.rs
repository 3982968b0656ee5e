//! Post-discovery filtering
//!
//! Runs once the registry is complete: first drops test projects and other
//! excluded paths, then every module that is not itself a project (binaries
//! only known through `<Reference>` elements).

use crate::config::DiscoveryConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink, DiscardReason};
use crate::error::GraphError;
use crate::graph::ModuleRegistry;

/// How many modules each pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub excluded: usize,
    pub external: usize,
}

/// Apply both filtering passes
pub fn apply(
    registry: &mut ModuleRegistry,
    config: &DiscoveryConfig,
    sink: &mut dyn DiagnosticSink,
) -> Result<FilterReport, GraphError> {
    let excluded = remove_excluded(registry, &config.exclude_patterns, &mut *sink)?;
    let external = remove_non_projects(registry, config, sink);
    Ok(FilterReport { excluded, external })
}

/// Remove modules whose path matches any of `patterns`
pub fn remove_excluded(
    registry: &mut ModuleRegistry,
    patterns: &[String],
    sink: &mut dyn DiagnosticSink,
) -> Result<usize, GraphError> {
    let mut removed_count = 0;
    for pattern in patterns {
        for module in registry.remove_by_pattern(pattern)? {
            sink.emit(Diagnostic::ModuleDiscarded {
                path: module.path().to_string(),
                reason: DiscardReason::Excluded {
                    pattern: pattern.clone(),
                },
            });
            removed_count += 1;
        }
    }
    Ok(removed_count)
}

/// Remove modules whose path does not carry a project extension
pub fn remove_non_projects(
    registry: &mut ModuleRegistry,
    config: &DiscoveryConfig,
    sink: &mut dyn DiagnosticSink,
) -> usize {
    let mut removed_count = 0;
    for id in registry.ids() {
        let is_project = registry
            .module(id)
            .is_some_and(|module| config.is_project_path(module.path()));
        if is_project {
            continue;
        }
        if let Some(module) = registry.remove_module(id) {
            sink.emit(Diagnostic::ModuleDiscarded {
                path: module.path().to_string(),
                reason: DiscardReason::NotAProject,
            });
            removed_count += 1;
        }
    }
    removed_count
}
