//! Diagnostic events raised while building the graph
//!
//! Core components never log directly. They hand [`Diagnostic`]s to a
//! [`DiagnosticSink`] supplied by the caller: the CLI passes a
//! [`TracingSink`], tests usually collect into a `Vec<Diagnostic>`.

use std::path::PathBuf;

/// Why a module was removed from the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// Path matched one of the exclusion patterns
    Excluded { pattern: String },
    /// Binary-only module that was never parsed as a project
    NotAProject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A directory is being scanned for project files
    ScanningDirectory { path: PathBuf },
    /// A descriptor is being read for the first time
    ParsingDescriptor { path: PathBuf },
    /// A project reference points at a file that does not exist
    BrokenReference { from: PathBuf, to: PathBuf },
    /// The directory walk failed on one entry
    WalkError { message: String },
    ModuleDiscarded { path: String, reason: DiscardReason },
    /// A module has no entry in the metadata overlay
    NewModule { path: String },
}

pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Forwards diagnostics to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::ScanningDirectory { path } => {
                tracing::debug!("Parsing dir {}", path.display());
            }
            Diagnostic::ParsingDescriptor { path } => {
                tracing::debug!("Parsing {}", path.display());
            }
            Diagnostic::BrokenReference { from, to } => {
                tracing::warn!("Broken reference \"{}\" => \"{}\"", from.display(), to.display());
            }
            Diagnostic::WalkError { message } => {
                tracing::warn!("Error walking directory: {}", message);
            }
            Diagnostic::ModuleDiscarded { path, reason } => match reason {
                DiscardReason::Excluded { pattern } => {
                    tracing::debug!("Discarding {} (matches {})", path, pattern);
                }
                DiscardReason::NotAProject => {
                    tracing::debug!("Discarding binary module '{}'", path);
                }
            },
            Diagnostic::NewModule { path } => {
                tracing::debug!("New module {}", path);
            }
        }
    }
}
