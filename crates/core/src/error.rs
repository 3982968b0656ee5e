//! Error types for every stage of the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the module registry.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("module {0} already defined")]
    DuplicateModule(String),

    #[error("invalid module pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Errors raised while reading a single project descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed project file {path}: {source}")]
    Xml {
        path: PathBuf,
        source: roxmltree::Error,
    },

    #[error("<Reference> without an Include attribute in {path}")]
    MissingInclude { path: PathBuf },

    #[error("broken reference \"{from}\" => \"{to}\"")]
    BrokenReference { from: PathBuf, to: PathBuf },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors raised while walking a source tree.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("base directory {path} is not accessible: {source}")]
    BaseDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid project extension pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors raised while merging or writing module metadata.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid metadata in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("module {module}: unknown attribute `{attribute}`")]
    UnknownAttribute { module: String, attribute: String },

    #[error("module {module}: attribute `{attribute}` expects text, got {value}")]
    InvalidAttributeValue {
        module: String,
        attribute: String,
        value: serde_json::Value,
    },
}

/// Errors raised while writing the graph document.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode graph document: {0}")]
    Xml(#[from] quick_xml::Error),
}
