//! Discovery and filtering settings

/// Extensions of the project descriptors we know how to parse
pub const PROJECT_EXTENSIONS: &[&str] = &["csproj", "vbproj", "vcproj", "vcxproj"];

/// Directories never descended into (version control metadata)
pub const SKIPPED_DIRS: &[&str] = &[".git", "$tf"];

/// Paths of test projects, test-support libraries and the bundled gmock sources
pub const EXCLUDE_PATTERNS: &[&str] = &[
    r"tests?\.csproj$",
    r"\.tests?\.",
    r"\.testsupport\.",
    r"\.testsuite\.csproj$",
    r"[\\/]gmock-\d.\d.\d[\\/]",
];

/// What to do with a project reference whose target file is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrokenReferencePolicy {
    /// Report it and drop the edge
    #[default]
    Warn,
    /// Abort the run
    Fail,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Extensions without the leading dot, compared case-insensitively
    pub project_extensions: Vec<String>,
    pub skipped_dirs: Vec<String>,
    /// Regexes searched case-insensitively in module paths
    pub exclude_patterns: Vec<String>,
    pub broken_references: BrokenReferencePolicy,
}

impl DiscoveryConfig {
    /// True when `path` ends in one of the project extensions
    pub fn is_project_path(&self, path: &str) -> bool {
        match path.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.contains(['/', '\\']) => self
                .project_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        Self {
            project_extensions: owned(PROJECT_EXTENSIONS),
            skipped_dirs: owned(SKIPPED_DIRS),
            exclude_patterns: owned(EXCLUDE_PATTERNS),
            broken_references: BrokenReferencePolicy::default(),
        }
    }
}
