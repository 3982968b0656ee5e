//! Module registry and dependency edges
//!
//! Uses `petgraph::StableDiGraph` so that module handles remain valid while
//! other modules are removed during filtering. The graph's edge list is the
//! single source of truth: references are the outgoing view of a module and
//! usages the incoming view, so the two can never disagree.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{Bfs, Reversed};
use petgraph::Direction;
use regex::RegexBuilder;

use crate::error::GraphError;

/// How a module is built, as far as its descriptor tells us
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum OutputType {
    /// Never determined
    #[default]
    Unknown,
    /// Project type GUIDs identify a web application
    WebApplication,
    /// Binary referenced by assembly name or hint path, never parsed itself
    DynamicLibrary,
    /// Raw `OutputType` / `ConfigurationType` value (e.g. `Exe`, `Library`)
    Declared(String),
}

impl OutputType {
    pub fn as_str(&self) -> &str {
        match self {
            OutputType::Unknown => "Unknown",
            OutputType::WebApplication => "Web Application",
            OutputType::DynamicLibrary => "DynamicLibrary",
            OutputType::Declared(value) => value,
        }
    }
}

impl From<&str> for OutputType {
    fn from(value: &str) -> Self {
        match value {
            "Unknown" => OutputType::Unknown,
            "Web Application" => OutputType::WebApplication,
            "DynamicLibrary" => OutputType::DynamicLibrary,
            other => OutputType::Declared(other.to_string()),
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the dependency graph: one project or one external library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    path: String,
    /// Display name, not necessarily unique
    pub name: String,
    pub output_type: OutputType,
    /// Ownership label; empty until the metadata overlay assigns one
    pub team: String,
}

impl Module {
    fn new(path: String, name: String) -> Self {
        Self {
            path,
            name,
            output_type: OutputType::Unknown,
            team: String::new(),
        }
    }

    /// Lower-cased identity key
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Opaque handle to a module in a [`ModuleRegistry`]
///
/// Handles of removed modules must not be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(NodeIndex);

/// The owning collection of modules, keyed by path
pub struct ModuleRegistry {
    inner: StableDiGraph<Module, ()>,
    by_path: HashMap<String, NodeIndex>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("module_count", &self.inner.node_count())
            .field("reference_count", &self.inner.edge_count())
            .finish()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            inner: StableDiGraph::new(),
            by_path: HashMap::new(),
        }
    }

    /// Insert a new module
    ///
    /// The path is lower-cased before use. Fails if a module with the same
    /// path already exists.
    pub fn create(&mut self, path: &str, name: &str) -> Result<ModuleId, GraphError> {
        let key = path.to_lowercase();
        if self.by_path.contains_key(&key) {
            return Err(GraphError::DuplicateModule(key));
        }
        let idx = self.inner.add_node(Module::new(key.clone(), name.to_string()));
        self.by_path.insert(key, idx);
        Ok(ModuleId(idx))
    }

    /// Look up a module by path (case-insensitive); never creates
    pub fn find_by_path(&self, path: &str) -> Option<ModuleId> {
        self.by_path.get(&path.to_lowercase()).copied().map(ModuleId)
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.inner.node_weight(id.0)
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.inner.node_weight_mut(id.0)
    }

    /// Record that `from` depends on `to`
    ///
    /// Adding an existing reference again is a no-op.
    pub fn add_reference(&mut self, from: ModuleId, to: ModuleId) {
        if self.inner.find_edge(from.0, to.0).is_none() {
            self.inner.add_edge(from.0, to.0, ());
        }
    }

    /// Modules `id` depends on
    pub fn references(&self, id: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        self.inner
            .neighbors_directed(id.0, Direction::Outgoing)
            .map(ModuleId)
    }

    /// Modules that depend on `id`
    pub fn usages(&self, id: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        self.inner
            .neighbors_directed(id.0, Direction::Incoming)
            .map(ModuleId)
    }

    /// Remove a module together with every reference to or from it
    ///
    /// Returns the removed module, or `None` if the handle is stale.
    pub fn remove_module(&mut self, id: ModuleId) -> Option<Module> {
        let module = self.inner.remove_node(id.0)?;
        self.by_path.remove(&module.path);
        Some(module)
    }

    /// Remove every module whose path matches `pattern` (regex search,
    /// case-insensitive)
    ///
    /// Returns the removed modules.
    pub fn remove_by_pattern(&mut self, pattern: &str) -> Result<Vec<Module>, GraphError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| GraphError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        let matching: Vec<ModuleId> = self
            .iter()
            .filter(|(_, module)| regex.is_match(&module.path))
            .map(|(id, _)| id)
            .collect();

        Ok(matching
            .into_iter()
            .filter_map(|id| self.remove_module(id))
            .collect())
    }

    /// Every module reachable through references from `id`, including `id`
    pub fn get_recursive_references(&self, id: ModuleId) -> HashSet<ModuleId> {
        let mut reached = HashSet::new();
        if !self.inner.contains_node(id.0) {
            return reached;
        }
        let mut bfs = Bfs::new(&self.inner, id.0);
        while let Some(idx) = bfs.next(&self.inner) {
            reached.insert(ModuleId(idx));
        }
        reached
    }

    /// Every module that reaches `id` through references, including `id`
    pub fn get_recursive_usages(&self, id: ModuleId) -> HashSet<ModuleId> {
        let mut reached = HashSet::new();
        if !self.inner.contains_node(id.0) {
            return reached;
        }
        let reversed = Reversed(&self.inner);
        let mut bfs = Bfs::new(reversed, id.0);
        while let Some(idx) = bfs.next(reversed) {
            reached.insert(ModuleId(idx));
        }
        reached
    }

    /// Iterate over all modules in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx).map(|m| (ModuleId(idx), m)))
    }

    /// Snapshot of all module handles, safe to hold across removals
    pub fn ids(&self) -> Vec<ModuleId> {
        self.inner.node_indices().map(ModuleId).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    pub fn reference_count(&self) -> usize {
        self.inner.edge_count()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
