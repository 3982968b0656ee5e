//! GraphML export
//!
//! One `<node>` per module carrying its path, name, type and team, and one
//! `<edge>` per reference flagged with whether it crosses a team boundary.
//! Edges follow their source node; a module's edges are ordered by target path.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::ExportError;
use crate::graph::{Module, ModuleId, ModuleRegistry};

const GRAPHML_NAMESPACE: &str = "http://graphml.graphdrawing.org/xmlns";

/// `(id, for, attr.name, attr.type)` of every GraphML attribute key
const KEYS: &[(&str, &str, &str, &str)] = &[
    ("module_path", "node", "Module Path", "string"),
    ("module_name", "node", "Module Name", "string"),
    ("module_type", "node", "Module Type", "string"),
    ("module_team", "node", "Module Team", "string"),
    ("reference_crossteam", "edge", "Cross Team", "boolean"),
];

/// Teams a module is connected to, other than its own
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamReach {
    /// Teams of every module reachable through references
    pub reference_teams: BTreeSet<String>,
    /// Teams of the modules directly using this one
    pub usage_teams: BTreeSet<String>,
}

/// True when the two modules belong to different teams (an empty team counts
/// as a team of its own)
pub fn is_cross_team(from: &Module, to: &Module) -> bool {
    from.team != to.team
}

/// Team aggregates for a single module
pub fn team_reach(registry: &ModuleRegistry, id: ModuleId) -> TeamReach {
    let Some(module) = registry.module(id) else {
        return TeamReach::default();
    };
    let team_of = |other: ModuleId| registry.module(other).map(|m| m.team.clone());

    let mut reference_teams: BTreeSet<String> = registry
        .get_recursive_references(id)
        .into_iter()
        .filter_map(team_of)
        .collect();
    reference_teams.remove(&module.team);

    let mut usage_teams: BTreeSet<String> = registry.usages(id).filter_map(team_of).collect();
    usage_teams.remove(&module.team);

    TeamReach {
        reference_teams,
        usage_teams,
    }
}

/// Team aggregates for every module, keyed by module path
pub fn team_reach_all(registry: &ModuleRegistry) -> BTreeMap<String, TeamReach> {
    registry
        .iter()
        .map(|(id, module)| (module.path().to_string(), team_reach(registry, id)))
        .collect()
}

/// Write the registry as a GraphML file at `path`
pub fn write_graphml(registry: &ModuleRegistry, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    write_graphml_to(registry, &mut out)?;
    out.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the registry as a GraphML document to any writer
pub fn write_graphml_to<W: Write>(registry: &ModuleRegistry, out: W) -> Result<(), ExportError> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("graphml").with_attributes([("xmlns", GRAPHML_NAMESPACE)]),
    ))?;
    for (id, domain, name, kind) in KEYS {
        writer.write_event(Event::Empty(BytesStart::new("key").with_attributes([
            ("id", *id),
            ("for", *domain),
            ("attr.name", *name),
            ("attr.type", *kind),
        ])))?;
    }
    writer.write_event(Event::Start(
        BytesStart::new("graph").with_attributes([("id", "G"), ("edgedefault", "directed")]),
    ))?;

    for (id, module) in registry.iter() {
        writer.write_event(Event::Start(
            BytesStart::new("node").with_attributes([("id", module.path())]),
        ))?;
        write_data(&mut writer, "module_path", module.path())?;
        write_data(&mut writer, "module_name", &module.name)?;
        write_data(&mut writer, "module_type", module.output_type.as_str())?;
        write_data(&mut writer, "module_team", &module.team)?;
        writer.write_event(Event::End(BytesEnd::new("node")))?;

        let mut targets: Vec<&Module> = registry
            .references(id)
            .filter_map(|target| registry.module(target))
            .collect();
        targets.sort_by(|a, b| a.path().cmp(b.path()));

        for target in targets {
            let edge_id = format!("{}:{}", module.path(), target.path());
            writer.write_event(Event::Start(BytesStart::new("edge").with_attributes([
                ("id", edge_id.as_str()),
                ("source", module.path()),
                ("target", target.path()),
            ])))?;
            let cross_team = if is_cross_team(module, target) { "true" } else { "false" };
            write_data(&mut writer, "reference_crossteam", cross_team)?;
            writer.write_event(Event::End(BytesEnd::new("edge")))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("graph")))?;
    writer.write_event(Event::End(BytesEnd::new("graphml")))?;
    Ok(())
}

fn write_data<W: Write>(writer: &mut Writer<W>, key: &str, value: &str) -> Result<(), ExportError> {
    let data = BytesStart::new("data").with_attributes([("key", key)]);
    if value.is_empty() {
        writer.write_event(Event::Empty(data))?;
    } else {
        writer.write_event(Event::Start(data))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new("data")))?;
    }
    Ok(())
}
