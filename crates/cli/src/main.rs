use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use projgraph_core::config::DiscoveryConfig;
use projgraph_core::diagnostics::TracingSink;
use projgraph_core::{discovery, export, filter, overlay};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

const GRAPH_FILE: &str = "out.graphml";
const OVERLAY_FILE: &str = "extra_attrs.json";
const NEW_OVERLAY_FILE: &str = "extra_attrs_new.json";
const LOG_FILE: &str = "log.txt";

/// projgraph - Build-dependency graph of an MSBuild source tree
#[derive(Parser)]
#[command(name = "projgraph")]
#[command(version)] // Auto-pull version from Cargo.toml
#[command(
    about = "Discover project references under a directory and export them as GraphML",
    long_about = None
)]
struct Cli {
    /// Base directory to scan for project files
    base_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(Path::new(LOG_FILE))?;

    let result = run(&cli.base_dir);
    if let Err(err) = &result {
        tracing::error!("{:#}", err);
    }
    result
}

/// Console gets INFO and above, the log file everything down to DEBUG
fn init_logging(log_path: &Path) -> anyhow::Result<()> {
    let log_file = File::create(log_path)
        .with_context(|| format!("failed to create log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(LevelFilter::INFO))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .with_filter(LevelFilter::DEBUG),
        )
        .init();
    Ok(())
}

fn run(base_dir: &Path) -> anyhow::Result<()> {
    tracing::info!("Starting from {}", base_dir.display());

    let config = DiscoveryConfig::default();
    let mut sink = TracingSink;

    let mut registry = discovery::discover(base_dir, &config, &mut sink)
        .with_context(|| format!("failed to discover projects under {}", base_dir.display()))?;
    tracing::info!(
        "Discovered {} modules with {} references",
        registry.len(),
        registry.reference_count()
    );

    let removed = filter::apply(&mut registry, &config, &mut sink)?;
    tracing::info!(
        "Removed {} excluded and {} binary modules",
        removed.excluded,
        removed.external
    );

    let metadata = overlay::apply_file(
        &mut registry,
        Path::new(OVERLAY_FILE),
        Some(Path::new(NEW_OVERLAY_FILE)),
        &mut sink,
    )
    .context("failed to apply module metadata")?;
    if !metadata.unseen.is_empty() {
        tracing::info!(
            "Updating file {} ({} new modules)",
            NEW_OVERLAY_FILE,
            metadata.unseen.len()
        );
    }

    for (path, reach) in export::team_reach_all(&registry) {
        tracing::debug!(
            "{}: references teams {:?}, used by teams {:?}",
            path,
            reach.reference_teams,
            reach.usage_teams
        );
    }

    tracing::info!("Writing {}", GRAPH_FILE);
    export::write_graphml(&registry, Path::new(GRAPH_FILE))
        .with_context(|| format!("failed to write {}", GRAPH_FILE))?;

    Ok(())
}
