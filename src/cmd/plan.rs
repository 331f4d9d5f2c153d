//! Plan parsing and store initialization.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use maestro::graph::GraphBuilder;
use maestro::plan::parse_plan;
use maestro::store::{StatusStore, StoreFile, plan_hash};

/// Parse a plan document, validate its dependency graph, and initialize (or
/// reconcile) the status store.
pub fn cmd_parse(project_dir: &Path, plan_path: &Path, base: &str) -> Result<()> {
    let text = fs::read_to_string(plan_path)
        .with_context(|| format!("Failed to read plan file: {}", plan_path.display()))?;

    let phases = parse_plan(&text)?;
    let graph = GraphBuilder::new(phases).build()?;
    let hash = plan_hash(&text);

    let store_file = StoreFile::for_plan(project_dir, plan_path);
    let _lock = store_file.lock()?;

    let resumed = store_file.exists();
    let mut store = if resumed {
        let mut existing = store_file.load()?;
        existing.reconcile(graph.into_phases(), &hash)?;
        existing
    } else {
        let stem = plan_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("plan");
        StatusStore::new(stem, &hash, base, graph.into_phases())
    };
    store_file.save(&mut store)?;

    println!();
    if resumed {
        println!(
            "Reconciled plan '{}' ({} phases, store revision {})",
            store.plan,
            store.phases.len(),
            store.revision
        );
    } else {
        println!(
            "Initialized plan '{}' ({} phases, base point {})",
            store.plan,
            store.phases.len(),
            store.base_point
        );
    }

    let labels = store.group_labels();
    for label in &labels {
        let members: Vec<&str> = store
            .group_members(label)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        println!("  Group {}: {} (parallel)", label, members.join(", "));
    }
    let mut solos: Vec<&str> = store
        .phases
        .values()
        .filter(|p| p.is_solo())
        .map(|p| p.id.as_str())
        .collect();
    solos.sort_unstable();
    if !solos.is_empty() {
        println!("  Solo: {}", solos.join(", "));
    }
    println!();
    println!("State: {}", store_file.path().display());
    println!();

    Ok(())
}
