//! Readiness queries, status transitions, and the phase table.

use anyhow::{Result, bail};
use console::style;
use std::path::Path;

use maestro::lifecycle::{Applied, PhaseStatus};
use maestro::scheduler;

use super::resolve_store;

/// Print the deterministic ready set and any integration-ready groups.
pub fn cmd_next(project_dir: &Path, plan: Option<&Path>) -> Result<()> {
    let store_file = resolve_store(project_dir, plan)?;
    let store = store_file.load()?;

    let ready = scheduler::ready(&store);
    println!();
    if ready.is_empty() {
        println!("No phases are ready.");
    } else {
        println!("Ready phases:");
        for phase in &ready {
            println!(
                "  {:<8} level {}  {}",
                phase.id,
                phase.level,
                phase.name
            );
        }
    }

    for label in scheduler::ready_groups(&store) {
        println!("Group {label} is ready for integration.");
    }

    let blocked = scheduler::blocked(&store);
    if !blocked.is_empty() {
        let ids: Vec<&str> = blocked.iter().map(|p| p.id.as_str()).collect();
        println!(
            "{} blocked by escalation: {}",
            style("Warning:").red(),
            ids.join(", ")
        );
    }
    println!();
    Ok(())
}

/// Report the integration gate for one group.
pub fn cmd_check_group(project_dir: &Path, plan: Option<&Path>, group: &str) -> Result<()> {
    let store_file = resolve_store(project_dir, plan)?;
    let store = store_file.load()?;

    let ready = scheduler::group_ready(&store, group)?;
    println!();
    println!("Group {group}:");
    for member in store.group_members(group) {
        println!("  {:<8} {}", member.id, styled_status(member.status));
    }
    if ready {
        println!("Group {group} is ready for integration.");
    } else {
        println!("Group {group} is not ready.");
    }
    println!();
    Ok(())
}

/// Request one status transition for one phase.
pub fn cmd_update(
    project_dir: &Path,
    plan: Option<&Path>,
    id: &str,
    status: &str,
    review_ref: Option<&str>,
) -> Result<()> {
    let Some(target) = PhaseStatus::parse(status) else {
        bail!(
            "Unknown status '{status}'. Expected one of: pending, dispatched, developing, \
             for_review, merged, pr_approved, rejected, fixing, escalated, done"
        );
    };

    let store_file = resolve_store(project_dir, plan)?;
    let _lock = store_file.lock()?;
    let mut store = store_file.load()?;

    let from = store.get(id)?.status;
    let applied = store.update_status(id, target, review_ref)?;
    store_file.save(&mut store)?;

    let now = store.get(id)?.status;
    match applied {
        Applied::NoOp => println!("Phase {id} already {now}."),
        Applied::Changed => println!("Phase {id}: {from} -> {now}"),
    }
    Ok(())
}

/// Force a phase to ESCALATED (the cancellation primitive).
pub fn cmd_escalate(project_dir: &Path, plan: Option<&Path>, id: &str) -> Result<()> {
    let store_file = resolve_store(project_dir, plan)?;
    let _lock = store_file.lock()?;
    let mut store = store_file.load()?;

    store.escalate(id)?;
    store_file.save(&mut store)?;

    println!("Phase {id} escalated. Its dependents are blocked until a human resolves it.");
    Ok(())
}

/// Print the full phase table.
pub fn cmd_status(project_dir: &Path, plan: Option<&Path>) -> Result<()> {
    let store_file = resolve_store(project_dir, plan)?;
    let store = store_file.load()?;

    println!();
    println!(
        "Plan '{}'  base {}  revision {}",
        store.plan, store.base_point, store.revision
    );
    println!();
    println!(
        "{:<10} {:<12} {:<6} {:<6} {:<9} {:<10} Name",
        "Phase", "Status", "Group", "Level", "Attempts", "Reviews"
    );

    let mut phases: Vec<_> = store.phases.values().collect();
    phases.sort_by_key(|p| (p.level, p.declared_order));
    for phase in phases {
        println!(
            "{:<10} {:<12} {:<6} {:<6} {:<9} {:<10} {}",
            phase.id,
            styled_status(phase.status),
            phase.group.as_deref().unwrap_or("-"),
            phase.level,
            phase.attempts,
            if phase.review_refs.is_empty() {
                "-".to_string()
            } else {
                phase.review_refs.join(",")
            },
            phase.name,
        );
    }

    let done = store
        .phases
        .values()
        .filter(|p| p.status == PhaseStatus::Done)
        .count();
    println!();
    println!("{done}/{} phases done", store.phases.len());
    println!();
    Ok(())
}

fn styled_status(status: PhaseStatus) -> String {
    let text = status.to_string();
    match status {
        PhaseStatus::Done => style(text).green().to_string(),
        PhaseStatus::Escalated => style(text).red().to_string(),
        PhaseStatus::Rejected => style(text).yellow().to_string(),
        PhaseStatus::Pending => style(text).dim().to_string(),
        _ => text,
    }
}
