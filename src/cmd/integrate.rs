//! Group integration and synthetic fix injection.

use anyhow::{Result, bail};
use console::style;
use std::path::Path;

use maestro::inject::inject_fix;
use maestro::scheduler::{IntegrationOutcome, IntegrationResult, integrate};

use super::resolve_store;

/// Apply the reported outcome of the external merge + verification step.
pub fn cmd_integrate(
    project_dir: &Path,
    plan: Option<&Path>,
    group: &str,
    outcome: &str,
    reason: Option<&str>,
) -> Result<()> {
    let outcome = match outcome {
        "merged" => IntegrationOutcome::Merged,
        "build-failed" => IntegrationOutcome::BuildFailed,
        "conflict" => IntegrationOutcome::Conflict,
        other => bail!("Unknown outcome '{other}'. Expected: merged, build-failed, conflict"),
    };
    if outcome == IntegrationOutcome::BuildFailed && reason.is_none() {
        bail!("A build-failed outcome requires --reason describing the failure.");
    }

    let store_file = resolve_store(project_dir, plan)?;
    let _lock = store_file.lock()?;
    let mut store = store_file.load()?;

    let result = integrate(&mut store, group, outcome, reason.unwrap_or(""))?;
    store_file.save(&mut store)?;

    match result {
        IntegrationResult::Completed(ids) => {
            println!(
                "{} Group {group} integrated. Done: {}",
                style("✓").green(),
                ids.join(", ")
            );
        }
        IntegrationResult::FixInjected(id) => {
            println!(
                "{} Build failed after merge. Injected fix phase {id}; run 'maestro next' to dispatch it.",
                style("!").yellow()
            );
        }
        IntegrationResult::ConflictUnresolved => {
            println!(
                "{} Merge conflict in group {group}. No state changed; resolve manually, then re-run.",
                style("✗").red()
            );
        }
    }
    Ok(())
}

/// Manually inject a synthetic fix phase for a group.
pub fn cmd_add_phase(
    project_dir: &Path,
    plan: Option<&Path>,
    group: &str,
    reason: &str,
) -> Result<()> {
    let store_file = resolve_store(project_dir, plan)?;
    let _lock = store_file.lock()?;
    let mut store = store_file.load()?;

    let id = inject_fix(&mut store, group, reason)?;
    store_file.save(&mut store)?;

    let fix = store.get(&id)?;
    println!(
        "Injected {id} (level {}, depends on {}): {reason}",
        fix.level,
        fix.depends_on.join(", ")
    );
    Ok(())
}
