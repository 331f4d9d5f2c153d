//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module      | Commands handled                          |
//! |-------------|-------------------------------------------|
//! | `plan`      | `Parse`                                   |
//! | `phase`     | `Next`, `CheckGroup`, `Update`, `Escalate`, `Status` |
//! | `integrate` | `Integrate`, `AddPhase`                   |

pub mod integrate;
pub mod phase;
pub mod plan;

pub use integrate::{cmd_add_phase, cmd_integrate};
pub use phase::{cmd_check_group, cmd_escalate, cmd_next, cmd_status, cmd_update};
pub use plan::cmd_parse;

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use maestro::store::StoreFile;

/// Resolve the store document for this invocation. With an explicit plan path
/// the store is addressed by the plan's identity; otherwise there must be
/// exactly one initialized plan under `.maestro/`.
pub fn resolve_store(project_dir: &Path, plan: Option<&Path>) -> Result<StoreFile> {
    if let Some(plan_path) = plan {
        return Ok(StoreFile::for_plan(project_dir, plan_path));
    }

    let state_dir = project_dir.join(".maestro");
    let mut candidates: Vec<PathBuf> = Vec::new();
    if state_dir.is_dir() {
        for entry in std::fs::read_dir(&state_dir)
            .with_context(|| format!("Failed to read {}", state_dir.display()))?
        {
            let path = entry?.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".state.json"))
            {
                candidates.push(path);
            }
        }
    }

    match candidates.len() {
        0 => bail!("No plan has been parsed yet. Run 'maestro parse <plan.md>' first."),
        1 => {
            let stem = candidates[0]
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".state.json"))
                .unwrap_or("plan");
            // Re-derive through the same addressing as `parse`.
            Ok(StoreFile::for_plan(project_dir, Path::new(&format!("{stem}.md"))))
        }
        _ => bail!("Multiple plans are initialized; pass --plan to pick one."),
    }
}
