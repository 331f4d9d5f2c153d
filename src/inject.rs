//! Synthetic phase injector.
//!
//! When a group merges cleanly but the integrated build fails, the graph is
//! extended at runtime with one synthetic fix phase depending on the whole
//! group. The fix enters at PENDING and follows the normal lifecycle; because
//! it is solo it merges directly on approval, and the store completes the
//! group members when it reaches DONE (`StatusStore::update_status`). If the
//! fix escalates instead, the members stay PR_APPROVED pending human
//! resolution.

use crate::errors::StoreError;
use crate::phase::Phase;
use crate::store::StatusStore;

/// Inject a synthetic fix phase for a failed group. Returns the new phase id.
pub fn inject_fix(store: &mut StatusStore, label: &str, reason: &str) -> Result<String, StoreError> {
    let members = store.group_members(label);
    if members.is_empty() {
        return Err(StoreError::UnknownGroup {
            group: label.to_string(),
        });
    }

    let member_ids: Vec<String> = members.iter().map(|m| m.id.clone()).collect();
    let level = members.iter().map(|m| m.level).max().unwrap_or(0) + 1;
    let declared_order = store
        .phases
        .values()
        .map(|p| p.declared_order + 1)
        .max()
        .unwrap_or(0);

    let id = store.next_synthetic_id(label);
    let name = format!("Integration fix for group {label}");
    let mut phase = Phase::new(&id, &name, member_ids, vec![], declared_order);
    phase.synthetic = true;
    phase.level = level;
    // Solo by construction: the fix completes via direct merge, not a gate.
    // Its working basis is the union of its dependencies' branches, so it
    // carries no file targets and no implicit edges are inferred for it.
    tracing::info!(fix = %id, group = %label, %reason, "synthetic fix phase injected");

    store.phases.insert(id.clone(), phase);
    Ok(id)
}
