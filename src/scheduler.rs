//! Readiness engine and integration gate.
//!
//! The scheduler is a set of pure queries over the status store plus the
//! integration gate that moves whole groups past PR_APPROVED. It performs no
//! dispatch itself: callers emit the ready set to external workers and feed
//! status transitions back through the store.

use crate::errors::StoreError;
use crate::inject;
use crate::lifecycle::PhaseStatus;
use crate::phase::{Phase, cmp_ids};
use crate::store::StatusStore;

/// Phases eligible to start now: PENDING with every dependency DONE.
/// Deterministic order: ascending level, then ascending id.
pub fn ready(store: &StatusStore) -> Vec<&Phase> {
    let mut eligible: Vec<&Phase> = store
        .phases
        .values()
        .filter(|p| p.status == PhaseStatus::Pending && store.deps_done(p))
        .collect();
    eligible.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| cmp_ids(&a.id, &b.id)));
    eligible
}

/// The integration gate: true iff every non-escalated member of the group is
/// PR_APPROVED (and at least one member is). Solo phases never participate.
pub fn group_ready(store: &StatusStore, label: &str) -> Result<bool, StoreError> {
    let members = store.group_members(label);
    if members.is_empty() {
        return Err(StoreError::UnknownGroup {
            group: label.to_string(),
        });
    }
    let mut any_approved = false;
    for member in &members {
        match member.status {
            PhaseStatus::PrApproved => any_approved = true,
            PhaseStatus::Escalated => {}
            _ => return Ok(false),
        }
    }
    Ok(any_approved)
}

/// Groups whose gate currently holds.
pub fn ready_groups(store: &StatusStore) -> Vec<String> {
    store
        .group_labels()
        .into_iter()
        .filter(|label| group_ready(store, label).unwrap_or(false))
        .collect()
}

/// PENDING phases that can never become ready because an ESCALATED phase sits
/// in their dependency closure.
pub fn blocked(store: &StatusStore) -> Vec<&Phase> {
    let mut result: Vec<&Phase> = store
        .phases
        .values()
        .filter(|p| {
            p.status == PhaseStatus::Pending
                && store.dependency_closure(&p.id).iter().any(|dep| {
                    store
                        .phases
                        .get(dep)
                        .is_some_and(|d| d.status == PhaseStatus::Escalated)
                })
        })
        .collect();
    result.sort_by(|a, b| cmp_ids(&a.id, &b.id));
    result
}

/// Reported outcome of the external merge + verification step for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationOutcome {
    /// Clean merge, verification passed
    Merged,
    /// Clean merge, but the build/verification failed
    BuildFailed,
    /// Merge conflict: fatal, requires human resolution
    Conflict,
}

/// Result of running the integration gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationResult {
    /// All members completed; their ids in order
    Completed(Vec<String>),
    /// A synthetic fix phase was injected; its id
    FixInjected(String),
    /// Merge conflict: no state change, members stay PR_APPROVED until a
    /// human resolves it
    ConflictUnresolved,
}

/// Run the integration gate for a group.
///
/// The gate must hold before any outcome is applied: partial integration is
/// never permitted. A clean, verified merge completes every member; a build
/// failure injects a synthetic fix phase depending on the whole group; a
/// conflict changes nothing.
pub fn integrate(
    store: &mut StatusStore,
    label: &str,
    outcome: IntegrationOutcome,
    reason: &str,
) -> Result<IntegrationResult, StoreError> {
    if !group_ready(store, label)? {
        let waiting_on = store
            .group_members(label)
            .iter()
            .filter(|m| {
                !matches!(m.status, PhaseStatus::PrApproved | PhaseStatus::Escalated)
            })
            .map(|m| m.id.clone())
            .collect();
        return Err(StoreError::GroupNotReady {
            group: label.to_string(),
            waiting_on,
        });
    }

    match outcome {
        IntegrationOutcome::Merged => {
            let member_ids: Vec<String> = store
                .group_members(label)
                .iter()
                .filter(|m| m.status == PhaseStatus::PrApproved)
                .map(|m| m.id.clone())
                .collect();
            for id in &member_ids {
                if let Some(phase) = store.phases.get_mut(id) {
                    phase.status = PhaseStatus::Done;
                }
            }
            tracing::info!(group = %label, "group integrated, members done");
            Ok(IntegrationResult::Completed(member_ids))
        }
        IntegrationOutcome::BuildFailed => {
            let fix_id = inject::inject_fix(store, label, reason)?;
            tracing::warn!(group = %label, fix = %fix_id, "integration build failed, fix injected");
            Ok(IntegrationResult::FixInjected(fix_id))
        }
        IntegrationOutcome::Conflict => {
            tracing::error!(group = %label, "merge conflict, human resolution required");
            Ok(IntegrationResult::ConflictUnresolved)
        }
    }
}
