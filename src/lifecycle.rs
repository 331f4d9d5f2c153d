//! Phase lifecycle state machine.
//!
//! Every phase moves through a fixed implement -> review -> merge/escalate
//! lifecycle. The transition table is closed: a requested transition outside
//! the table is rejected with `InvalidTransition` and the phase is left
//! untouched. Statuses arriving from the outside (CLI arguments, store
//! documents) are parsed against the known set and rejected otherwise.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::phase::Phase;

/// Maximum review attempts before a rejected phase must escalate.
/// The original attempt counts as attempt 1.
pub const MAX_RETRY: u32 = 3;

/// Status of a phase in the execution lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Waiting for its dependencies to finish
    #[default]
    Pending,
    /// Handed to an implementor worker, not yet started
    Dispatched,
    /// Worker reported that implementation is underway
    Developing,
    /// A reviewable artifact exists, awaiting a verdict
    ForReview,
    /// Review approved, solo phase merged directly
    Merged,
    /// Review approved, parallel phase waiting at the integration gate
    PrApproved,
    /// Review rejected, a fix round is owed
    Rejected,
    /// Worker is addressing review findings
    Fixing,
    /// Permanently failed, human intervention required
    Escalated,
    /// Terminally complete
    Done,
}

impl PhaseStatus {
    /// Check if the status is terminal (never left automatically).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Escalated)
    }

    /// Check if the phase's work has landed on the integration point.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Done | Self::Merged)
    }

    /// Parse a status token from the command boundary.
    ///
    /// Only the known snake_case set is accepted; anything else is rejected.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "pending" => Some(Self::Pending),
            "dispatched" => Some(Self::Dispatched),
            "developing" => Some(Self::Developing),
            "for_review" => Some(Self::ForReview),
            "merged" => Some(Self::Merged),
            "pr_approved" => Some(Self::PrApproved),
            "rejected" => Some(Self::Rejected),
            "fixing" => Some(Self::Fixing),
            "escalated" => Some(Self::Escalated),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::Developing => "developing",
            Self::ForReview => "for_review",
            Self::Merged => "merged",
            Self::PrApproved => "pr_approved",
            Self::Rejected => "rejected",
            Self::Fixing => "fixing",
            Self::Escalated => "escalated",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a legal transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The phase status changed (possibly auto-advancing past the target).
    Changed,
    /// Idempotent request, nothing changed.
    NoOp,
}

/// Apply a requested transition to a phase.
///
/// `deps_done` must reflect whether every dependency of the phase is DONE;
/// it gates PENDING -> DISPATCHED. Guards from the transition table:
///
/// - DISPATCHED is idempotent (re-dispatching a dispatched phase is a no-op)
/// - FOR_REVIEW -> MERGED only for solo phases, which auto-advance to DONE
/// - FOR_REVIEW -> PR_APPROVED only for grouped phases
/// - FOR_REVIEW -> REJECTED increments `attempts`
/// - REJECTED -> FIXING only while `attempts < MAX_RETRY`
/// - REJECTED -> ESCALATED only once `attempts >= MAX_RETRY`
/// - PR_APPROVED -> DONE never passes here: that is the integration gate's
///   job (`scheduler::integrate`) or synthetic propagation
///
/// Anything else fails with `InvalidTransition` and leaves the phase as-is.
pub fn apply(phase: &mut Phase, target: PhaseStatus, deps_done: bool) -> Result<Applied, StoreError> {
    use PhaseStatus::*;

    match (phase.status, target) {
        (Pending, Dispatched) => {
            if !deps_done {
                return Err(StoreError::NotReady {
                    id: phase.id.clone(),
                    waiting_on: phase.depends_on.clone(),
                });
            }
            phase.status = Dispatched;
            Ok(Applied::Changed)
        }
        (Dispatched, Dispatched) => Ok(Applied::NoOp),
        (Dispatched, Developing) => {
            phase.status = Developing;
            Ok(Applied::Changed)
        }
        (Developing, ForReview) | (Fixing, ForReview) => {
            phase.status = ForReview;
            Ok(Applied::Changed)
        }
        (ForReview, Merged) if phase.is_solo() => {
            // Solo approval merges directly; MERGED -> DONE is automatic.
            phase.status = Done;
            Ok(Applied::Changed)
        }
        (ForReview, PrApproved) if !phase.is_solo() => {
            phase.status = PrApproved;
            Ok(Applied::Changed)
        }
        (ForReview, Rejected) => {
            phase.attempts += 1;
            phase.status = Rejected;
            Ok(Applied::Changed)
        }
        (Rejected, Fixing) => {
            if phase.attempts >= MAX_RETRY {
                return Err(StoreError::RetriesExhausted {
                    id: phase.id.clone(),
                    attempts: phase.attempts,
                });
            }
            phase.status = Fixing;
            Ok(Applied::Changed)
        }
        (Rejected, Escalated) => {
            if phase.attempts < MAX_RETRY {
                return Err(StoreError::EscalationNotDue {
                    id: phase.id.clone(),
                    attempts: phase.attempts,
                });
            }
            phase.status = Escalated;
            Ok(Applied::Changed)
        }
        (from, to) => Err(StoreError::InvalidTransition {
            id: phase.id.clone(),
            from,
            to,
        }),
    }
}

/// Force a phase to ESCALATED from any non-terminal state.
///
/// This is the sole cancellation primitive: a phase is never deleted, only
/// abandoned by escalation, which permanently blocks its dependents.
pub fn force_escalate(phase: &mut Phase) -> Result<(), StoreError> {
    if phase.status.is_terminal() {
        return Err(StoreError::InvalidTransition {
            id: phase.id.clone(),
            from: phase.status,
            to: PhaseStatus::Escalated,
        });
    }
    phase.status = PhaseStatus::Escalated;
    Ok(())
}
