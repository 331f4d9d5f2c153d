//! Typed error hierarchy for the maestro orchestrator.
//!
//! Three top-level enums cover the three subsystems:
//! - `PlanError` — plan parsing failures (fatal, nothing is committed)
//! - `GraphError` — dependency graph validation failures (fatal, blocks scheduling)
//! - `StoreError` — status store and lifecycle failures (transition errors abort
//!   only the single requested mutation)

use thiserror::Error;

use crate::lifecycle::PhaseStatus;

/// Errors from parsing a plan document.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Phase {id} is malformed: missing or empty {section} section")]
    MalformedPhase { id: String, section: &'static str },

    #[error("Duplicate phase id: {id}")]
    DuplicatePhaseId { id: String },

    #[error("No phase blocks found in plan document")]
    EmptyPlan,
}

/// Errors from building or validating the dependency graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Phase {phase} depends on unknown phase {dependency}")]
    UnknownDependency { phase: String, dependency: String },

    #[error("Cycle detected in phase dependencies: {}", members.join(" -> "))]
    Cycle { members: Vec<String> },
}

/// Errors from the status store and the lifecycle state machine.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Plan drift: completed phase {id} is absent from the re-parsed plan")]
    PlanDrift { id: String },

    #[error("Invalid transition for phase {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: PhaseStatus,
        to: PhaseStatus,
    },

    #[error("Phase {id} cannot be dispatched, waiting on: {}", waiting_on.join(", "))]
    NotReady { id: String, waiting_on: Vec<String> },

    #[error("Phase {id} has exhausted its retry budget after {attempts} attempts")]
    RetriesExhausted { id: String, attempts: u32 },

    #[error("Phase {id} has only {attempts} attempts, escalation is not due")]
    EscalationNotDue { id: String, attempts: u32 },

    #[error("No phase with id {id} in the status store")]
    NotFound { id: String },

    #[error("No group labelled {group} in the status store")]
    UnknownGroup { group: String },

    #[error("Group {group} is not ready for integration, waiting on: {}", waiting_on.join(", "))]
    GroupNotReady {
        group: String,
        waiting_on: Vec<String>,
    },

    #[error("Status store at {path} is corrupt: {source}")]
    Corrupt {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
