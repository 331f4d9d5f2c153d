//! Phase definition for the maestro orchestrator.
//!
//! A `Phase` is one unit of planned work: declared scope, explicit
//! dependencies, file targets, and the bookkeeping fields the scheduler and
//! state machine maintain (status, group label, attempts, review refs).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::lifecycle::PhaseStatus;

/// Id prefix for synthetic (injected) fix phases.
pub const SYNTHETIC_PREFIX: &str = "I-";

/// Represents a single implementation phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    /// Unique phase id (ordinal or string; synthetic ids start with "I-")
    pub id: String,
    /// Human-readable name, immutable after creation
    pub name: String,
    /// Branch derived from id + name at creation, immutable afterwards
    pub branch_name: String,
    /// Explicit dependencies declared by the plan author
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// File paths this phase intends to create or modify
    #[serde(default)]
    pub file_targets: Vec<String>,
    /// Current lifecycle status
    #[serde(default)]
    pub status: PhaseStatus,
    /// Execution group label; None means solo
    #[serde(default)]
    pub group: Option<String>,
    /// Topological depth in the dependency graph
    #[serde(default)]
    pub level: u32,
    /// Review attempts consumed (original attempt counts as 1)
    #[serde(default)]
    pub attempts: u32,
    /// Review-artifact identifiers, append-only
    #[serde(default)]
    pub review_refs: Vec<String>,
    /// True only for injected fix phases
    #[serde(default)]
    pub synthetic: bool,
    /// Position in the plan document, drives deterministic tie-breaks
    #[serde(default)]
    pub declared_order: usize,
}

impl Phase {
    /// Create a new phase in PENDING with a derived branch name.
    pub fn new(
        id: &str,
        name: &str,
        depends_on: Vec<String>,
        file_targets: Vec<String>,
        declared_order: usize,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            branch_name: derive_branch_name(id, name),
            depends_on,
            file_targets,
            status: PhaseStatus::default(),
            group: None,
            level: 0,
            attempts: 0,
            review_refs: Vec::new(),
            synthetic: false,
            declared_order,
        }
    }

    /// Check if the phase completes independently of a group gate.
    pub fn is_solo(&self) -> bool {
        self.group.is_none()
    }

    /// Check whether this phase declares any of the given file targets.
    pub fn targets_overlap(&self, other: &Phase) -> bool {
        self.file_targets
            .iter()
            .any(|f| other.file_targets.iter().any(|g| g == f))
    }
}

/// Derive a branch name from a phase id and name, e.g. "phase-3-status-store".
pub fn derive_branch_name(id: &str, name: &str) -> String {
    let mut slug = String::new();
    let mut dash_pending = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if dash_pending && !slug.is_empty() {
                slug.push('-');
            }
            dash_pending = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            dash_pending = true;
        }
    }
    if slug.is_empty() {
        format!("phase-{}", id.to_lowercase())
    } else {
        format!("phase-{}-{}", id.to_lowercase(), slug)
    }
}

/// Numeric-aware id ordering: "2" sorts before "10", non-numeric ids sort
/// lexicographically after numeric ones.
pub fn cmp_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_new_defaults() {
        let p = Phase::new("1", "Status store", vec!["0".into()], vec!["src/store.rs".into()], 0);
        assert_eq!(p.id, "1");
        assert_eq!(p.status, PhaseStatus::Pending);
        assert_eq!(p.branch_name, "phase-1-status-store");
        assert!(p.group.is_none());
        assert!(p.is_solo());
        assert_eq!(p.attempts, 0);
        assert!(!p.synthetic);
        assert!(p.review_refs.is_empty());
    }

    #[test]
    fn test_derive_branch_name_slugs_punctuation() {
        assert_eq!(
            derive_branch_name("2", "Auth: register & login"),
            "phase-2-auth-register-login"
        );
        assert_eq!(derive_branch_name("I-A", "!!!"), "phase-i-a");
    }

    #[test]
    fn test_targets_overlap() {
        let a = Phase::new("1", "A", vec![], vec!["src/a.rs".into(), "src/c.rs".into()], 0);
        let b = Phase::new("2", "B", vec![], vec!["src/c.rs".into()], 1);
        let c = Phase::new("3", "C", vec![], vec!["src/d.rs".into()], 2);
        assert!(a.targets_overlap(&b));
        assert!(b.targets_overlap(&a));
        assert!(!a.targets_overlap(&c));
    }

    #[test]
    fn test_cmp_ids_numeric_aware() {
        assert_eq!(cmp_ids("2", "10"), Ordering::Less);
        assert_eq!(cmp_ids("10", "10"), Ordering::Equal);
        assert_eq!(cmp_ids("2", "I-A"), Ordering::Less);
        assert_eq!(cmp_ids("I-A", "I-B"), Ordering::Less);
    }

    #[test]
    fn test_phase_serde_round_trip() {
        let mut p = Phase::new("1", "Parser", vec![], vec!["src/plan.rs".into()], 0);
        p.status = PhaseStatus::ForReview;
        p.group = Some("A".into());
        p.review_refs.push("42".into());

        let json = serde_json::to_string(&p).unwrap();
        let back: Phase = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn test_phase_deserialization_with_defaults() {
        let json = r#"{"id": "1", "name": "Parser", "branch_name": "phase-1-parser"}"#;
        let p: Phase = serde_json::from_str(json).unwrap();
        assert_eq!(p.status, PhaseStatus::Pending);
        assert!(p.depends_on.is_empty());
        assert!(p.group.is_none());
        assert_eq!(p.attempts, 0);
    }
}
