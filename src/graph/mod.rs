//! Dependency graph engine for parallel phase execution.
//!
//! This module turns parsed phase records into a validated directed acyclic
//! graph (DAG): explicit dependency edges are unioned with implicit edges
//! inferred from file-target overlap, cycles are rejected with the full cycle
//! path, and every phase gets a level (topological depth) and a group label.
//! Phases sharing a level with no edges among themselves form an execution
//! group and can run in parallel; single-phase levels are solo.
//!
//! ## Example
//!
//! ```
//! use maestro::graph::GraphBuilder;
//! use maestro::phase::Phase;
//!
//! let phases = vec![
//!     Phase::new("1", "Setup", vec![], vec![], 0),
//!     Phase::new("2", "Core", vec!["1".to_string()], vec![], 1),
//!     Phase::new("3", "Tests", vec!["1".to_string()], vec![], 2),
//! ];
//!
//! let graph = GraphBuilder::new(phases).build().unwrap();
//! // Phases 2 and 3 share level 1 with no edge between them: group A.
//! assert_eq!(graph.get_phase_by_id("2").unwrap().group.as_deref(), Some("A"));
//! assert_eq!(graph.get_phase_by_id("3").unwrap().group.as_deref(), Some("A"));
//! assert!(graph.get_phase_by_id("1").unwrap().group.is_none());
//! ```

mod builder;

pub use builder::{GraphBuilder, PhaseGraph, PhaseIndex};
