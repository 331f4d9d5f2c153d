//! maestro: a phase dependency graph engine and execution state machine.
//!
//! The core pipeline: `plan` parses a phased plan document, `graph` validates
//! it into a DAG with parallel execution groups, `store` persists per-phase
//! status durably, `scheduler` answers readiness and gate queries, `lifecycle`
//! enforces the implement -> review -> merge/escalate state machine, and
//! `inject` extends the graph with synthetic fix phases after integration
//! build failures. Dispatching workers, running VCS commands, and judging
//! reviews are external collaborators; this crate only does the structural
//! dependency and status bookkeeping.

pub mod errors;
pub mod graph;
pub mod inject;
pub mod lifecycle;
pub mod phase;
pub mod plan;
pub mod scheduler;
pub mod store;
