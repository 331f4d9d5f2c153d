//! DAG builder for constructing dependency graphs from parsed phases.
//!
//! The builder unions explicit edges (declared with `Depends on:`) with
//! implicit edges inferred from file-target overlap, validates acyclicity,
//! and assigns each phase a level and a group label.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::errors::GraphError;
use crate::phase::Phase;

/// Index into the phase list.
pub type PhaseIndex = usize;

/// A validated directed acyclic graph of phases.
#[derive(Debug)]
pub struct PhaseGraph {
    /// Phases in declaration order, with level and group assigned
    phases: Vec<Phase>,
    /// Map from phase id to index
    index_map: HashMap<String, PhaseIndex>,
    /// Forward edges: index -> phases that depend on it
    forward_edges: Vec<Vec<PhaseIndex>>,
    /// Reverse edges: index -> phases it depends on (explicit + implicit)
    reverse_edges: Vec<Vec<PhaseIndex>>,
    /// Implicit edges inferred from file-target overlap, as (from, to)
    implicit_edges: Vec<(PhaseIndex, PhaseIndex)>,
}

impl PhaseGraph {
    /// Get the number of phases in the graph.
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Get a phase by its index.
    pub fn get_phase(&self, index: PhaseIndex) -> Option<&Phase> {
        self.phases.get(index)
    }

    /// Get a phase by its id.
    pub fn get_phase_by_id(&self, id: &str) -> Option<&Phase> {
        self.index_map.get(id).and_then(|&i| self.phases.get(i))
    }

    /// Get the index for a phase id.
    pub fn get_index(&self, id: &str) -> Option<PhaseIndex> {
        self.index_map.get(id).copied()
    }

    /// Get all phases in declaration order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Consume the graph, yielding the phases with levels and groups assigned.
    pub fn into_phases(self) -> Vec<Phase> {
        self.phases
    }

    /// Get phases that depend on the given phase.
    pub fn dependents(&self, index: PhaseIndex) -> &[PhaseIndex] {
        self.forward_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Get the full dependency set of a phase, explicit and implicit.
    pub fn dependencies(&self, index: PhaseIndex) -> &[PhaseIndex] {
        self.reverse_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Edges inferred from file-target overlap.
    pub fn implicit_edges(&self) -> &[(PhaseIndex, PhaseIndex)] {
        &self.implicit_edges
    }
}

/// Builder for validated phase graphs.
pub struct GraphBuilder {
    phases: Vec<Phase>,
}

impl GraphBuilder {
    /// Create a new builder. Phases must be in declaration order with unique
    /// ids (the plan parser guarantees both).
    pub fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    /// Build the graph: union edges, detect cycles, assign levels and groups.
    pub fn build(mut self) -> Result<PhaseGraph, GraphError> {
        let n = self.phases.len();
        let mut index_map = HashMap::with_capacity(n);
        for (i, phase) in self.phases.iter().enumerate() {
            index_map.insert(phase.id.clone(), i);
        }

        let mut forward_edges: Vec<Vec<PhaseIndex>> = vec![Vec::new(); n];
        let mut reverse_edges: Vec<Vec<PhaseIndex>> = vec![Vec::new(); n];
        let mut explicit_pairs: HashSet<(PhaseIndex, PhaseIndex)> = HashSet::new();

        for (to_idx, phase) in self.phases.iter().enumerate() {
            for dep in &phase.depends_on {
                let from_idx = *index_map.get(dep).ok_or_else(|| GraphError::UnknownDependency {
                    phase: phase.id.clone(),
                    dependency: dep.clone(),
                })?;
                forward_edges[from_idx].push(to_idx);
                reverse_edges[to_idx].push(from_idx);
                explicit_pairs.insert((from_idx, to_idx));
            }
        }

        // Implicit edges: two phases touching the same files with no declared
        // order get an edge from the earlier-declared phase to the later one,
        // so repeated parses of an unchanged plan yield the same graph. The
        // edge is folded into the later phase's `depends_on` so it survives
        // into the persisted store and gates readiness like any other
        // dependency.
        let mut implicit_edges = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if !self.phases[i].targets_overlap(&self.phases[j]) {
                    continue;
                }
                if explicit_pairs.contains(&(i, j)) || explicit_pairs.contains(&(j, i)) {
                    continue;
                }
                forward_edges[i].push(j);
                reverse_edges[j].push(i);
                implicit_edges.push((i, j));
                tracing::debug!(
                    from = %self.phases[i].id,
                    to = %self.phases[j].id,
                    "inferred implicit dependency from file-target overlap"
                );
                let dep_id = self.phases[i].id.clone();
                self.phases[j].depends_on.push(dep_id);
            }
        }

        if let Some(cycle) = find_cycle(&forward_edges) {
            let members = cycle
                .into_iter()
                .filter_map(|i| self.phases.get(i).map(|p| p.id.clone()))
                .collect();
            return Err(GraphError::Cycle { members });
        }

        // Level = 0 with no dependencies, else 1 + max(dependency levels).
        let mut memo = vec![None; n];
        for i in 0..n {
            let level = compute_level(i, &reverse_edges, &mut memo);
            self.phases[i].level = level;
        }

        assign_groups(&mut self.phases);

        Ok(PhaseGraph {
            phases: self.phases,
            index_map,
            forward_edges,
            reverse_edges,
            implicit_edges,
        })
    }
}

/// Depth-first cycle search tracking recursion-stack membership. Returns the
/// stack segment forming the cycle, if any.
fn find_cycle(edges: &[Vec<PhaseIndex>]) -> Option<Vec<PhaseIndex>> {
    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;

    fn visit(
        v: PhaseIndex,
        edges: &[Vec<PhaseIndex>],
        state: &mut [u8],
        stack: &mut Vec<PhaseIndex>,
    ) -> Option<Vec<PhaseIndex>> {
        state[v] = GRAY;
        stack.push(v);
        for &w in &edges[v] {
            match state[w] {
                WHITE => {
                    if let Some(cycle) = visit(w, edges, state, stack) {
                        return Some(cycle);
                    }
                }
                GRAY => {
                    // Back-edge into the current stack.
                    let pos = stack.iter().position(|&x| x == w).unwrap_or(0);
                    return Some(stack[pos..].to_vec());
                }
                _ => {}
            }
        }
        stack.pop();
        state[v] = BLACK;
        None
    }

    let mut state = vec![WHITE; edges.len()];
    let mut stack = Vec::new();
    for v in 0..edges.len() {
        if state[v] == WHITE {
            if let Some(cycle) = visit(v, edges, &mut state, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

fn compute_level(
    v: PhaseIndex,
    reverse_edges: &[Vec<PhaseIndex>],
    memo: &mut Vec<Option<u32>>,
) -> u32 {
    if let Some(level) = memo[v] {
        return level;
    }
    let level = reverse_edges[v]
        .iter()
        .map(|&dep| compute_level(dep, reverse_edges, memo) + 1)
        .max()
        .unwrap_or(0);
    memo[v] = Some(level);
    level
}

/// Assign group labels: levels holding two or more phases become groups,
/// labelled with successive letters in ascending level order. Single-phase
/// levels stay solo (`group = None`).
fn assign_groups(phases: &mut [Phase]) {
    let mut by_level: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, phase) in phases.iter().enumerate() {
        by_level.entry(phase.level).or_default().push(i);
    }

    let mut next_label = 0;
    for members in by_level.values() {
        if members.len() < 2 {
            continue;
        }
        let label = group_label(next_label);
        next_label += 1;
        for &i in members {
            phases[i].group = Some(label.clone());
        }
    }
}

/// Letter labels: A..Z, then AA, AB, ...
fn group_label(mut n: usize) -> String {
    let mut label = String::new();
    loop {
        label.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
        if n == 0 {
            break;
        }
        n -= 1;
    }
    label
}
