//! Durable status store: one JSON document per plan.
//!
//! The store is the single source of truth for phase status across process
//! restarts. The orchestrator itself is stateless: every command loads the
//! document, mutates it under an exclusive file lock, and saves it back with
//! atomic-replace semantics (write to a temp file, then rename), so readers
//! never observe a torn write and an unclean shutdown leaves the previous
//! complete document in place.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::errors::StoreError;
use crate::lifecycle::{self, Applied, PhaseStatus};
use crate::phase::{Phase, SYNTHETIC_PREFIX};

/// The full status record for one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusStore {
    /// Plan identity (the plan file stem)
    pub plan: String,
    /// Hash of the plan document this store was last reconciled against
    pub plan_hash: String,
    /// The commit/branch the whole plan executes against, captured once and
    /// never changed on resume
    pub base_point: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Monotonically increasing write counter
    pub revision: u64,
    /// Phase records keyed by id
    pub phases: BTreeMap<String, Phase>,
}

impl StatusStore {
    /// Create a fresh store from a parsed and graph-validated phase list.
    pub fn new(plan: &str, plan_hash: &str, base_point: &str, phases: Vec<Phase>) -> Self {
        let now = Utc::now();
        Self {
            plan: plan.to_string(),
            plan_hash: plan_hash.to_string(),
            base_point: base_point.to_string(),
            created_at: now,
            updated_at: now,
            revision: 0,
            phases: phases.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Result<&Phase, StoreError> {
        self.phases
            .get(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    /// Check whether every dependency of a phase is satisfied.
    ///
    /// For organic phases a dependency must be DONE. A synthetic fix phase
    /// works on top of its group's approved-but-unintegrated branches, so a
    /// PR_APPROVED dependency also satisfies it (its members only become
    /// DONE once the fix itself lands).
    pub fn deps_done(&self, phase: &Phase) -> bool {
        phase
            .depends_on
            .iter()
            .all(|dep| self.phases.get(dep).is_some_and(|d| dep_satisfied(phase, d)))
    }

    /// Dependencies of a phase that are not yet satisfied.
    pub fn waiting_on(&self, phase: &Phase) -> Vec<String> {
        phase
            .depends_on
            .iter()
            .filter(|dep| {
                self.phases
                    .get(*dep)
                    .is_none_or(|d| !dep_satisfied(phase, d))
            })
            .cloned()
            .collect()
    }

    /// Members of an execution group, in declaration order.
    pub fn group_members(&self, label: &str) -> Vec<&Phase> {
        let mut members: Vec<&Phase> = self
            .phases
            .values()
            .filter(|p| p.group.as_deref() == Some(label))
            .collect();
        members.sort_by_key(|p| p.declared_order);
        members
    }

    /// All group labels present in the store, in order.
    pub fn group_labels(&self) -> Vec<String> {
        let labels: BTreeSet<String> = self
            .phases
            .values()
            .filter_map(|p| p.group.clone())
            .collect();
        labels.into_iter().collect()
    }

    /// The full dependency closure of a phase (explicit edges as persisted,
    /// which already include implicit edges folded in at graph-build time).
    pub fn dependency_closure(&self, id: &str) -> HashSet<String> {
        let mut closure = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(id.to_string());
        while let Some(current) = queue.pop_front() {
            let Some(phase) = self.phases.get(&current) else {
                continue;
            };
            for dep in &phase.depends_on {
                if closure.insert(dep.clone()) {
                    queue.push_back(dep.clone());
                }
            }
        }
        closure
    }

    /// Request a status transition for one phase.
    ///
    /// The transition table is enforced by `lifecycle::apply`; on rejection
    /// the store is left unchanged. A supplied review ref is appended to the
    /// phase's append-only list. When a synthetic fix phase reaches DONE, its
    /// group members are completed as well (their work landed via the fix).
    pub fn update_status(
        &mut self,
        id: &str,
        target: PhaseStatus,
        review_ref: Option<&str>,
    ) -> Result<Applied, StoreError> {
        let deps_done = {
            let phase = self.get(id)?;
            self.deps_done(phase)
        };

        let phase = self
            .phases
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        let applied = lifecycle::apply(phase, target, deps_done)?;
        if let Some(r) = review_ref {
            if !phase.review_refs.iter().any(|existing| existing == r) {
                phase.review_refs.push(r.to_string());
            }
        }
        tracing::info!(phase = %id, status = %phase.status, "phase transition");

        let synthetic_done = phase.synthetic && phase.status == PhaseStatus::Done;
        if synthetic_done {
            self.propagate_synthetic_done(id)?;
        }
        Ok(applied)
    }

    /// Force a phase to ESCALATED (the cancellation primitive).
    pub fn escalate(&mut self, id: &str) -> Result<(), StoreError> {
        let phase = self
            .phases
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        lifecycle::force_escalate(phase)?;
        tracing::warn!(phase = %id, "phase escalated, dependents are blocked");
        Ok(())
    }

    /// A synthetic fix reaching DONE completes every member still waiting at
    /// the gate, recording the fix's review ref against each.
    fn propagate_synthetic_done(&mut self, fix_id: &str) -> Result<(), StoreError> {
        let fix = self.get(fix_id)?;
        let members = fix.depends_on.clone();
        let fix_ref = fix.review_refs.last().cloned();

        for member_id in members {
            let Some(member) = self.phases.get_mut(&member_id) else {
                continue;
            };
            if member.status == PhaseStatus::PrApproved {
                member.status = PhaseStatus::Done;
                if let Some(r) = &fix_ref {
                    member.review_refs.push(r.clone());
                }
                tracing::info!(phase = %member_id, via = %fix_id, "completed via synthetic fix");
            }
        }
        Ok(())
    }

    /// Reconcile a re-parsed plan against persisted state.
    ///
    /// Persisted status, attempts, and review refs are kept for ids still
    /// present; new phases join as PENDING; synthetic phases always survive
    /// (they were injected, not authored). A phase whose work already landed
    /// (DONE or MERGED) disappearing from the plan is plan drift and fatal.
    /// An ESCALATED phase disappearing is the sanctioned human resolution
    /// path, so it is dropped along with in-flight phases.
    pub fn reconcile(&mut self, parsed: Vec<Phase>, plan_hash: &str) -> Result<(), StoreError> {
        let new_ids: HashSet<&str> = parsed.iter().map(|p| p.id.as_str()).collect();

        for (id, phase) in &self.phases {
            if !phase.synthetic && !new_ids.contains(id.as_str()) && phase.status.is_complete() {
                return Err(StoreError::PlanDrift { id: id.clone() });
            }
        }

        let mut next: BTreeMap<String, Phase> = self
            .phases
            .iter()
            .filter(|(_, p)| p.synthetic)
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect();

        for mut parsed_phase in parsed {
            if let Some(existing) = self.phases.get(&parsed_phase.id) {
                parsed_phase.status = existing.status;
                parsed_phase.attempts = existing.attempts;
                parsed_phase.review_refs = existing.review_refs.clone();
                // Identifiers are immutable after creation.
                parsed_phase.branch_name = existing.branch_name.clone();
            }
            next.insert(parsed_phase.id.clone(), parsed_phase);
        }

        self.phases = next;
        self.plan_hash = plan_hash.to_string();
        Ok(())
    }

    /// Allocate an unused synthetic id for a group, e.g. "I-A", then "I-A-2".
    pub fn next_synthetic_id(&self, group: &str) -> String {
        let base = format!("{SYNTHETIC_PREFIX}{group}");
        if !self.phases.contains_key(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.phases.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn dep_satisfied(phase: &Phase, dep: &Phase) -> bool {
    match dep.status {
        PhaseStatus::Done => true,
        PhaseStatus::PrApproved => phase.synthetic,
        _ => false,
    }
}

/// Hash of the plan document, used for store identity metadata.
pub fn plan_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Addressing and persistence for one plan's store document.
pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    /// Derive the store location from the plan's identity:
    /// `<project>/.maestro/<plan-stem>.state.json`.
    pub fn for_plan(project_dir: &Path, plan_path: &Path) -> Self {
        let stem = plan_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("plan");
        Self {
            path: project_dir
                .join(".maestro")
                .join(format!("{stem}.state.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Take the per-plan exclusive lock. All read-modify-write cycles hold
    /// this to serialize writers; the lock releases on drop.
    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_path = self.path.with_extension("lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok(StoreLock { file })
    }

    pub fn load(&self) -> Result<StatusStore, StoreError> {
        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Save with atomic-replace semantics, bumping the write metadata.
    pub fn save(&self, store: &mut StatusStore) -> Result<(), StoreError> {
        store.revision += 1;
        store.updated_at = Utc::now();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(store).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), revision = store.revision, "store saved");
        Ok(())
    }
}

/// RAII guard for the per-plan exclusive lock.
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
