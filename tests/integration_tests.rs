//! End-to-end CLI tests: parse a plan, walk phases through the lifecycle,
//! run the integration gate, and recover from a failed integration build.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a maestro Command
fn maestro() -> Command {
    cargo_bin_cmd!("maestro")
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

const DIAMOND_PLAN: &str = r#"# Release plan

## Phase 1: Status store
Depends on: none
Files: src/store.rs

### Scope
Build the durable status store.

### Acceptance criteria
- store survives a process restart

## Phase 2: Parser
Depends on: none
Files: src/plan.rs

### Scope
Parse the plan document.

### Acceptance criteria
- malformed plans are rejected

## Phase 3: Scheduler
Depends on: 1, 2
Files: src/scheduler.rs

### Scope
Compute readiness over the graph.

### Acceptance criteria
- ready never returns blocked phases
"#;

/// Write the diamond plan and parse it.
fn init_diamond(dir: &TempDir) {
    fs::write(dir.path().join("plan.md"), DIAMOND_PLAN).unwrap();
    maestro()
        .current_dir(dir.path())
        .args(["parse", "plan.md"])
        .assert()
        .success();
}

/// Walk a phase from PENDING to PR_APPROVED (grouped phases only).
fn approve(dir: &TempDir, id: &str) {
    for status in ["dispatched", "developing", "for_review", "pr_approved"] {
        maestro()
            .current_dir(dir.path())
            .args(["update", id, status])
            .assert()
            .success();
    }
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_maestro_help() {
        maestro().arg("--help").assert().success();
    }

    #[test]
    fn test_maestro_version() {
        maestro().arg("--version").assert().success();
    }

    #[test]
    fn test_commands_before_parse_fail() {
        let dir = create_temp_project();
        maestro()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No plan has been parsed yet"));
    }
}

mod parse {
    use super::*;

    #[test]
    fn test_parse_initializes_store_and_reports_groups() {
        let dir = create_temp_project();
        fs::write(dir.path().join("plan.md"), DIAMOND_PLAN).unwrap();

        maestro()
            .current_dir(dir.path())
            .args(["parse", "plan.md"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized plan 'plan' (3 phases"))
            .stdout(predicate::str::contains("Group A: 1, 2 (parallel)"))
            .stdout(predicate::str::contains("Solo: 3"));

        assert!(dir.path().join(".maestro/plan.state.json").exists());
    }

    #[test]
    fn test_parse_is_resumable_and_keeps_progress() {
        let dir = create_temp_project();
        init_diamond(&dir);

        maestro()
            .current_dir(dir.path())
            .args(["update", "1", "dispatched"])
            .assert()
            .success();

        maestro()
            .current_dir(dir.path())
            .args(["parse", "plan.md"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Reconciled plan 'plan'"));

        maestro()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("dispatched"));
    }

    #[test]
    fn test_parse_rejects_cycle_with_path() {
        let dir = create_temp_project();
        let plan = "\
## Phase 1: A
Depends on: 2

### Scope
x

### Acceptance criteria
- y

## Phase 2: B
Depends on: 1

### Scope
x

### Acceptance criteria
- y
";
        fs::write(dir.path().join("plan.md"), plan).unwrap();

        maestro()
            .current_dir(dir.path())
            .args(["parse", "plan.md"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cycle detected"));
    }

    #[test]
    fn test_parse_rejects_malformed_phase() {
        let dir = create_temp_project();
        let plan = "## Phase 1: A\n\n### Acceptance criteria\n- y\n";
        fs::write(dir.path().join("plan.md"), plan).unwrap();

        maestro()
            .current_dir(dir.path())
            .args(["parse", "plan.md"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("malformed"));
    }

    #[test]
    fn test_parse_rejects_unknown_dependency() {
        let dir = create_temp_project();
        let plan = "## Phase 1: A\nDepends on: 99\n\n### Scope\nx\n\n### Acceptance criteria\n- y\n";
        fs::write(dir.path().join("plan.md"), plan).unwrap();

        maestro()
            .current_dir(dir.path())
            .args(["parse", "plan.md"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown phase 99"));
    }
}

mod lifecycle_flow {
    use super::*;

    #[test]
    fn test_next_shows_dependency_free_phases() {
        let dir = create_temp_project();
        init_diamond(&dir);

        maestro()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .success()
            .stdout(predicate::str::contains("1"))
            .stdout(predicate::str::contains("2"))
            .stdout(predicate::str::contains("Scheduler").not());
    }

    #[test]
    fn test_update_reports_transition() {
        let dir = create_temp_project();
        init_diamond(&dir);

        maestro()
            .current_dir(dir.path())
            .args(["update", "1", "dispatched"])
            .assert()
            .success()
            .stdout(predicate::str::contains("pending -> dispatched"));
    }

    #[test]
    fn test_update_rejects_invalid_transition() {
        let dir = create_temp_project();
        init_diamond(&dir);

        maestro()
            .current_dir(dir.path())
            .args(["update", "1", "done"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid transition"));
    }

    #[test]
    fn test_update_rejects_unknown_status_word() {
        let dir = create_temp_project();
        init_diamond(&dir);

        maestro()
            .current_dir(dir.path())
            .args(["update", "1", "approved-ish"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown status"));
    }

    #[test]
    fn test_dispatch_blocked_until_deps_done() {
        let dir = create_temp_project();
        init_diamond(&dir);

        maestro()
            .current_dir(dir.path())
            .args(["update", "3", "dispatched"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("waiting on"));
    }

    #[test]
    fn test_file_overlap_serializes_phases() {
        let dir = create_temp_project();
        let plan = "\
## Phase 1: Schema
Depends on: none
Files: src/db.rs

### Scope
Define the schema.

### Acceptance criteria
- schema compiles

## Phase 2: Migrations
Depends on: none
Files: src/db.rs

### Scope
Add migrations.

### Acceptance criteria
- migrations apply cleanly
";
        fs::write(dir.path().join("plan.md"), plan).unwrap();
        maestro()
            .current_dir(dir.path())
            .args(["parse", "plan.md"])
            .assert()
            .success();

        // Both phases touch src/db.rs: phase 2 must wait for phase 1.
        maestro()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .success()
            .stdout(predicate::str::contains("Schema"))
            .stdout(predicate::str::contains("Migrations").not());

        maestro()
            .current_dir(dir.path())
            .args(["update", "2", "dispatched"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("waiting on: 1"));

        for status in ["dispatched", "developing", "for_review", "merged"] {
            maestro()
                .current_dir(dir.path())
                .args(["update", "1", status])
                .assert()
                .success();
        }

        maestro()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .success()
            .stdout(predicate::str::contains("Migrations"));
    }

    #[test]
    fn test_escalate_blocks_dependents() {
        let dir = create_temp_project();
        init_diamond(&dir);

        maestro()
            .current_dir(dir.path())
            .args(["escalate", "1"])
            .assert()
            .success();

        maestro()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .success()
            .stdout(predicate::str::contains("blocked by escalation: 3"));
    }
}

mod integration_gate {
    use super::*;

    #[test]
    fn test_check_group_flips_on_last_approval() {
        let dir = create_temp_project();
        init_diamond(&dir);

        approve(&dir, "1");
        maestro()
            .current_dir(dir.path())
            .args(["check-group", "A"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Group A is not ready"));

        approve(&dir, "2");
        maestro()
            .current_dir(dir.path())
            .args(["check-group", "A"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Group A is ready for integration"));
    }

    #[test]
    fn test_integrate_merged_completes_group_and_unblocks_next() {
        let dir = create_temp_project();
        init_diamond(&dir);
        approve(&dir, "1");
        approve(&dir, "2");

        maestro()
            .current_dir(dir.path())
            .args(["integrate", "A", "--outcome", "merged"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Group A integrated"));

        maestro()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .success()
            .stdout(predicate::str::contains("Scheduler"));
    }

    #[test]
    fn test_integrate_refuses_partial_group() {
        let dir = create_temp_project();
        init_diamond(&dir);
        approve(&dir, "1");

        maestro()
            .current_dir(dir.path())
            .args(["integrate", "A", "--outcome", "merged"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not ready for integration"));
    }

    #[test]
    fn test_integrate_build_failure_injects_fix_that_completes_group() {
        let dir = create_temp_project();
        init_diamond(&dir);
        approve(&dir, "1");
        approve(&dir, "2");

        maestro()
            .current_dir(dir.path())
            .args([
                "integrate",
                "A",
                "--outcome",
                "build-failed",
                "--reason",
                "integration tests fail",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Injected fix phase I-A"));

        // The fix is immediately dispatchable against the approved branches.
        maestro()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .success()
            .stdout(predicate::str::contains("I-A"));

        for status in ["dispatched", "developing"] {
            maestro()
                .current_dir(dir.path())
                .args(["update", "I-A", status])
                .assert()
                .success();
        }
        maestro()
            .current_dir(dir.path())
            .args(["update", "I-A", "for_review", "--review-ref", "42"])
            .assert()
            .success();
        maestro()
            .current_dir(dir.path())
            .args(["update", "I-A", "merged"])
            .assert()
            .success();

        // The fix landing completes the whole group and unblocks phase 3.
        maestro()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("3/4 phases done"));
        maestro()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .success()
            .stdout(predicate::str::contains("Scheduler"));
    }

    #[test]
    fn test_integrate_build_failure_requires_reason() {
        let dir = create_temp_project();
        init_diamond(&dir);
        approve(&dir, "1");
        approve(&dir, "2");

        maestro()
            .current_dir(dir.path())
            .args(["integrate", "A", "--outcome", "build-failed"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--reason"));
    }

    #[test]
    fn test_integrate_conflict_changes_nothing() {
        let dir = create_temp_project();
        init_diamond(&dir);
        approve(&dir, "1");
        approve(&dir, "2");

        maestro()
            .current_dir(dir.path())
            .args(["integrate", "A", "--outcome", "conflict"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Merge conflict"));

        // Still at the gate; a later merged outcome can proceed.
        maestro()
            .current_dir(dir.path())
            .args(["check-group", "A"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ready for integration"));
    }

    #[test]
    fn test_add_phase_injects_manual_fix() {
        let dir = create_temp_project();
        init_diamond(&dir);

        maestro()
            .current_dir(dir.path())
            .args(["add-phase", "--group", "A", "--reason", "flaky migration"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Injected I-A"));
    }
}

mod status {
    use super::*;

    #[test]
    fn test_status_lists_all_phases() {
        let dir = create_temp_project();
        init_diamond(&dir);

        maestro()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Status store"))
            .stdout(predicate::str::contains("Parser"))
            .stdout(predicate::str::contains("Scheduler"))
            .stdout(predicate::str::contains("0/3 phases done"));
    }

    #[test]
    fn test_status_records_review_refs() {
        let dir = create_temp_project();
        init_diamond(&dir);

        for status in ["dispatched", "developing"] {
            maestro()
                .current_dir(dir.path())
                .args(["update", "1", status])
                .assert()
                .success();
        }
        maestro()
            .current_dir(dir.path())
            .args(["update", "1", "for_review", "--review-ref", "17"])
            .assert()
            .success();

        maestro()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("17"));
    }
}
