//! Plan document parser.
//!
//! A plan is a markdown document with one block per phase:
//!
//! ```markdown
//! ## Phase 1: Status store
//! Depends on: none
//! Files: src/store.rs
//!
//! ### Scope
//! Build the durable status store.
//!
//! ### Acceptance criteria
//! - store survives a process restart
//!
//! ### Tests
//! - round-trip load/save
//! ```
//!
//! The parser extracts ordered phase records and validates the minimum
//! structure: every phase needs a non-empty scope and at least one acceptance
//! criterion. It has no side effects; store initialization belongs to the
//! graph builder.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::errors::PlanError;
use crate::phase::Phase;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^##\s+Phase\s+([A-Za-z0-9._-]+)\s*:\s*(.+?)\s*$").unwrap())
}

/// Parse a plan document into ordered phase records.
pub fn parse_plan(text: &str) -> Result<Vec<Phase>, PlanError> {
    let headings: Vec<_> = heading_re().captures_iter(text).collect();
    if headings.is_empty() {
        return Err(PlanError::EmptyPlan);
    }

    let mut phases = Vec::with_capacity(headings.len());
    let mut seen: HashSet<String> = HashSet::new();

    for (order, caps) in headings.iter().enumerate() {
        let id = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let name = caps.get(2).map_or("", |m| m.as_str()).to_string();

        if !seen.insert(id.clone()) {
            return Err(PlanError::DuplicatePhaseId { id });
        }

        let block_start = caps.get(0).map_or(0, |m| m.end());
        let block_end = headings
            .get(order + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let block = &text[block_start..block_end];

        let depends_on = parse_id_list(metadata_line(block, "depends on").unwrap_or_default());
        let file_targets = parse_path_list(metadata_line(block, "files").unwrap_or_default());

        let scope = section_body(block, "scope");
        if scope.as_deref().is_none_or(|s| s.trim().is_empty()) {
            return Err(PlanError::MalformedPhase {
                id,
                section: "scope",
            });
        }

        let criteria = section_body(block, "acceptance criteria");
        let criterion_count = criteria
            .as_deref()
            .map_or(0, |body| body.lines().filter(|l| is_list_item(l)).count());
        if criterion_count == 0 {
            return Err(PlanError::MalformedPhase {
                id,
                section: "acceptance criteria",
            });
        }

        phases.push(Phase::new(&id, &name, depends_on, file_targets, order));
    }

    Ok(phases)
}

/// Find a `Key: value` metadata line within a phase block. The key match is
/// case-insensitive and tolerates bold markers around the key.
fn metadata_line<'a>(block: &'a str, key: &str) -> Option<&'a str> {
    for line in block.lines() {
        // Metadata lines live above the first sub-section.
        if line.trim_start().starts_with("###") {
            break;
        }
        let trimmed = line.trim().trim_start_matches('*');
        let Some(colon) = trimmed.find(':') else {
            continue;
        };
        let (head, tail) = trimmed.split_at(colon);
        if head.trim_end_matches('*').trim().eq_ignore_ascii_case(key) {
            return Some(tail[1..].trim_start_matches('*').trim());
        }
    }
    None
}

/// Extract the body of a `### <name>` sub-section, up to the next heading.
fn section_body(block: &str, name: &str) -> Option<String> {
    let mut body = String::new();
    let mut in_section = false;
    for line in block.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("###") {
            if in_section {
                break;
            }
            in_section = rest.trim().eq_ignore_ascii_case(name);
            continue;
        }
        if in_section {
            body.push_str(line);
            body.push('\n');
        }
    }
    if in_section || !body.is_empty() {
        Some(body)
    } else {
        None
    }
}

fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("- ") || trimmed.starts_with("* ") || {
        let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
        !digits.is_empty() && trimmed[digits.len()..].starts_with('.')
    }
}

fn parse_id_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none") && *s != "-")
        .map(str::to_string)
        .collect()
}

fn parse_path_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_matches('`'))
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
        .map(str::to_string)
        .collect()
}
