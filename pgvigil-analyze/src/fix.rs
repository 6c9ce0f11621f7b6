//! Auto-fix rewriting for a fixed set of rule violations.
//!
//! Each fixable rule owns exactly one deterministic textual transform.
//! Fixes are modeled as edits against the *current* text: violations are
//! applied in ascending (line, rule id) order and every edit re-derives
//! its span after the previous rewrite, so overlapping fixes on one
//! statement can never apply stale offsets.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rules::Violation;

/// The timeout statement prepended by the `require-lock-timeout` fix.
pub const LOCK_TIMEOUT_STATEMENT: &str = "SET lock_timeout = '5s';";

/// Rule ids with an auto-fix, in the order fixes apply within one line.
pub const FIXABLE_RULES: &[&str] = &[
    "adding-check-constraint",
    "adding-foreign-key-constraint",
    "require-concurrent-index-creation",
    "require-concurrent-index-drop",
    "require-lock-timeout",
];

/// Whether a rule id has an auto-fix.
pub fn is_fixable(rule_id: &str) -> bool {
    FIXABLE_RULES.contains(&rule_id)
}

/// Result of applying fixes to one file's SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixOutcome {
    /// The rewritten SQL. Equals the input when nothing applied.
    pub fixed_sql: String,
    /// Number of violations whose transform changed the text.
    pub fixed_count: usize,
    /// Violations with no auto-fix, or whose statement was already safe.
    pub unfixable: Vec<Violation>,
}

/// Apply every available fix to `sql`.
///
/// Non-fixable violations pass through unchanged into
/// [`FixOutcome::unfixable`]. Fixable violations whose statement turns
/// out to already be safe also land there — the transform refuses to
/// guess, and idempotence on already-safe SQL is a hard property.
pub fn fix(sql: &str, violations: &[Violation]) -> FixOutcome {
    let mut fixable: Vec<&Violation> = Vec::new();
    let mut unfixable: Vec<Violation> = Vec::new();

    for violation in violations {
        if is_fixable(&violation.rule_id) {
            fixable.push(violation);
        } else {
            unfixable.push(violation.clone());
        }
    }

    // Documented order: ascending line, then ascending rule id for
    // overlapping fixes on the same statement.
    fixable.sort_by(|a, b| a.line.cmp(&b.line).then(a.rule_id.cmp(&b.rule_id)));

    let mut current = sql.to_string();
    let mut fixed_count = 0usize;
    // Prepending a timeout statement shifts every later line down by one.
    let mut line_shift = 0u32;

    for violation in fixable {
        let line = violation.line + line_shift;
        let applied = match violation.rule_id.as_str() {
            "require-lock-timeout" => {
                match prepend_lock_timeout(&current, line) {
                    Some(next) => {
                        current = next;
                        line_shift += 1;
                        true
                    }
                    None => false,
                }
            }
            rule_id => match rewrite_statement_at(&current, line, rule_id) {
                Some(next) => {
                    current = next;
                    true
                }
                None => false,
            },
        };

        if applied {
            debug!(rule = %violation.rule_id, line = violation.line, "applied fix");
            fixed_count += 1;
        } else {
            unfixable.push(violation.clone());
        }
    }

    FixOutcome {
        fixed_sql: current,
        fixed_count,
        unfixable,
    }
}

/// Rewrite the statement starting at `line` with the rule's transform.
fn rewrite_statement_at(sql: &str, line: u32, rule_id: &str) -> Option<String> {
    let start = line_start_offset(sql, line)?;
    let end = statement_end(sql, start);
    let segment = &sql[start..end];

    let rewritten = match rule_id {
        "require-concurrent-index-creation" => insert_concurrently_into_create(segment)?,
        "require-concurrent-index-drop" => insert_concurrently_into_drop(segment)?,
        "adding-foreign-key-constraint" | "adding-check-constraint" => {
            append_not_valid(segment)?
        }
        _ => return None,
    };

    let mut out = String::with_capacity(sql.len() + rewritten.len() - segment.len());
    out.push_str(&sql[..start]);
    out.push_str(&rewritten);
    out.push_str(&sql[end..]);
    Some(out)
}

/// Insert `CONCURRENTLY` after `CREATE [UNIQUE] INDEX`.
///
/// Returns `None` when the statement already reads `CONCURRENTLY`.
pub fn insert_concurrently_into_create(sql: &str) -> Option<String> {
    let re = Regex::new(r"(?i)\b(create(?:\s+unique)?\s+index)(\s+concurrently\b)?").ok()?;
    let caps = re.captures(sql)?;
    if caps.get(2).is_some() {
        return None;
    }
    let keyword = caps.get(1)?;
    Some(splice(sql, keyword.end(), " CONCURRENTLY"))
}

/// Insert `CONCURRENTLY` after `DROP INDEX`.
///
/// Returns `None` when the statement already reads `CONCURRENTLY`.
pub fn insert_concurrently_into_drop(sql: &str) -> Option<String> {
    let re = Regex::new(r"(?i)\b(drop\s+index)(\s+concurrently\b)?").ok()?;
    let caps = re.captures(sql)?;
    if caps.get(2).is_some() {
        return None;
    }
    let keyword = caps.get(1)?;
    Some(splice(sql, keyword.end(), " CONCURRENTLY"))
}

/// Append `NOT VALID` before the statement terminator.
///
/// Returns `None` when the statement already reads `NOT VALID`.
pub fn append_not_valid(sql: &str) -> Option<String> {
    let re = Regex::new(r"(?i)\bnot\s+valid\b").ok()?;
    if re.is_match(sql) {
        return None;
    }
    let end = statement_end(sql, 0);
    let insert_at = if sql[..end].ends_with(';') { end - 1 } else { end };
    Some(splice(sql, insert_at, " NOT VALID"))
}

/// Insert the lock-timeout statement on its own line before `line`.
///
/// Returns `None` when a `lock_timeout` setting already precedes the
/// statement.
fn prepend_lock_timeout(sql: &str, line: u32) -> Option<String> {
    let start = line_start_offset(sql, line)?;
    if sql[..start].to_lowercase().contains("lock_timeout") {
        return None;
    }
    let mut insertion = String::with_capacity(LOCK_TIMEOUT_STATEMENT.len() + 1);
    insertion.push_str(LOCK_TIMEOUT_STATEMENT);
    insertion.push('\n');
    Some(splice(sql, start, &insertion))
}

/// Insert `text` at `offset`.
fn splice(sql: &str, offset: usize, text: &str) -> String {
    let mut out = String::with_capacity(sql.len() + text.len());
    out.push_str(&sql[..offset]);
    out.push_str(text);
    out.push_str(&sql[offset..]);
    out
}

/// Byte offset where the 1-based `line` starts.
fn line_start_offset(sql: &str, line: u32) -> Option<usize> {
    if line <= 1 {
        return Some(0);
    }
    let mut remaining = line - 1;
    for (i, b) in sql.bytes().enumerate() {
        if b == b'\n' {
            remaining -= 1;
            if remaining == 0 {
                return Some(i + 1);
            }
        }
    }
    None
}

/// Byte offset just past the statement's terminating `;`, starting the
/// scan at `start`. Quoted strings and line comments are skipped; a
/// statement without a terminator ends at end of text.
fn statement_end(sql: &str, start: usize) -> usize {
    let bytes = sql.as_bytes();
    let mut i = start;
    let mut in_single = false;
    let mut in_double = false;

    while i < bytes.len() {
        let b = bytes[i];
        if in_single {
            if b == b'\'' {
                in_single = false;
            }
        } else if in_double {
            if b == b'"' {
                in_double = false;
            }
        } else {
            match b {
                b'\'' => in_single = true,
                b'"' => in_double = true,
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                    continue;
                }
                b';' => return i + 1,
                _ => {}
            }
        }
        i += 1;
    }
    bytes.len()
}
