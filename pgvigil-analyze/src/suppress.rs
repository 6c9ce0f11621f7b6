//! Inline suppression directives.
//!
//! Two comment forms are recognized:
//!
//! ```sql
//! -- pgvigil:disable require-concurrent-index-creation, ban-cluster
//! -- pgvigil:disable all
//! -- pgvigil:disable-file dropping-column
//! ```
//!
//! A statement-scoped `disable` attaches to the nearest following
//! statement by line number and suppresses only that statement's
//! violations; a `disable-file` directive applies to the whole file.
//! Multiple directives on one target accumulate.

use std::collections::BTreeSet;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

use pgvigil_ast::source::RawStatement;

use crate::rules::StatementFindings;

/// What a directive applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveScope {
    /// The nearest following statement.
    Statement,
    /// The whole file.
    File,
}

/// The rule ids a directive suppresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSelection {
    /// Every rule.
    All,
    /// The listed rule ids.
    Ids(BTreeSet<SmolStr>),
}

impl RuleSelection {
    /// Whether the selection covers a rule id.
    pub fn matches(&self, rule_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Ids(ids) => ids.contains(rule_id),
        }
    }

    /// Union another selection into this one.
    fn extend(&mut self, other: &RuleSelection) {
        match (self, other) {
            (this @ Self::Ids(_), Self::All) => *this = Self::All,
            (Self::Ids(mine), Self::Ids(theirs)) => mine.extend(theirs.iter().cloned()),
            (Self::All, _) => {}
        }
    }
}

/// One parsed suppression directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableDirective {
    /// Statement- or file-scoped.
    pub scope: DirectiveScope,
    /// The suppressed rules.
    pub rules: RuleSelection,
    /// 1-based line the directive comment appears on.
    pub line: u32,
}

/// Parse every suppression directive in a file's source text.
pub fn parse_directives(source: &str) -> Vec<DisableDirective> {
    // Unwrap is fine: the pattern is a compile-time constant.
    let re = Regex::new(r"^\s*--\s*pgvigil:disable(-file)?\b(.*)$").unwrap();

    let mut directives = Vec::new();
    for (line_index, line) in source.lines().enumerate() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let scope = if caps.get(1).is_some() {
            DirectiveScope::File
        } else {
            DirectiveScope::Statement
        };
        let args = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        let rules = if args.is_empty() || args.eq_ignore_ascii_case("all") {
            RuleSelection::All
        } else {
            RuleSelection::Ids(
                args.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|id| !id.is_empty())
                    .map(SmolStr::new)
                    .collect(),
            )
        };

        directives.push(DisableDirective {
            scope,
            rules,
            line: (line_index + 1) as u32,
        });
    }
    directives
}

/// Drop suppressed violations from the engine's findings.
///
/// A violation is dropped when a file-scoped directive matches its rule
/// id, or when a statement-scoped directive whose designated target is
/// the violating statement matches. A directive's target is the first
/// statement starting at or after the directive's line; it never
/// suppresses any other statement. Faults are never suppressed.
pub fn apply(
    directives: &[DisableDirective],
    statements: &[RawStatement],
    findings: Vec<StatementFindings>,
) -> Vec<StatementFindings> {
    let mut file_wide = RuleSelection::Ids(BTreeSet::new());
    // Union of statement-scoped selections, keyed by target statement index.
    let mut per_statement: Vec<Option<RuleSelection>> = vec![None; statements.len()];

    for directive in directives {
        match directive.scope {
            DirectiveScope::File => file_wide.extend(&directive.rules),
            DirectiveScope::Statement => {
                // The designated target is the first statement at or after
                // the directive line; a trailing directive with no such
                // statement suppresses nothing.
                if let Some(index) = statements.iter().position(|s| s.line >= directive.line) {
                    per_statement[index]
                        .get_or_insert_with(|| RuleSelection::Ids(BTreeSet::new()))
                        .extend(&directive.rules);
                }
            }
        }
    }

    findings
        .into_iter()
        .map(|mut per_stmt| {
            let scoped = per_statement.get(per_stmt.index).and_then(Option::as_ref);
            per_stmt.violations.retain(|violation| {
                let suppressed = file_wide.matches(&violation.rule_id)
                    || scoped.is_some_and(|s| s.matches(&violation.rule_id));
                if suppressed {
                    debug!(
                        rule = %violation.rule_id,
                        line = violation.line,
                        "violation suppressed by directive"
                    );
                }
                !suppressed
            });
            per_stmt
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgvigil_ast::severity::Severity;
    use pgvigil_ast::stmt::Statement;

    use crate::rules::Violation;

    fn statement(line: u32, index: usize) -> RawStatement {
        RawStatement::new(
            Statement::Other { tag: "test".into() },
            "SELECT 1;",
            line,
            index,
        )
    }

    fn finding(index: usize, rule_ids: &[&str], line: u32) -> StatementFindings {
        StatementFindings {
            index,
            violations: rule_ids
                .iter()
                .map(|id| Violation {
                    rule_id: SmolStr::new(*id),
                    rule_name: SmolStr::new(*id),
                    severity: Severity::Warning,
                    message: String::new(),
                    line,
                    safe_alternative: None,
                })
                .collect(),
            faults: vec![],
        }
    }

    #[test]
    fn test_parse_statement_directive_with_ids() {
        let directives = parse_directives("-- pgvigil:disable rule-a, rule-b\nSELECT 1;\n");
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].scope, DirectiveScope::Statement);
        assert_eq!(directives[0].line, 1);
        assert!(directives[0].rules.matches("rule-a"));
        assert!(directives[0].rules.matches("rule-b"));
        assert!(!directives[0].rules.matches("rule-c"));
    }

    #[test]
    fn test_parse_file_directive_all() {
        let directives = parse_directives("-- pgvigil:disable-file all\n");
        assert_eq!(directives[0].scope, DirectiveScope::File);
        assert!(directives[0].rules.matches("anything"));
    }

    #[test]
    fn test_bare_disable_means_all() {
        let directives = parse_directives("-- pgvigil:disable\n");
        assert!(directives[0].rules.matches("anything"));
    }

    #[test]
    fn test_file_scope_all_drops_everything() {
        let statements = vec![statement(2, 0), statement(3, 1)];
        let directives = parse_directives("-- pgvigil:disable-file all\n");
        let findings = vec![
            finding(0, &["rule-a"], 2),
            finding(1, &["rule-b", "rule-c"], 3),
        ];
        let filtered = apply(&directives, &statements, findings);
        assert!(filtered.iter().all(|f| f.violations.is_empty()));
    }

    #[test]
    fn test_statement_directive_targets_nearest_following() {
        let statements = vec![statement(3, 0), statement(5, 1)];
        // Directive on line 2 targets the statement on line 3 only.
        let source = "SELECT 0;\n-- pgvigil:disable rule-x\nSELECT 1;\n\nSELECT 2;\n";
        let directives = parse_directives(source);
        let findings = vec![
            finding(0, &["rule-x", "rule-y"], 3),
            finding(1, &["rule-x"], 5),
        ];
        let filtered = apply(&directives, &statements, findings);

        // rule-x suppressed on the target, rule-y retained.
        let ids: Vec<_> = filtered[0]
            .violations
            .iter()
            .map(|v| v.rule_id.as_str())
            .collect();
        assert_eq!(ids, vec!["rule-y"]);
        // The later statement keeps its rule-x violation.
        assert_eq!(filtered[1].violations.len(), 1);
    }

    #[test]
    fn test_multiple_directives_accumulate() {
        let statements = vec![statement(4, 0)];
        let source = "-- pgvigil:disable rule-a\n-- pgvigil:disable rule-b\n\nSELECT 1;\n";
        let directives = parse_directives(source);
        let findings = vec![finding(0, &["rule-a", "rule-b", "rule-c"], 4)];
        let filtered = apply(&directives, &statements, findings);

        let ids: Vec<_> = filtered[0]
            .violations
            .iter()
            .map(|v| v.rule_id.as_str())
            .collect();
        assert_eq!(ids, vec!["rule-c"]);
    }

    #[test]
    fn test_trailing_directive_suppresses_nothing() {
        let statements = vec![statement(1, 0)];
        let source = "SELECT 1;\n-- pgvigil:disable all\n";
        let directives = parse_directives(source);
        let findings = vec![finding(0, &["rule-a"], 1)];
        let filtered = apply(&directives, &statements, findings);
        assert_eq!(filtered[0].violations.len(), 1);
    }
}
