//! Safety rules and the engine that runs them.
//!
//! A rule is a stateless check with a stable identity; the catalog is an
//! insertion-ordered set the caller assembles and passes in — there is no
//! process-wide registry. The engine runs every rule against every
//! statement in order, isolating per-check failures so one misbehaving
//! rule never aborts the rest of the analysis.

pub mod catalog;
pub mod engine;

use indexmap::IndexMap;
use pgvigil_ast::severity::Severity;
use pgvigil_ast::source::RawStatement;
use pgvigil_ast::version::PgVersion;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use crate::context::ProductionContext;

pub use engine::{RuleEngine, StatementFindings};

/// A rule check failed unexpectedly.
///
/// Returned by [`Rule::check`] when a check cannot complete on
/// malformed-but-parseable input; the engine turns it into a
/// [`RuleFault`] rather than aborting the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("rule check failed: {message}")]
pub struct CheckError {
    /// What went wrong.
    pub message: String,
}

impl CheckError {
    /// Create a check error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A rule violation on one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Stable rule id.
    pub rule_id: SmolStr,
    /// Human rule name.
    pub rule_name: SmolStr,
    /// Effective severity.
    pub severity: Severity,
    /// What is wrong and why it matters.
    pub message: String,
    /// 1-based line the violating statement starts on.
    pub line: u32,
    /// A safe textual alternative, when the rule knows one.
    #[serde(default)]
    pub safe_alternative: Option<String>,
}

/// An isolated rule-check failure, distinct from a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFault {
    /// The rule whose check failed.
    pub rule_id: SmolStr,
    /// 0-based index of the statement being checked.
    pub statement_index: usize,
    /// 1-based line of that statement.
    pub line: u32,
    /// The failure message.
    pub message: String,
}

/// Per-statement view passed to every rule check.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Original source text of the statement under check.
    pub sql: &'a str,
    /// 1-based line the statement starts on.
    pub line: u32,
    /// 0-based index within the file's statement sequence.
    pub index: usize,
    /// All statements in the file, for look-behind.
    pub statements: &'a [RawStatement],
    /// Target PostgreSQL version.
    pub pg_version: PgVersion,
    /// Live-database telemetry; absent outside the paid tier.
    pub production: Option<&'a ProductionContext>,
}

impl<'a> RuleContext<'a> {
    /// Whether the statement under check runs inside an explicitly opened
    /// transaction.
    pub fn is_inside_transaction(&self) -> bool {
        is_inside_transaction(self.statements, self.index)
    }

    /// Whether a preceding statement in this file created the relation.
    ///
    /// Operations on a table created in the same migration are safe by
    /// construction — the table has no production traffic yet.
    pub fn relation_created_earlier(&self, relation: &str) -> bool {
        self.statements[..self.index].iter().any(|stmt| {
            matches!(
                &stmt.statement,
                pgvigil_ast::stmt::Statement::CreateTable(ct) if ct.name == relation
            )
        })
    }
}

/// Scan preceding statements for an unclosed transaction-open marker.
///
/// Walks backwards from `index`; the first preceding statement whose
/// normalized text is exactly `begin`, `begin transaction`, or starts
/// with `begin;` means "inside"; the first that is `commit`, `rollback`,
/// or starts with `commit;` means "not inside". No match means not
/// inside — transactions do not default-open.
pub fn is_inside_transaction(statements: &[RawStatement], index: usize) -> bool {
    let end = index.min(statements.len());
    for stmt in statements[..end].iter().rev() {
        let normalized = stmt.sql.trim().to_lowercase();
        let normalized = normalized.trim_end_matches(';').trim_end();
        if normalized == "begin"
            || normalized == "begin transaction"
            || normalized.starts_with("begin;")
        {
            return true;
        }
        if normalized == "commit" || normalized == "rollback" || normalized.starts_with("commit;")
        {
            return false;
        }
    }
    false
}

/// A migration-safety rule.
///
/// Rules are stateless and side-effect-free; the engine depends only on
/// this contract, never on concrete rule identities.
pub trait Rule: Send + Sync {
    /// Stable id, e.g. `require-concurrent-index-creation`.
    fn id(&self) -> &'static str;

    /// Human name, e.g. "Require concurrent index creation".
    fn name(&self) -> &'static str;

    /// Default severity; the surrounding configuration may remap it.
    fn severity(&self) -> Severity;

    /// One-paragraph description of what the rule flags.
    fn description(&self) -> &'static str;

    /// Why the flagged pattern is dangerous.
    fn rationale(&self) -> &'static str;

    /// Link to further documentation, if any.
    fn doc_url(&self) -> Option<&'static str> {
        None
    }

    /// Whether the check needs production telemetry to say anything.
    ///
    /// Paid-tier rules return `Ok(None)` when the context is absent;
    /// the engine also skips them outright.
    fn requires_production_context(&self) -> bool {
        false
    }

    /// Check one statement. `Ok(None)` means no finding.
    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError>;
}

/// An insertion-ordered set of rules.
///
/// Insertion order is irrelevant to correctness but fixes diagnostic
/// ordering, so it is preserved exactly.
#[derive(Default)]
pub struct RuleCatalog {
    rules: IndexMap<&'static str, Box<dyn Rule>>,
}

impl RuleCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any previous rule with the same id.
    pub fn insert(&mut self, rule: Box<dyn Rule>) {
        self.rules.insert(rule.id(), rule);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, rule: Box<dyn Rule>) -> Self {
        self.insert(rule);
        self
    }

    /// Look up a rule by id.
    pub fn get(&self, id: &str) -> Option<&dyn Rule> {
        self.rules.get(id).map(Box::as_ref)
    }

    /// Remove the listed rule ids, keeping the rest in order.
    pub fn without(mut self, ids: &[impl AsRef<str>]) -> Self {
        for id in ids {
            self.rules.shift_remove(id.as_ref());
        }
        self
    }

    /// Iterate rules in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.values().map(Box::as_ref)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for RuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCatalog")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}
