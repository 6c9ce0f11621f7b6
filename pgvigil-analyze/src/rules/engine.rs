//! The rule engine.
//!
//! Runs every catalog rule against every statement, in statement order
//! then catalog order, so two runs over identical input produce
//! identical, identically ordered output.

use pgvigil_ast::source::{ParsedFile, RawStatement};
use pgvigil_ast::version::PgVersion;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::context::ProductionContext;
use crate::rules::{RuleCatalog, RuleContext, RuleFault, Violation};

/// Findings for one statement: violations plus isolated check failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementFindings {
    /// 0-based statement index.
    pub index: usize,
    /// Violations, in catalog order.
    pub violations: Vec<Violation>,
    /// Rule checks that failed on this statement.
    pub faults: Vec<RuleFault>,
}

/// Executes a rule catalog over a file's statements.
#[derive(Debug)]
pub struct RuleEngine<'a> {
    catalog: &'a RuleCatalog,
    pg_version: PgVersion,
    production: Option<&'a ProductionContext>,
}

impl<'a> RuleEngine<'a> {
    /// Create an engine over a catalog.
    pub fn new(catalog: &'a RuleCatalog, pg_version: PgVersion) -> Self {
        Self {
            catalog,
            pg_version,
            production: None,
        }
    }

    /// Attach production telemetry, unlocking paid-tier rules.
    pub fn with_production(mut self, production: &'a ProductionContext) -> Self {
        self.production = Some(production);
        self
    }

    /// Run every rule against every statement of the file.
    ///
    /// A check returning an error is isolated to that (rule, statement)
    /// pair and recorded as a fault; remaining rules and statements still
    /// run. Paid-tier rules are skipped entirely when no production
    /// context is attached — absence of optional context is not a
    /// failure.
    pub fn run(&self, file: &ParsedFile) -> Vec<StatementFindings> {
        file.statements
            .iter()
            .map(|statement| self.run_statement(statement, &file.statements))
            .collect()
    }

    fn run_statement(
        &self,
        statement: &RawStatement,
        all: &[RawStatement],
    ) -> StatementFindings {
        let ctx = RuleContext {
            sql: &statement.sql,
            line: statement.line,
            index: statement.index,
            statements: all,
            pg_version: self.pg_version,
            production: self.production,
        };

        let mut findings = StatementFindings {
            index: statement.index,
            ..Default::default()
        };

        for rule in self.catalog.iter() {
            if rule.requires_production_context() && self.production.is_none() {
                trace!(rule = rule.id(), "skipping paid-tier rule without production context");
                continue;
            }

            match rule.check(statement, &ctx) {
                Ok(Some(violation)) => {
                    debug!(
                        rule = rule.id(),
                        line = statement.line,
                        severity = %violation.severity,
                        "rule violation"
                    );
                    findings.violations.push(violation);
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(
                        rule = rule.id(),
                        line = statement.line,
                        error = %err,
                        "rule check failed; isolating"
                    );
                    findings.faults.push(RuleFault {
                        rule_id: SmolStr::new(rule.id()),
                        statement_index: statement.index,
                        line: statement.line,
                        message: err.message.clone(),
                    });
                }
            }
        }

        findings
    }
}
