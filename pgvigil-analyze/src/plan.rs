//! Execution-plan assembly.
//!
//! The plan builder walks a file's statements in order, classifying,
//! scoring, and collecting post-suppression violations for each, while
//! tracking transaction boundaries. The result is a structured plan for
//! presentation layers — this module emits data, never formatted text.

use std::path::PathBuf;

use pgvigil_ast::source::ParsedFile;
use pgvigil_ast::version::PgVersion;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

use crate::context::{ProductionContext, TableStats};
use crate::lock::{classify, LockClassification};
use crate::risk::{score, RiskLevel, RiskScore};
use crate::rules::{is_inside_transaction, RuleCatalog, RuleEngine, RuleFault, Violation};
use crate::suppress;

/// How long a statement is expected to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationClass {
    /// Catalog-only; done in milliseconds.
    Instant,
    /// Scales with a small table.
    Seconds,
    /// Scales with a large table.
    Minutes,
    /// Scales with a very large table.
    Hours,
    /// Does table-proportional work, but no size signal is available.
    Unknown,
}

/// One statement's full analysis bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStatement {
    /// 0-based position in the file.
    pub index: usize,
    /// 1-based start line.
    pub line: u32,
    /// Original statement text.
    pub sql: String,
    /// Lock classification.
    pub lock: LockClassification,
    /// Composite risk.
    pub risk: RiskScore,
    /// Violations surviving suppression, in catalog order.
    pub violations: Vec<Violation>,
    /// Relations the statement touches.
    pub relations: Vec<SmolStr>,
    /// Expected duration class.
    pub duration: DurationClass,
    /// The statement executes inside an explicitly opened transaction.
    pub in_transaction: bool,
}

/// Transaction boundaries observed in a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    /// Number of transaction-open markers.
    pub opens: usize,
    /// Number of commit/rollback markers.
    pub closes: usize,
    /// The file ends with a transaction still open.
    pub trailing_open: bool,
}

/// The ordered analysis of one migration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Path of the analyzed file.
    pub path: PathBuf,
    /// Per-statement bundles, in file order.
    pub statements: Vec<PlanStatement>,
    /// Transaction-boundary summary.
    pub transactions: TransactionSummary,
    /// Total violations across all statements, post-suppression.
    pub violation_count: usize,
    /// Rule checks that failed, isolated per (rule, statement) pair.
    pub faults: Vec<RuleFault>,
    /// The worst per-statement risk level in the file.
    pub overall_risk: RiskLevel,
    /// The numeric score of the statement that set `overall_risk`.
    pub overall_score: u8,
}

/// Builds [`ExecutionPlan`]s from parsed files.
#[derive(Debug)]
pub struct PlanBuilder<'a> {
    catalog: &'a RuleCatalog,
    pg_version: PgVersion,
    production: Option<&'a ProductionContext>,
}

impl<'a> PlanBuilder<'a> {
    /// Create a builder over a rule catalog.
    pub fn new(catalog: &'a RuleCatalog, pg_version: PgVersion) -> Self {
        Self {
            catalog,
            pg_version,
            production: None,
        }
    }

    /// Attach production telemetry.
    pub fn with_production(mut self, production: &'a ProductionContext) -> Self {
        self.production = Some(production);
        self
    }

    /// Analyze one file into an ordered plan.
    pub fn build(&self, file: &ParsedFile) -> ExecutionPlan {
        let mut engine = RuleEngine::new(self.catalog, self.pg_version);
        if let Some(production) = self.production {
            engine = engine.with_production(production);
        }

        let findings = engine.run(file);
        let directives = suppress::parse_directives(&file.source);
        let findings = suppress::apply(&directives, &file.statements, findings);

        let mut statements = Vec::with_capacity(file.statements.len());
        let mut faults = Vec::new();
        let mut violation_count = 0usize;
        let mut overall = (RiskLevel::Green, 0u8);

        for (raw, finding) in file.statements.iter().zip(findings) {
            let lock = classify(&raw.statement, self.pg_version);
            let relations = raw.statement.target_relations();

            let stats = self
                .production
                .and_then(|p| p.largest_stats(relations.iter()));
            let queries = self.production.map(|p| p.queries_across(relations.iter()));
            let owned_queries: Option<Vec<_>> =
                queries.map(|qs| qs.into_iter().cloned().collect());

            let risk = score(&lock, stats.as_ref(), owned_queries.as_deref());
            let duration = estimate_duration(&lock, &raw.statement, stats.as_ref());
            let in_transaction = is_inside_transaction(&file.statements, raw.index);

            // Worst statement wins; ties break on the raw numeric score.
            if (risk.level, risk.score) > overall {
                overall = (risk.level, risk.score);
            }
            violation_count += finding.violations.len();
            faults.extend(finding.faults);

            statements.push(PlanStatement {
                index: raw.index,
                line: raw.line,
                sql: raw.sql.clone(),
                lock,
                risk,
                violations: finding.violations,
                relations,
                duration,
                in_transaction,
            });
        }

        let transactions = summarize_transactions(file);

        debug!(
            path = %file.path.display(),
            statements = statements.len(),
            violations = violation_count,
            risk = %overall.0,
            "built execution plan"
        );

        ExecutionPlan {
            path: file.path.clone(),
            statements,
            transactions,
            violation_count,
            faults,
            overall_risk: overall.0,
            overall_score: overall.1,
        }
    }
}

/// Estimate how long a statement runs.
///
/// Catalog-only work is `Instant`. Table-proportional work scales with
/// the target row count when statistics are available, and is `Unknown`
/// otherwise — a long build on a table of unknown size is precisely the
/// case the caller should not guess about.
fn estimate_duration(
    lock: &LockClassification,
    statement: &pgvigil_ast::stmt::Statement,
    stats: Option<&TableStats>,
) -> DurationClass {
    use pgvigil_ast::stmt::Statement;

    // Work proportional to table size, with or without a blocking lock.
    let scans_table = lock.long_held
        || matches!(
            statement,
            Statement::CreateIndex(ci) if ci.concurrently
        )
        || matches!(
            statement,
            Statement::Reindex(r) if r.concurrently
        )
        || matches!(statement, Statement::Vacuum(_))
        || matches!(statement, Statement::RefreshMaterializedView(_));

    if !scans_table {
        return DurationClass::Instant;
    }

    match stats {
        Some(stats) if stats.row_count < 100_000 => DurationClass::Seconds,
        Some(stats) if stats.row_count < 10_000_000 => DurationClass::Minutes,
        Some(_) => DurationClass::Hours,
        None => DurationClass::Unknown,
    }
}

/// Count transaction markers with the same begin/commit scan the rule
/// engine uses.
fn summarize_transactions(file: &ParsedFile) -> TransactionSummary {
    let mut summary = TransactionSummary::default();
    for statement in &file.statements {
        let normalized = statement.sql.trim().to_lowercase();
        let normalized = normalized.trim_end_matches(';').trim_end();
        if normalized == "begin"
            || normalized == "begin transaction"
            || normalized.starts_with("begin;")
        {
            summary.opens += 1;
        } else if normalized == "commit"
            || normalized == "rollback"
            || normalized.starts_with("commit;")
        {
            summary.closes += 1;
        }
    }
    summary.trailing_open = is_inside_transaction(&file.statements, file.statements.len());
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgvigil_ast::source::RawStatement;
    use pgvigil_ast::stmt::{CreateIndex, Statement, TxnOp};

    use crate::context::TableStats;
    use crate::rules::catalog;

    fn index_statement(concurrently: bool, sql: &str, line: u32, index: usize) -> RawStatement {
        RawStatement::new(
            Statement::CreateIndex(CreateIndex {
                name: Some("idx_users_email".into()),
                table: "users".into(),
                columns: vec!["email".into()],
                concurrently,
                unique: false,
                access_method: None,
            }),
            sql,
            line,
            index,
        )
    }

    fn single_index_file() -> ParsedFile {
        let sql = "CREATE INDEX idx_users_email ON users (email);";
        ParsedFile::new("001_add_index.sql", sql, vec![index_statement(false, sql, 1, 0)])
    }

    #[test]
    fn test_plan_bundles_lock_risk_and_violations() {
        let catalog = catalog::standard();
        let builder = PlanBuilder::new(&catalog, PgVersion::V15);
        let plan = builder.build(&single_index_file());

        assert_eq!(plan.statements.len(), 1);
        let stmt = &plan.statements[0];
        assert!(stmt.lock.blocks_writes);
        assert!(stmt.lock.long_held);
        assert!(stmt
            .violations
            .iter()
            .any(|v| v.rule_id == "require-concurrent-index-creation"));
        assert_eq!(stmt.relations, vec![SmolStr::new("users")]);
        assert!(plan.violation_count >= 1);
    }

    #[test]
    fn test_overall_risk_is_maximum_not_average() {
        let safe_sql = "SET lock_timeout = '5s';";
        let hot_sql = "CREATE INDEX idx_users_email ON users (email);";
        let file = ParsedFile::new(
            "002_mixed.sql",
            format!("{safe_sql}\n{hot_sql}"),
            vec![
                RawStatement::new(
                    Statement::SetParameter(pgvigil_ast::stmt::SetParameter {
                        name: "lock_timeout".into(),
                        value: "'5s'".into(),
                        local: false,
                    }),
                    safe_sql,
                    1,
                    0,
                ),
                index_statement(false, hot_sql, 2, 1),
            ],
        );

        let catalog = catalog::standard();
        let plan = PlanBuilder::new(&catalog, PgVersion::V15).build(&file);

        let statement_max = plan
            .statements
            .iter()
            .map(|s| s.risk.level)
            .max()
            .unwrap();
        assert_eq!(plan.overall_risk, statement_max);
        assert_eq!(plan.overall_risk, RiskLevel::Yellow);
    }

    #[test]
    fn test_duration_instant_for_metadata_work() {
        let sql = "ALTER TABLE users ALTER COLUMN email DROP DEFAULT;";
        let file = ParsedFile::new(
            "003_drop_default.sql",
            sql,
            vec![RawStatement::new(
                Statement::AlterTable(pgvigil_ast::stmt::AlterTable {
                    table: "users".into(),
                    only: false,
                    actions: vec![pgvigil_ast::stmt::AlterAction::DropDefault {
                        column: "email".into(),
                    }],
                }),
                sql,
                1,
                0,
            )],
        );
        let catalog = catalog::standard();
        let plan = PlanBuilder::new(&catalog, PgVersion::V15).build(&file);
        assert_eq!(plan.statements[0].duration, DurationClass::Instant);
    }

    #[test]
    fn test_duration_unknown_without_stats_then_scaled_with_stats() {
        let catalog = catalog::standard();
        let file = single_index_file();

        let plan = PlanBuilder::new(&catalog, PgVersion::V15).build(&file);
        assert_eq!(plan.statements[0].duration, DurationClass::Unknown);

        let production = ProductionContext::new().with_table_stats(
            "users",
            TableStats {
                row_count: 50_000_000,
                total_bytes: 40 << 30,
            },
        );
        let plan = PlanBuilder::new(&catalog, PgVersion::V15)
            .with_production(&production)
            .build(&file);
        assert_eq!(plan.statements[0].duration, DurationClass::Hours);
    }

    #[test]
    fn test_transaction_tracking() {
        let file = ParsedFile::new(
            "004_txn.sql",
            "BEGIN;\nCREATE INDEX idx_users_email ON users (email);\nCOMMIT;",
            vec![
                RawStatement::new(
                    Statement::TransactionControl { op: TxnOp::Begin },
                    "BEGIN;",
                    1,
                    0,
                ),
                index_statement(
                    false,
                    "CREATE INDEX idx_users_email ON users (email);",
                    2,
                    1,
                ),
                RawStatement::new(
                    Statement::TransactionControl { op: TxnOp::Commit },
                    "COMMIT;",
                    3,
                    2,
                ),
            ],
        );
        let catalog = catalog::standard();
        let plan = PlanBuilder::new(&catalog, PgVersion::V15).build(&file);

        assert!(!plan.statements[0].in_transaction);
        assert!(plan.statements[1].in_transaction);
        assert_eq!(plan.transactions.opens, 1);
        assert_eq!(plan.transactions.closes, 1);
        assert!(!plan.transactions.trailing_open);
    }

    #[test]
    fn test_suppressed_violations_are_not_counted() {
        let sql = "-- pgvigil:disable-file all\nCREATE INDEX idx_users_email ON users (email);";
        let file = ParsedFile::new(
            "005_suppressed.sql",
            sql,
            vec![index_statement(
                false,
                "CREATE INDEX idx_users_email ON users (email);",
                2,
                0,
            )],
        );
        let catalog = catalog::standard();
        let plan = PlanBuilder::new(&catalog, PgVersion::V15).build(&file);
        assert_eq!(plan.violation_count, 0);
    }
}
