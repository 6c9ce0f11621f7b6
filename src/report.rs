//! Top-level analysis entry points and batch reporting.
//!
//! [`analyze_file`] is the per-file entry: it refuses files the
//! upstream parser could not read and otherwise produces an
//! [`ExecutionPlan`]. [`analyze_batch`] runs many files, isolating
//! per-file failures, and composes the cross-file ordering findings
//! into one report — the only place single-file analysis and ordering
//! validation meet.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

use pgvigil_analyze::context::ProductionContext;
use pgvigil_analyze::error::{AnalyzeError, AnalyzeResult};
use pgvigil_analyze::plan::{ExecutionPlan, PlanBuilder};
use pgvigil_analyze::risk::RiskLevel;
use pgvigil_analyze::rules::RuleCatalog;
use pgvigil_ast::severity::Severity;
use pgvigil_ast::source::{ParseFailure, ParseOutcome};
use pgvigil_ast::version::PgVersion;
use pgvigil_order::{validate, MigrationFile, OrderingIssue};

use crate::config::VigilConfig;

/// Options threading configuration into the analysis pipeline.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Target PostgreSQL version.
    pub pg_version: PgVersion,
    /// Per-rule severity overrides applied to reported violations.
    pub severity_overrides: HashMap<SmolStr, Severity>,
    /// Production telemetry; absent outside the paid tier.
    pub production: Option<ProductionContext>,
}

impl AnalyzeOptions {
    /// Options with defaults for everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive options from a loaded configuration.
    pub fn from_config(config: &VigilConfig) -> Self {
        Self {
            pg_version: config.pg_version(),
            severity_overrides: config
                .rules
                .severity
                .iter()
                .map(|(id, severity)| (SmolStr::new(id), *severity))
                .collect(),
            production: None,
        }
    }

    /// Set the target PostgreSQL version.
    pub fn pg_version(mut self, version: PgVersion) -> Self {
        self.pg_version = version;
        self
    }

    /// Attach production telemetry.
    pub fn with_production(mut self, production: ProductionContext) -> Self {
        self.production = Some(production);
        self
    }
}

/// Analyze one parser outcome into an execution plan.
///
/// A [`ParseOutcome::Failed`] input is refused: the error carries the
/// file path and the raw parser error list unchanged, and nothing is
/// analyzed.
pub fn analyze_file(
    outcome: &ParseOutcome,
    catalog: &RuleCatalog,
    options: &AnalyzeOptions,
) -> AnalyzeResult<ExecutionPlan> {
    let file = match outcome {
        ParseOutcome::Parsed(file) => file,
        ParseOutcome::Failed(failure) => return Err(AnalyzeError::parse_failed(failure)),
    };

    let mut builder = PlanBuilder::new(catalog, options.pg_version);
    if let Some(production) = &options.production {
        builder = builder.with_production(production);
    }

    let mut plan = builder.build(file);
    apply_severity_overrides(&mut plan, &options.severity_overrides);
    Ok(plan)
}

/// Remap violation severities per configuration.
fn apply_severity_overrides(plan: &mut ExecutionPlan, overrides: &HashMap<SmolStr, Severity>) {
    if overrides.is_empty() {
        return;
    }
    for statement in &mut plan.statements {
        for violation in &mut statement.violations {
            if let Some(severity) = overrides.get(&violation.rule_id) {
                violation.severity = *severity;
            }
        }
    }
}

/// The combined result of analyzing a set of migration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Per-file plans, in supplied order, for files that parsed.
    pub plans: Vec<ExecutionPlan>,
    /// Files the parser could not read; analysis of the rest proceeded.
    pub failures: Vec<ParseFailure>,
    /// Cross-file ordering findings.
    pub ordering_issues: Vec<OrderingIssue>,
    /// Total violations across all plans.
    pub total_violations: usize,
    /// The worst per-file risk level in the batch.
    pub overall_risk: RiskLevel,
}

/// Analyze a batch of parser outcomes.
///
/// Per-file parse failures are recorded and never abort the remaining
/// files. Ordering validation runs over the files that parsed, in the
/// order supplied.
pub fn analyze_batch(
    outcomes: &[ParseOutcome],
    catalog: &RuleCatalog,
    options: &AnalyzeOptions,
) -> BatchReport {
    let mut plans = Vec::new();
    let mut failures = Vec::new();
    let mut summaries = Vec::new();

    for outcome in outcomes {
        match outcome {
            ParseOutcome::Parsed(file) => {
                summaries.push(MigrationFile::from_parsed(file));
                // The outcome is known parsed, so this cannot fail.
                if let Ok(plan) = analyze_file(outcome, catalog, options) {
                    plans.push(plan);
                }
            }
            ParseOutcome::Failed(failure) => {
                debug!(path = %failure.path.display(), "skipping unparseable file");
                failures.push(failure.clone());
            }
        }
    }

    let ordering_issues = validate(&summaries);
    let total_violations = plans.iter().map(|p| p.violation_count).sum();
    let overall_risk = plans
        .iter()
        .map(|p| p.overall_risk)
        .max()
        .unwrap_or(RiskLevel::Green);

    BatchReport {
        plans,
        failures,
        ordering_issues,
        total_violations,
        overall_risk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgvigil_analyze::rules::catalog;
    use pgvigil_ast::source::{ParsedFile, RawStatement};
    use pgvigil_ast::stmt::{CreateIndex, Statement};

    fn parsed_index_file(name: &str) -> ParseOutcome {
        let sql = "CREATE INDEX idx_users_email ON users (email);";
        ParseOutcome::Parsed(ParsedFile::new(
            name,
            sql,
            vec![RawStatement::new(
                Statement::CreateIndex(CreateIndex {
                    name: Some("idx_users_email".into()),
                    table: "users".into(),
                    columns: vec!["email".into()],
                    concurrently: false,
                    unique: false,
                    access_method: None,
                }),
                sql,
                1,
                0,
            )],
        ))
    }

    #[test]
    fn test_analyze_file_refuses_parse_failures() {
        let outcome = ParseOutcome::Failed(ParseFailure::new(
            "bad.sql",
            vec!["syntax error".to_string()],
        ));
        let rules = catalog::standard();
        let result = analyze_file(&outcome, &rules, &AnalyzeOptions::new());
        let err = result.unwrap_err();
        let AnalyzeError::ParseFailed { path, errors, .. } = err;
        assert_eq!(path, std::path::PathBuf::from("bad.sql"));
        assert_eq!(errors, vec!["syntax error".to_string()]);
    }

    #[test]
    fn test_severity_override_applies() {
        let rules = catalog::standard();
        let mut options = AnalyzeOptions::new();
        options.severity_overrides.insert(
            SmolStr::new("require-concurrent-index-creation"),
            Severity::Warning,
        );

        let plan = analyze_file(&parsed_index_file("001_a.sql"), &rules, &options).unwrap();
        let violation = plan.statements[0]
            .violations
            .iter()
            .find(|v| v.rule_id == "require-concurrent-index-creation")
            .expect("violation present");
        assert_eq!(violation.severity, Severity::Warning);
    }

    #[test]
    fn test_batch_isolates_failures() {
        let outcomes = vec![
            parsed_index_file("001_a.sql"),
            ParseOutcome::Failed(ParseFailure::new("002_bad.sql", vec!["boom".to_string()])),
            parsed_index_file("003_c.sql"),
        ];
        let rules = catalog::standard();
        let report = analyze_batch(&outcomes, &rules, &AnalyzeOptions::new());

        assert_eq!(report.plans.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.total_violations >= 2);
        assert_eq!(report.overall_risk, RiskLevel::Yellow);
    }
}
