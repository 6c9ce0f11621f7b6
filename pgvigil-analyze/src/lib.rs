//! # pgvigil-analyze
//!
//! The single-file analysis pipeline for pgvigil.
//!
//! This crate provides, in dependency order:
//! - **Lock classification** ([`lock`]) — statement → lock descriptor
//! - **Risk scoring** ([`risk`]) — lock + optional telemetry → 0–100 score
//! - **Rule engine** ([`rules`]) — an ordered catalog of safety checks
//! - **Inline suppression** ([`suppress`]) — comment directives that drop
//!   violations
//! - **Plan building** ([`plan`]) — the per-file execution plan
//! - **Auto-fixing** ([`fix`]) — deterministic rewrites for a fixed rule
//!   subset
//!
//! Everything here is synchronous, pure per file, and free of shared
//! state; callers may analyze many files in parallel with no
//! coordination.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgvigil_analyze::{plan::PlanBuilder, rules::catalog};
//! use pgvigil_ast::PgVersion;
//!
//! let rules = catalog::standard();
//! let plan = PlanBuilder::new(&rules, PgVersion::V15).build(&parsed_file);
//! println!("{} violations, {}", plan.violation_count, plan.overall_risk);
//! ```

pub mod context;
pub mod error;
pub mod fix;
pub mod lock;
pub mod plan;
pub mod risk;
pub mod rules;
pub mod suppress;

// Re-exports
pub use context::{AffectedQuery, ProductionContext, TableStats};
pub use error::{AnalyzeError, AnalyzeResult};
pub use fix::{fix, is_fixable, FixOutcome, FIXABLE_RULES};
pub use lock::{classify, LockClassification, LockLevel};
pub use plan::{DurationClass, ExecutionPlan, PlanBuilder, PlanStatement, TransactionSummary};
pub use risk::{score, RiskFactor, RiskLevel, RiskScore, LARGE_TABLE_ROWS};
pub use rules::{
    catalog, CheckError, Rule, RuleCatalog, RuleContext, RuleEngine, RuleFault,
    StatementFindings, Violation,
};
pub use suppress::{parse_directives, DirectiveScope, DisableDirective, RuleSelection};
