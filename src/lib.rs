//! # pgvigil
//!
//! Production-safety analysis for PostgreSQL schema migrations.
//!
//! pgvigil takes parsed DDL statements and reports, before they run
//! against a live database:
//! - The lock each statement takes and what it blocks
//! - A composite, auditable 0–100 risk score per statement
//! - Violations of a catalog of migration-safety rules, with inline
//!   suppression and deterministic auto-fixes
//! - A per-file execution plan with duration estimates and transaction
//!   tracking
//! - Cross-file ordering findings (duplicate versions, gaps, missing
//!   dependencies)
//!
//! pgvigil consumes statement trees from an external SQL parser and
//! emits structured data; it never executes SQL, never connects to a
//! database, and never formats output.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pgvigil::prelude::*;
//!
//! let config = VigilConfig::from_file("pgvigil.toml")?;
//! let catalog = config.build_catalog();
//! let options = AnalyzeOptions::from_config(&config);
//!
//! // `outcomes` come from your SQL parser, one per migration file.
//! let report = analyze_batch(&outcomes, &catalog, &options);
//! for plan in &report.plans {
//!     println!("{}: {} ({} violations)",
//!         plan.path.display(), plan.overall_risk, plan.violation_count);
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Statement tree and parse-boundary types.
pub mod ast {
    pub use pgvigil_ast::*;
}

/// Lock classification, risk scoring, rules, plans, and fixes.
pub mod analyze {
    pub use pgvigil_analyze::*;
}

/// Cross-file ordering validation.
pub mod order {
    pub use pgvigil_order::*;
}

pub mod config;
pub mod report;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::analyze::{
        catalog, ExecutionPlan, PlanBuilder, RiskLevel, RuleCatalog, Violation,
    };
    pub use crate::ast::{ParseOutcome, ParsedFile, PgVersion, Severity};
    pub use crate::config::VigilConfig;
    pub use crate::order::{validate, MigrationFile, OrderingIssue};
    pub use crate::report::{analyze_batch, analyze_file, AnalyzeOptions, BatchReport};
}

// Re-export key types at the crate root
pub use analyze::{AnalyzeError, ExecutionPlan, RiskLevel, RuleCatalog};
pub use config::{ConfigError, VigilConfig};
pub use report::{analyze_batch, analyze_file, AnalyzeOptions, BatchReport};
