//! # pgvigil-ast
//!
//! DDL statement tree and parse-boundary types for pgvigil.
//!
//! This crate defines:
//! - The tagged statement tree produced by the external SQL parser
//! - Per-file input types (`ParsedFile`) and the parse-failure shape
//!   (`ParseFailure`) that upstream parsers report
//! - The target PostgreSQL version (`PgVersion`) that drives
//!   version-sensitive analysis
//!
//! The SQL-to-tree parser itself is an external collaborator: pgvigil
//! consumes these nodes, it never produces them from raw SQL.

pub mod severity;
pub mod source;
pub mod stmt;
pub mod version;

pub use severity::Severity;
pub use source::{ParseFailure, ParseOutcome, ParsedFile, RawStatement};
pub use stmt::{
    AlterAction, AlterTable, Cluster, ColumnDef, ColumnDefault, ConstraintKind, CreateIndex,
    CreateTable, DropIndex, DropObject, ObjectKind, Reindex, ReindexTarget,
    RefreshMaterializedView, RenameTarget, SetParameter, Statement, Truncate, TxnOp, Vacuum,
};
pub use version::PgVersion;
