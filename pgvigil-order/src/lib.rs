//! # pgvigil-order
//!
//! Cross-file ordering and dependency validation for pgvigil.
//!
//! This crate checks a collection of migration files — not the
//! statements inside one file — for version-scheme problems:
//! duplicate versions, out-of-order listings, sequence gaps,
//! unrecognized names, and references to tables no earlier file
//! creates. Every finding is a reportable [`OrderingIssue`], never an
//! error; it composes with the single-file analysis only at the
//! reporting layer.

pub mod file;
pub mod validate;
pub mod version;

// Re-exports
pub use file::MigrationFile;
pub use validate::{validate, IssueKind, OrderingIssue};
pub use version::VersionToken;
