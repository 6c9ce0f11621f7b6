//! Per-file summaries for ordering validation.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use pgvigil_ast::source::ParsedFile;
use pgvigil_ast::stmt::{AlterAction, ConstraintKind, ObjectKind, RenameTarget, Statement};

use crate::version::VersionToken;

/// What the ordering validator knows about one migration file.
///
/// Built once per file from statement inspection; independent of the
/// single-file lock/rule analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFile {
    /// Path of the migration file.
    pub path: PathBuf,
    /// Display name (final path component).
    pub display_name: String,
    /// Parsed version token.
    pub version: VersionToken,
    /// Tables this file creates.
    pub creates: BTreeSet<SmolStr>,
    /// Tables this file references without creating.
    pub references: BTreeSet<SmolStr>,
}

impl MigrationFile {
    /// Summarize a parsed file for ordering validation.
    pub fn from_parsed(file: &ParsedFile) -> Self {
        let display_name = file.display_name();
        let version = VersionToken::parse(&display_name);

        let mut creates = BTreeSet::new();
        let mut references = BTreeSet::new();

        for raw in &file.statements {
            match &raw.statement {
                Statement::CreateTable(ct) => {
                    creates.insert(ct.name.clone());
                    for constraint in &ct.constraints {
                        if let ConstraintKind::ForeignKey { referenced_table } = constraint {
                            references.insert(referenced_table.clone());
                        }
                    }
                }
                Statement::CreateIndex(ci) => {
                    references.insert(ci.table.clone());
                }
                Statement::AlterTable(at) => {
                    references.insert(at.table.clone());
                    for action in &at.actions {
                        if let AlterAction::AddConstraint {
                            constraint: ConstraintKind::ForeignKey { referenced_table },
                            ..
                        } = action
                        {
                            references.insert(referenced_table.clone());
                        }
                    }
                }
                Statement::Rename(RenameTarget::Table { table, .. })
                | Statement::Rename(RenameTarget::Column { table, .. }) => {
                    references.insert(table.clone());
                }
                Statement::DropObject(d) if d.kind == ObjectKind::Table => {
                    references.extend(d.names.iter().cloned());
                }
                Statement::Truncate(t) => {
                    references.extend(t.tables.iter().cloned());
                }
                Statement::Cluster(c) => {
                    references.extend(c.table.iter().cloned());
                }
                Statement::Vacuum(v) => {
                    references.extend(v.tables.iter().cloned());
                }
                _ => {}
            }
        }

        // A table created here is not an external reference, whatever
        // else the file does with it.
        for created in &creates {
            references.remove(created);
        }

        Self {
            path: file.path.clone(),
            display_name,
            version,
            creates,
            references,
        }
    }

    /// Build a summary directly, for callers with their own extraction.
    pub fn new(
        path: impl Into<PathBuf>,
        creates: BTreeSet<SmolStr>,
        references: BTreeSet<SmolStr>,
    ) -> Self {
        let path = path.into();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let version = VersionToken::parse(&display_name);
        Self {
            path,
            display_name,
            version,
            creates,
            references,
        }
    }
}
