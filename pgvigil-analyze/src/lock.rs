//! Lock classification for DDL statements.
//!
//! [`classify`] maps every statement shape to the table lock it acquires,
//! what that lock blocks, and whether the lock is held for a full table
//! scan or rewrite. The mapping encodes the documented PostgreSQL lock
//! table per statement kind; it is total — an unmodeled shape gets the
//! most conservative classification, never an error.

use pgvigil_ast::stmt::{
    AlterAction, ColumnDefault, ConstraintKind, ObjectKind, Statement, TxnOp,
};
use pgvigil_ast::version::PgVersion;
use serde::{Deserialize, Serialize};

/// PostgreSQL table lock strengths taken by DDL, weakest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockLevel {
    /// `ACCESS SHARE` — taken by plain reads; conflicts only with `ACCESS EXCLUSIVE`.
    AccessShare,
    /// `ROW EXCLUSIVE` — taken by writes.
    RowExclusive,
    /// `SHARE UPDATE EXCLUSIVE` — taken by `VACUUM`, `CREATE INDEX CONCURRENTLY`,
    /// `VALIDATE CONSTRAINT`; lets reads and writes proceed.
    ShareUpdateExclusive,
    /// `SHARE` — taken by `CREATE INDEX`; blocks writes, not reads.
    Share,
    /// `SHARE ROW EXCLUSIVE` — taken by `ADD FOREIGN KEY`; blocks writes.
    ShareRowExclusive,
    /// `ACCESS EXCLUSIVE` — taken by most `ALTER TABLE` forms; blocks everything.
    AccessExclusive,
}

impl std::fmt::Display for LockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AccessShare => "ACCESS SHARE",
            Self::RowExclusive => "ROW EXCLUSIVE",
            Self::ShareUpdateExclusive => "SHARE UPDATE EXCLUSIVE",
            Self::Share => "SHARE",
            Self::ShareRowExclusive => "SHARE ROW EXCLUSIVE",
            Self::AccessExclusive => "ACCESS EXCLUSIVE",
        };
        write!(f, "{name}")
    }
}

/// What a statement's lock does to concurrent traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockClassification {
    /// The lock strength acquired on the target relation.
    pub level: LockLevel,
    /// Concurrent `SELECT`s wait.
    pub blocks_reads: bool,
    /// Concurrent `INSERT`/`UPDATE`/`DELETE`s wait.
    pub blocks_writes: bool,
    /// The lock is held for a full table scan or rewrite rather than a
    /// brief catalog update.
    pub long_held: bool,
}

impl LockClassification {
    /// A brief lock at the given level, with blocking derived from the
    /// documented conflict matrix.
    pub fn brief(level: LockLevel) -> Self {
        Self {
            level,
            blocks_reads: level == LockLevel::AccessExclusive,
            blocks_writes: level >= LockLevel::Share,
            long_held: false,
        }
    }

    /// The same lock, held for a scan or rewrite.
    pub fn held_for_scan(mut self) -> Self {
        self.long_held = true;
        self
    }

    /// The conservative default for unmodeled statement shapes.
    pub fn conservative() -> Self {
        Self::brief(LockLevel::AccessExclusive)
    }
}

/// Classify the lock a statement acquires on the given PostgreSQL version.
///
/// Deterministic and total. `pg_version` refines version-sensitive cases:
/// `ADD COLUMN` with a constant default is a full rewrite below version 11
/// and metadata-only from 11 on.
pub fn classify(statement: &Statement, pg_version: PgVersion) -> LockClassification {
    use LockLevel::*;

    match statement {
        // The created table is empty; the lock matters only to catalogs.
        Statement::CreateTable(_) => LockClassification::brief(RowExclusive),

        Statement::CreateIndex(ci) => {
            if ci.concurrently {
                // Built in multiple non-exclusive passes; the lock itself
                // never blocks reads or writes.
                LockClassification::brief(ShareUpdateExclusive)
            } else {
                LockClassification::brief(Share).held_for_scan()
            }
        }

        Statement::DropIndex(di) => {
            if di.concurrently {
                LockClassification::brief(ShareUpdateExclusive)
            } else {
                LockClassification::brief(AccessExclusive)
            }
        }

        Statement::AlterTable(at) => {
            let mut strongest = LockClassification::brief(AccessShare);
            for action in &at.actions {
                let c = classify_alter_action(action, pg_version);
                if c.level > strongest.level {
                    strongest.level = c.level;
                }
                strongest.blocks_reads |= c.blocks_reads;
                strongest.blocks_writes |= c.blocks_writes;
                strongest.long_held |= c.long_held;
            }
            strongest
        }

        Statement::DropObject(d) => match d.kind {
            // DROP DATABASE takes no table lock but kills every session;
            // the conservative classification is the honest one.
            ObjectKind::Database => LockClassification::conservative(),
            _ => LockClassification::brief(AccessExclusive),
        },

        Statement::Rename(_) => LockClassification::brief(AccessExclusive),

        Statement::Cluster(_) => LockClassification::brief(AccessExclusive).held_for_scan(),

        Statement::Vacuum(v) => {
            if v.full {
                LockClassification::brief(AccessExclusive).held_for_scan()
            } else {
                LockClassification::brief(ShareUpdateExclusive)
            }
        }

        Statement::Reindex(r) => {
            if r.concurrently {
                LockClassification::brief(ShareUpdateExclusive)
            } else {
                // Holds ACCESS EXCLUSIVE on the index, SHARE on the table.
                LockClassification::brief(Share).held_for_scan()
            }
        }

        Statement::Truncate(_) => LockClassification::brief(AccessExclusive),

        Statement::RefreshMaterializedView(r) => {
            if r.concurrently {
                // Reads keep running; the refresh applies a diff under an
                // EXCLUSIVE-strength lock that still blocks writers.
                LockClassification {
                    level: ShareRowExclusive,
                    blocks_reads: false,
                    blocks_writes: true,
                    long_held: true,
                }
            } else {
                LockClassification::brief(AccessExclusive).held_for_scan()
            }
        }

        Statement::TransactionControl {
            op: TxnOp::Begin | TxnOp::Commit | TxnOp::Rollback,
        } => {
            LockClassification {
                level: AccessShare,
                blocks_reads: false,
                blocks_writes: false,
                long_held: false,
            }
        }

        Statement::SetParameter(_) => LockClassification {
            level: AccessShare,
            blocks_reads: false,
            blocks_writes: false,
            long_held: false,
        },

        Statement::Other { .. } => LockClassification::conservative(),
    }
}

/// Classify a single `ALTER TABLE` action.
fn classify_alter_action(action: &AlterAction, pg_version: PgVersion) -> LockClassification {
    use LockLevel::*;

    match action {
        AlterAction::AddColumn { column } => match &column.default {
            None => LockClassification::brief(AccessExclusive),
            Some(ColumnDefault::Constant(_)) => {
                if pg_version.at_least(PgVersion::V11) {
                    // Constant defaults are stored in the catalog from 11 on.
                    LockClassification::brief(AccessExclusive)
                } else {
                    LockClassification::brief(AccessExclusive).held_for_scan()
                }
            }
            // Volatile defaults are evaluated per row on every version.
            Some(ColumnDefault::Expression(_)) => {
                LockClassification::brief(AccessExclusive).held_for_scan()
            }
        },

        AlterAction::SetNotNull { .. } => {
            // Scans the whole table to prove the invariant.
            LockClassification::brief(AccessExclusive).held_for_scan()
        }

        AlterAction::ChangeType { .. } => {
            LockClassification::brief(AccessExclusive).held_for_scan()
        }

        AlterAction::AddConstraint {
            constraint,
            not_valid,
            ..
        } => match constraint {
            ConstraintKind::ForeignKey { .. } => {
                let c = LockClassification {
                    level: ShareRowExclusive,
                    blocks_reads: false,
                    blocks_writes: true,
                    long_held: false,
                };
                if *not_valid { c } else { c.held_for_scan() }
            }
            ConstraintKind::Check { .. } => {
                let c = LockClassification::brief(AccessExclusive);
                if *not_valid { c } else { c.held_for_scan() }
            }
            ConstraintKind::Unique { using_index, .. }
            | ConstraintKind::PrimaryKey { using_index, .. } => {
                if using_index.is_some() {
                    LockClassification::brief(AccessExclusive)
                } else {
                    // Builds the backing index under the table lock.
                    LockClassification::brief(AccessExclusive).held_for_scan()
                }
            }
        },

        AlterAction::ValidateConstraint { .. } => {
            LockClassification::brief(ShareUpdateExclusive).held_for_scan()
        }

        AlterAction::DropColumn { .. }
        | AlterAction::DropNotNull { .. }
        | AlterAction::SetDefault { .. }
        | AlterAction::DropDefault { .. }
        | AlterAction::DropConstraint { .. } => LockClassification::brief(AccessExclusive),

        AlterAction::Other { .. } => LockClassification::conservative(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgvigil_ast::stmt::{AlterTable, ColumnDef, CreateIndex, Vacuum};
    use smol_str::SmolStr;

    fn create_index(concurrently: bool) -> Statement {
        Statement::CreateIndex(CreateIndex {
            name: Some("idx_users_email".into()),
            table: "users".into(),
            columns: vec!["email".into()],
            concurrently,
            unique: false,
            access_method: None,
        })
    }

    fn add_column(default: Option<ColumnDefault>) -> Statement {
        Statement::AlterTable(AlterTable {
            table: "users".into(),
            only: false,
            actions: vec![AlterAction::AddColumn {
                column: ColumnDef {
                    name: "status".into(),
                    type_name: "text".into(),
                    not_null: false,
                    default,
                },
            }],
        })
    }

    #[test]
    fn test_create_index_blocks_writes_and_is_long_held() {
        let c = classify(&create_index(false), PgVersion::V15);
        assert_eq!(c.level, LockLevel::Share);
        assert!(!c.blocks_reads);
        assert!(c.blocks_writes);
        assert!(c.long_held);
    }

    #[test]
    fn test_create_index_concurrently_blocks_nothing() {
        let c = classify(&create_index(true), PgVersion::V15);
        assert_eq!(c.level, LockLevel::ShareUpdateExclusive);
        assert!(!c.blocks_reads);
        assert!(!c.blocks_writes);
        assert!(!c.long_held);
    }

    #[test]
    fn test_add_column_constant_default_is_metadata_only_on_11() {
        let stmt = add_column(Some(ColumnDefault::Constant("0".into())));
        assert!(!classify(&stmt, PgVersion::V11).long_held);
        assert!(classify(&stmt, PgVersion::V10).long_held);
    }

    #[test]
    fn test_add_column_volatile_default_rewrites_everywhere() {
        let stmt = add_column(Some(ColumnDefault::Expression("now()".into())));
        assert!(classify(&stmt, PgVersion::V16).long_held);
    }

    #[test]
    fn test_set_not_null_scans() {
        let stmt = Statement::AlterTable(AlterTable {
            table: "users".into(),
            only: false,
            actions: vec![AlterAction::SetNotNull {
                column: "email".into(),
            }],
        });
        let c = classify(&stmt, PgVersion::V15);
        assert_eq!(c.level, LockLevel::AccessExclusive);
        assert!(c.long_held);
    }

    #[test]
    fn test_validate_constraint_keeps_writes_running() {
        let stmt = Statement::AlterTable(AlterTable {
            table: "orders".into(),
            only: false,
            actions: vec![AlterAction::ValidateConstraint {
                name: "orders_total_check".into(),
            }],
        });
        let c = classify(&stmt, PgVersion::V15);
        assert_eq!(c.level, LockLevel::ShareUpdateExclusive);
        assert!(!c.blocks_writes);
        assert!(c.long_held);
    }

    #[test]
    fn test_vacuum_full_vs_plain() {
        let full = Statement::Vacuum(Vacuum {
            full: true,
            tables: vec!["users".into()],
        });
        let plain = Statement::Vacuum(Vacuum {
            full: false,
            tables: vec!["users".into()],
        });
        assert!(classify(&full, PgVersion::V15).long_held);
        assert_eq!(
            classify(&full, PgVersion::V15).level,
            LockLevel::AccessExclusive
        );
        assert!(!classify(&plain, PgVersion::V15).blocks_writes);
    }

    #[test]
    fn test_unmodeled_shape_gets_conservative_default() {
        let stmt = Statement::Other {
            tag: SmolStr::new("grant"),
        };
        let c = classify(&stmt, PgVersion::V15);
        assert_eq!(c.level, LockLevel::AccessExclusive);
        assert!(c.blocks_reads);
        assert!(c.blocks_writes);
        assert!(!c.long_held);
    }

    #[test]
    fn test_alter_table_takes_strongest_action() {
        let stmt = Statement::AlterTable(AlterTable {
            table: "users".into(),
            only: false,
            actions: vec![
                AlterAction::DropDefault {
                    column: "status".into(),
                },
                AlterAction::SetNotNull {
                    column: "email".into(),
                },
            ],
        });
        let c = classify(&stmt, PgVersion::V15);
        assert_eq!(c.level, LockLevel::AccessExclusive);
        assert!(c.long_held);
    }
}
