//! Tagged statement tree for PostgreSQL DDL.
//!
//! Every statement shape the analyzer understands is a closed variant of
//! [`Statement`]; shapes the external parser recognizes but pgvigil does
//! not model arrive as [`Statement::Other`] and receive the most
//! conservative treatment downstream. Adding a new shape is a
//! compile-time-checked decision: the lock classifier and every rule
//! match exhaustively.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A parsed DDL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Statement {
    /// `CREATE TABLE`.
    CreateTable(CreateTable),
    /// `CREATE [UNIQUE] INDEX [CONCURRENTLY]`.
    CreateIndex(CreateIndex),
    /// `DROP INDEX [CONCURRENTLY]`.
    DropIndex(DropIndex),
    /// `ALTER TABLE` with one or more actions.
    AlterTable(AlterTable),
    /// `DROP TABLE | VIEW | MATERIALIZED VIEW | SCHEMA | DATABASE | TYPE | SEQUENCE`.
    DropObject(DropObject),
    /// A rename of a table, column, or index.
    Rename(RenameTarget),
    /// `CLUSTER`.
    Cluster(Cluster),
    /// `VACUUM [FULL]`.
    Vacuum(Vacuum),
    /// `REINDEX`.
    Reindex(Reindex),
    /// `TRUNCATE`.
    Truncate(Truncate),
    /// `REFRESH MATERIALIZED VIEW [CONCURRENTLY]`.
    RefreshMaterializedView(RefreshMaterializedView),
    /// `BEGIN`, `COMMIT`, or `ROLLBACK`.
    TransactionControl {
        /// The transaction operation.
        op: TxnOp,
    },
    /// `SET [LOCAL] parameter = value`.
    SetParameter(SetParameter),
    /// A statement shape pgvigil does not model (DML, GRANT, COMMENT, ...).
    ///
    /// `tag` is the parser's name for the shape. The lock classifier maps
    /// this to the conservative default.
    Other {
        /// Parser tag for the unmodeled shape.
        tag: SmolStr,
    },
}

impl Statement {
    /// Short tag for logging and diagnostics.
    pub fn tag(&self) -> &str {
        match self {
            Self::CreateTable(_) => "create-table",
            Self::CreateIndex(_) => "create-index",
            Self::DropIndex(_) => "drop-index",
            Self::AlterTable(_) => "alter-table",
            Self::DropObject(_) => "drop-object",
            Self::Rename(_) => "rename",
            Self::Cluster(_) => "cluster",
            Self::Vacuum(_) => "vacuum",
            Self::Reindex(_) => "reindex",
            Self::Truncate(_) => "truncate",
            Self::RefreshMaterializedView(_) => "refresh-materialized-view",
            Self::TransactionControl { .. } => "transaction-control",
            Self::SetParameter(_) => "set-parameter",
            Self::Other { tag } => tag.as_str(),
        }
    }

    /// Names of the relations this statement touches.
    ///
    /// Used by the plan builder to report affected relations and by the
    /// paid-tier rules to look up production statistics. Referenced-only
    /// relations (e.g. the target of a foreign key) are included.
    pub fn target_relations(&self) -> Vec<SmolStr> {
        match self {
            Self::CreateTable(ct) => {
                let mut names = vec![ct.name.clone()];
                for constraint in &ct.constraints {
                    if let ConstraintKind::ForeignKey { referenced_table } = constraint {
                        names.push(referenced_table.clone());
                    }
                }
                names
            }
            Self::CreateIndex(ci) => vec![ci.table.clone()],
            Self::DropIndex(di) => di.names.clone(),
            Self::AlterTable(at) => {
                let mut names = vec![at.table.clone()];
                for action in &at.actions {
                    if let AlterAction::AddConstraint {
                        constraint: ConstraintKind::ForeignKey { referenced_table },
                        ..
                    } = action
                    {
                        names.push(referenced_table.clone());
                    }
                }
                names
            }
            Self::DropObject(d) => d.names.clone(),
            Self::Rename(r) => vec![r.relation().clone()],
            Self::Cluster(c) => c.table.iter().cloned().collect(),
            Self::Vacuum(v) => v.tables.clone(),
            Self::Reindex(r) => vec![r.name.clone()],
            Self::Truncate(t) => t.tables.clone(),
            Self::RefreshMaterializedView(r) => vec![r.name.clone()],
            Self::TransactionControl { .. } | Self::SetParameter(_) | Self::Other { .. } => vec![],
        }
    }
}

/// A `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTable {
    /// Table name.
    pub name: SmolStr,
    /// Column definitions.
    pub columns: Vec<ColumnDef>,
    /// Table-level constraints.
    #[serde(default)]
    pub constraints: Vec<ConstraintKind>,
    /// `IF NOT EXISTS` was present.
    #[serde(default)]
    pub if_not_exists: bool,
}

/// A column definition inside `CREATE TABLE` or `ADD COLUMN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: SmolStr,
    /// Type name as written (`bigint`, `varchar(255)`, ...).
    pub type_name: SmolStr,
    /// `NOT NULL` was present.
    #[serde(default)]
    pub not_null: bool,
    /// Default expression, if any.
    #[serde(default)]
    pub default: Option<ColumnDefault>,
}

/// The default value of a column.
///
/// The distinction matters for `ADD COLUMN`: from PostgreSQL 11 a
/// constant default is stored as metadata, while a volatile expression
/// still forces a full table rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "kebab-case")]
pub enum ColumnDefault {
    /// A literal constant (`0`, `'pending'`, `false`).
    Constant(String),
    /// An expression that must be evaluated per row (`now()`, `uuid_generate_v4()`).
    Expression(String),
}

/// A `CREATE INDEX` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndex {
    /// Index name; `None` when left to the server.
    pub name: Option<SmolStr>,
    /// Table the index is built on.
    pub table: SmolStr,
    /// Indexed columns or expressions, as written.
    pub columns: Vec<SmolStr>,
    /// `CONCURRENTLY` was present.
    #[serde(default)]
    pub concurrently: bool,
    /// `UNIQUE` was present.
    #[serde(default)]
    pub unique: bool,
    /// Access method from `USING` (`btree`, `gin`, ...), if written.
    #[serde(default)]
    pub access_method: Option<SmolStr>,
}

/// A `DROP INDEX` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropIndex {
    /// Index names being dropped.
    pub names: Vec<SmolStr>,
    /// `CONCURRENTLY` was present.
    #[serde(default)]
    pub concurrently: bool,
    /// `IF EXISTS` was present.
    #[serde(default)]
    pub if_exists: bool,
}

/// An `ALTER TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterTable {
    /// Target table.
    pub table: SmolStr,
    /// Actions, in written order.
    pub actions: Vec<AlterAction>,
    /// `ONLY` was present (no inheritance recursion).
    #[serde(default)]
    pub only: bool,
}

/// One action inside an `ALTER TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum AlterAction {
    /// `ADD COLUMN`.
    AddColumn {
        /// The column being added.
        column: ColumnDef,
    },
    /// `DROP COLUMN`.
    DropColumn {
        /// Column name.
        column: SmolStr,
    },
    /// `ALTER COLUMN ... SET NOT NULL`.
    SetNotNull {
        /// Column name.
        column: SmolStr,
    },
    /// `ALTER COLUMN ... DROP NOT NULL`.
    DropNotNull {
        /// Column name.
        column: SmolStr,
    },
    /// `ALTER COLUMN ... SET DEFAULT`.
    SetDefault {
        /// Column name.
        column: SmolStr,
        /// The new default.
        default: ColumnDefault,
    },
    /// `ALTER COLUMN ... DROP DEFAULT`.
    DropDefault {
        /// Column name.
        column: SmolStr,
    },
    /// `ALTER COLUMN ... TYPE`.
    ChangeType {
        /// Column name.
        column: SmolStr,
        /// New type name as written.
        type_name: SmolStr,
    },
    /// `ADD CONSTRAINT`.
    AddConstraint {
        /// Constraint name; `None` when left to the server.
        name: Option<SmolStr>,
        /// The constraint body.
        constraint: ConstraintKind,
        /// `NOT VALID` was present.
        #[serde(default)]
        not_valid: bool,
    },
    /// `VALIDATE CONSTRAINT`.
    ValidateConstraint {
        /// Constraint name.
        name: SmolStr,
    },
    /// `DROP CONSTRAINT`.
    DropConstraint {
        /// Constraint name.
        name: SmolStr,
    },
    /// An alter action pgvigil does not model (`SET STORAGE`, ...).
    Other {
        /// Parser tag for the unmodeled action.
        tag: SmolStr,
    },
}

/// The body of a table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "constraint", rename_all = "kebab-case")]
pub enum ConstraintKind {
    /// `FOREIGN KEY ... REFERENCES`.
    ForeignKey {
        /// The referenced table.
        referenced_table: SmolStr,
    },
    /// `UNIQUE`, optionally attached to an existing index.
    Unique {
        /// Constrained columns.
        columns: Vec<SmolStr>,
        /// Index name from `USING INDEX`, if written.
        #[serde(default)]
        using_index: Option<SmolStr>,
    },
    /// `PRIMARY KEY`, optionally attached to an existing index.
    PrimaryKey {
        /// Key columns.
        columns: Vec<SmolStr>,
        /// Index name from `USING INDEX`, if written.
        #[serde(default)]
        using_index: Option<SmolStr>,
    },
    /// `CHECK (expression)`.
    Check {
        /// The check expression, as written.
        expression: String,
    },
}

/// A `DROP <object>` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropObject {
    /// What kind of object is dropped.
    pub kind: ObjectKind,
    /// Object names.
    pub names: Vec<SmolStr>,
    /// `CASCADE` was present.
    #[serde(default)]
    pub cascade: bool,
    /// `IF EXISTS` was present.
    #[serde(default)]
    pub if_exists: bool,
}

/// Object kinds accepted by `DROP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    /// A table.
    Table,
    /// A view.
    View,
    /// A materialized view.
    MaterializedView,
    /// A schema.
    Schema,
    /// A database.
    Database,
    /// A composite or enum type.
    Type,
    /// A sequence.
    Sequence,
}

/// A rename of a table, column, or index.
///
/// PostgreSQL spells these as `ALTER TABLE ... RENAME ...` /
/// `ALTER INDEX ... RENAME TO ...`; the parser surfaces them as a
/// dedicated statement kind because their safety profile differs from
/// other alter actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "kebab-case")]
pub enum RenameTarget {
    /// `ALTER TABLE ... RENAME TO`.
    Table {
        /// Current table name.
        table: SmolStr,
        /// New table name.
        to: SmolStr,
    },
    /// `ALTER TABLE ... RENAME COLUMN ... TO`.
    Column {
        /// Owning table.
        table: SmolStr,
        /// Current column name.
        column: SmolStr,
        /// New column name.
        to: SmolStr,
    },
    /// `ALTER INDEX ... RENAME TO`.
    Index {
        /// Current index name.
        index: SmolStr,
        /// New index name.
        to: SmolStr,
    },
}

impl RenameTarget {
    /// The relation the rename operates on.
    pub fn relation(&self) -> &SmolStr {
        match self {
            Self::Table { table, .. } | Self::Column { table, .. } => table,
            Self::Index { index, .. } => index,
        }
    }
}

/// A `CLUSTER` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Target table; `None` re-clusters everything previously clustered.
    pub table: Option<SmolStr>,
    /// Index to cluster on, if written.
    #[serde(default)]
    pub index: Option<SmolStr>,
}

/// A `VACUUM` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vacuum {
    /// `FULL` was present.
    #[serde(default)]
    pub full: bool,
    /// Target tables; empty means the whole database.
    #[serde(default)]
    pub tables: Vec<SmolStr>,
}

/// A `REINDEX` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reindex {
    /// What is being reindexed.
    pub target: ReindexTarget,
    /// Name of the index, table, schema, or database.
    pub name: SmolStr,
    /// `CONCURRENTLY` was present.
    #[serde(default)]
    pub concurrently: bool,
}

/// The target class of a `REINDEX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReindexTarget {
    /// `REINDEX INDEX`.
    Index,
    /// `REINDEX TABLE`.
    Table,
    /// `REINDEX SCHEMA`.
    Schema,
    /// `REINDEX DATABASE`.
    Database,
}

/// A `TRUNCATE` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncate {
    /// Target tables.
    pub tables: Vec<SmolStr>,
    /// `CASCADE` was present.
    #[serde(default)]
    pub cascade: bool,
    /// `RESTART IDENTITY` was present.
    #[serde(default)]
    pub restart_identity: bool,
}

/// A `REFRESH MATERIALIZED VIEW` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshMaterializedView {
    /// View name.
    pub name: SmolStr,
    /// `CONCURRENTLY` was present.
    #[serde(default)]
    pub concurrently: bool,
}

/// Transaction control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxnOp {
    /// `BEGIN` / `BEGIN TRANSACTION` / `START TRANSACTION`.
    Begin,
    /// `COMMIT` / `END`.
    Commit,
    /// `ROLLBACK`.
    Rollback,
}

/// A `SET [LOCAL] parameter = value` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetParameter {
    /// Parameter name (`lock_timeout`, `statement_timeout`, ...).
    pub name: SmolStr,
    /// Value as written, including quotes.
    pub value: String,
    /// `LOCAL` was present.
    #[serde(default)]
    pub local: bool,
}
