//! The standard rule catalog.
//!
//! Each rule is an independent value implementing [`Rule`]; the engine
//! never depends on a concrete rule. [`standard`] assembles the default
//! set in its documented order — callers are free to build their own
//! catalogs or subset this one.

use pgvigil_ast::severity::Severity;
use pgvigil_ast::source::RawStatement;
use pgvigil_ast::stmt::{
    AlterAction, ColumnDefault, ConstraintKind, ObjectKind, RenameTarget, Statement,
};
use pgvigil_ast::version::PgVersion;
use smol_str::SmolStr;

use crate::fix;
use crate::lock::classify;
use crate::risk::LARGE_TABLE_ROWS;
use crate::rules::{CheckError, Rule, RuleCatalog, RuleContext, Violation};

/// Calls per minute at which a table counts as high-traffic.
const HIGH_TRAFFIC_CALLS_PER_MINUTE: f64 = 100.0;

/// Assemble the standard catalog in its documented order.
pub fn standard() -> RuleCatalog {
    RuleCatalog::new()
        .with(Box::new(RequireConcurrentIndexCreation))
        .with(Box::new(RequireConcurrentIndexDrop))
        .with(Box::new(NoConcurrentIndexInTransaction))
        .with(Box::new(AddingNotNullableColumn))
        .with(Box::new(AddingColumnWithDefault))
        .with(Box::new(SettingColumnNotNull))
        .with(Box::new(AddingForeignKeyConstraint))
        .with(Box::new(AddingCheckConstraint))
        .with(Box::new(AddingUniqueConstraint))
        .with(Box::new(ChangingColumnType))
        .with(Box::new(RenamingColumn))
        .with(Box::new(RenamingTable))
        .with(Box::new(DroppingColumn))
        .with(Box::new(DroppingTable))
        .with(Box::new(BanDropDatabase))
        .with(Box::new(BanCluster))
        .with(Box::new(BanVacuumFull))
        .with(Box::new(RequireLockTimeout))
        .with(Box::new(RefreshMatviewBlocksReads))
        .with(Box::new(LockingHighTrafficTable))
        .with(Box::new(RewritingLargeTable))
}

/// Build a violation carrying the rule's identity at the context's line.
fn violation<R: Rule + ?Sized>(rule: &R, ctx: &RuleContext<'_>, message: String) -> Violation {
    Violation {
        rule_id: SmolStr::new(rule.id()),
        rule_name: SmolStr::new(rule.name()),
        severity: rule.severity(),
        message,
        line: ctx.line,
        safe_alternative: None,
    }
}

/// `CREATE INDEX` without `CONCURRENTLY` on a table with traffic.
pub struct RequireConcurrentIndexCreation;

impl Rule for RequireConcurrentIndexCreation {
    fn id(&self) -> &'static str {
        "require-concurrent-index-creation"
    }
    fn name(&self) -> &'static str {
        "Require concurrent index creation"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags CREATE INDEX without CONCURRENTLY on a table not created in the same migration."
    }
    fn rationale(&self) -> &'static str {
        "A plain CREATE INDEX holds a SHARE lock for the whole build, blocking every \
         INSERT, UPDATE and DELETE on the table until the index is complete."
    }
    fn doc_url(&self) -> Option<&'static str> {
        Some("https://github.com/pegasusheavy/pgvigil/blob/main/docs/rules/require-concurrent-index-creation.md")
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::CreateIndex(ci) = &statement.statement else {
            return Ok(None);
        };
        if ci.concurrently || ctx.relation_created_earlier(&ci.table) {
            return Ok(None);
        }

        let mut v = violation(
            self,
            ctx,
            format!(
                "creating index on `{}` without CONCURRENTLY blocks writes for the whole build",
                ci.table
            ),
        );
        v.safe_alternative = fix::insert_concurrently_into_create(ctx.sql);
        Ok(Some(v))
    }
}

/// `DROP INDEX` without `CONCURRENTLY`.
pub struct RequireConcurrentIndexDrop;

impl Rule for RequireConcurrentIndexDrop {
    fn id(&self) -> &'static str {
        "require-concurrent-index-drop"
    }
    fn name(&self) -> &'static str {
        "Require concurrent index drop"
    }
    fn severity(&self) -> Severity {
        Severity::Warning
    }
    fn description(&self) -> &'static str {
        "Flags DROP INDEX without CONCURRENTLY."
    }
    fn rationale(&self) -> &'static str {
        "A plain DROP INDEX takes ACCESS EXCLUSIVE on the table; under load even a \
         momentary exclusive lock queues behind long-running reads and stalls traffic."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::DropIndex(di) = &statement.statement else {
            return Ok(None);
        };
        if di.concurrently {
            return Ok(None);
        }

        let mut v = violation(
            self,
            ctx,
            "dropping an index without CONCURRENTLY takes ACCESS EXCLUSIVE on its table"
                .to_string(),
        );
        v.safe_alternative = fix::insert_concurrently_into_drop(ctx.sql);
        Ok(Some(v))
    }
}

/// `CONCURRENTLY` inside an explicit transaction block.
pub struct NoConcurrentIndexInTransaction;

impl Rule for NoConcurrentIndexInTransaction {
    fn id(&self) -> &'static str {
        "no-concurrent-index-in-transaction"
    }
    fn name(&self) -> &'static str {
        "No concurrent index operations in transactions"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags CREATE/DROP INDEX CONCURRENTLY and REINDEX CONCURRENTLY inside an open transaction."
    }
    fn rationale(&self) -> &'static str {
        "Concurrent index builds run in multiple internal transactions and fail outright \
         inside an explicit transaction block — the migration errors at deploy time."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let concurrent = match &statement.statement {
            Statement::CreateIndex(ci) => ci.concurrently,
            Statement::DropIndex(di) => di.concurrently,
            Statement::Reindex(r) => r.concurrently,
            _ => false,
        };
        if !concurrent || !ctx.is_inside_transaction() {
            return Ok(None);
        }

        Ok(Some(violation(
            self,
            ctx,
            "CONCURRENTLY cannot run inside a transaction block; this statement will fail"
                .to_string(),
        )))
    }
}

/// `ADD COLUMN ... NOT NULL` without a default.
pub struct AddingNotNullableColumn;

impl Rule for AddingNotNullableColumn {
    fn id(&self) -> &'static str {
        "adding-not-nullable-column"
    }
    fn name(&self) -> &'static str {
        "Adding a NOT NULL column without a default"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags ADD COLUMN ... NOT NULL with no DEFAULT on an existing table."
    }
    fn rationale(&self) -> &'static str {
        "Existing rows cannot satisfy the constraint, so the statement fails on any \
         non-empty table — usually in production, after it passed on an empty dev database."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::AlterTable(at) = &statement.statement else {
            return Ok(None);
        };
        if ctx.relation_created_earlier(&at.table) {
            return Ok(None);
        }
        for action in &at.actions {
            if let AlterAction::AddColumn { column } = action {
                if column.not_null && column.default.is_none() {
                    let mut v = violation(
                        self,
                        ctx,
                        format!(
                            "adding NOT NULL column `{}` without a default fails on any non-empty table",
                            column.name
                        ),
                    );
                    v.safe_alternative = Some(format!(
                        "ALTER TABLE {table} ADD COLUMN {col} {ty};\n\
                         -- backfill, then:\n\
                         ALTER TABLE {table} ALTER COLUMN {col} SET NOT NULL;",
                        table = at.table,
                        col = column.name,
                        ty = column.type_name,
                    ));
                    return Ok(Some(v));
                }
            }
        }
        Ok(None)
    }
}

/// `ADD COLUMN ... DEFAULT ...` that rewrites the table.
pub struct AddingColumnWithDefault;

impl Rule for AddingColumnWithDefault {
    fn id(&self) -> &'static str {
        "adding-column-with-default"
    }
    fn name(&self) -> &'static str {
        "Adding a column with a rewriting default"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags ADD COLUMN with a DEFAULT that forces a full table rewrite: any default \
         below PostgreSQL 11, volatile defaults on every version."
    }
    fn rationale(&self) -> &'static str {
        "The rewrite holds ACCESS EXCLUSIVE for the whole table; on a large relation \
         that is minutes of total downtime."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::AlterTable(at) = &statement.statement else {
            return Ok(None);
        };
        if ctx.relation_created_earlier(&at.table) {
            return Ok(None);
        }
        for action in &at.actions {
            let AlterAction::AddColumn { column } = action else {
                continue;
            };
            match &column.default {
                Some(ColumnDefault::Expression(expr)) => {
                    return Ok(Some(violation(
                        self,
                        ctx,
                        format!(
                            "default `{expr}` is evaluated per row and rewrites the whole table"
                        ),
                    )));
                }
                Some(ColumnDefault::Constant(_))
                    if !ctx.pg_version.at_least(PgVersion::V11) =>
                {
                    return Ok(Some(violation(
                        self,
                        ctx,
                        format!(
                            "on PostgreSQL {} any ADD COLUMN default rewrites the table; \
                             split into add, backfill, set default",
                            ctx.pg_version
                        ),
                    )));
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

/// `SET NOT NULL` without a validated covering CHECK constraint.
pub struct SettingColumnNotNull;

impl SettingColumnNotNull {
    /// Whether a preceding statement added a CHECK constraint proving the
    /// column non-null for this table.
    fn covered_by_check(ctx: &RuleContext<'_>, table: &str, column: &str) -> bool {
        let needle = format!("{} is not null", column.to_lowercase());
        ctx.statements[..ctx.index].iter().any(|prev| {
            let Statement::AlterTable(at) = &prev.statement else {
                return false;
            };
            if at.table != table {
                return false;
            }
            at.actions.iter().any(|action| {
                matches!(
                    action,
                    AlterAction::AddConstraint {
                        constraint: ConstraintKind::Check { expression },
                        ..
                    } if normalize(expression).contains(&needle)
                )
            })
        })
    }
}

/// Lowercase and collapse runs of whitespace.
fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Rule for SettingColumnNotNull {
    fn id(&self) -> &'static str {
        "setting-column-not-null"
    }
    fn name(&self) -> &'static str {
        "Setting a column NOT NULL"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags ALTER COLUMN ... SET NOT NULL without a prior validated CHECK constraint."
    }
    fn rationale(&self) -> &'static str {
        "Without a covering CHECK constraint the server scans the whole table under \
         ACCESS EXCLUSIVE to prove the invariant. From PostgreSQL 12 a validated \
         CHECK (col IS NOT NULL) lets SET NOT NULL skip the scan."
    }
    fn doc_url(&self) -> Option<&'static str> {
        Some("https://github.com/pegasusheavy/pgvigil/blob/main/docs/rules/setting-column-not-null.md")
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::AlterTable(at) = &statement.statement else {
            return Ok(None);
        };
        if ctx.relation_created_earlier(&at.table) {
            return Ok(None);
        }
        for action in &at.actions {
            let AlterAction::SetNotNull { column } = action else {
                continue;
            };
            if ctx.pg_version.at_least(PgVersion::V12)
                && Self::covered_by_check(ctx, &at.table, column)
            {
                return Ok(None);
            }
            let mut v = violation(
                self,
                ctx,
                format!(
                    "SET NOT NULL on `{}.{}` scans the whole table under ACCESS EXCLUSIVE",
                    at.table, column
                ),
            );
            v.safe_alternative = Some(format!(
                "ALTER TABLE {table} ADD CONSTRAINT {col}_not_null CHECK ({col} IS NOT NULL) NOT VALID;\n\
                 ALTER TABLE {table} VALIDATE CONSTRAINT {col}_not_null;\n\
                 ALTER TABLE {table} ALTER COLUMN {col} SET NOT NULL;\n\
                 ALTER TABLE {table} DROP CONSTRAINT {col}_not_null;",
                table = at.table,
                col = column,
            ));
            return Ok(Some(v));
        }
        Ok(None)
    }
}

/// `ADD FOREIGN KEY` without `NOT VALID`.
pub struct AddingForeignKeyConstraint;

impl Rule for AddingForeignKeyConstraint {
    fn id(&self) -> &'static str {
        "adding-foreign-key-constraint"
    }
    fn name(&self) -> &'static str {
        "Adding a foreign key without NOT VALID"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags ADD CONSTRAINT ... FOREIGN KEY without NOT VALID on an existing table."
    }
    fn rationale(&self) -> &'static str {
        "Validation scans the referencing table while both tables are locked against \
         writes. NOT VALID makes the add instant; VALIDATE CONSTRAINT later only takes \
         SHARE UPDATE EXCLUSIVE."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::AlterTable(at) = &statement.statement else {
            return Ok(None);
        };
        if ctx.relation_created_earlier(&at.table) {
            return Ok(None);
        }
        for action in &at.actions {
            if let AlterAction::AddConstraint {
                constraint: ConstraintKind::ForeignKey { referenced_table },
                not_valid: false,
                ..
            } = action
            {
                let mut v = violation(
                    self,
                    ctx,
                    format!(
                        "adding a foreign key to `{referenced_table}` validates existing rows \
                         while writes are blocked on both tables"
                    ),
                );
                v.safe_alternative = fix::append_not_valid(ctx.sql);
                return Ok(Some(v));
            }
        }
        Ok(None)
    }
}

/// `ADD CHECK` without `NOT VALID`.
pub struct AddingCheckConstraint;

impl Rule for AddingCheckConstraint {
    fn id(&self) -> &'static str {
        "adding-check-constraint"
    }
    fn name(&self) -> &'static str {
        "Adding a CHECK constraint without NOT VALID"
    }
    fn severity(&self) -> Severity {
        Severity::Warning
    }
    fn description(&self) -> &'static str {
        "Flags ADD CONSTRAINT ... CHECK without NOT VALID on an existing table."
    }
    fn rationale(&self) -> &'static str {
        "The immediate validation scans the table under ACCESS EXCLUSIVE; NOT VALID \
         plus a later VALIDATE CONSTRAINT does the same work without blocking writes."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::AlterTable(at) = &statement.statement else {
            return Ok(None);
        };
        if ctx.relation_created_earlier(&at.table) {
            return Ok(None);
        }
        for action in &at.actions {
            if let AlterAction::AddConstraint {
                constraint: ConstraintKind::Check { .. },
                not_valid: false,
                ..
            } = action
            {
                let mut v = violation(
                    self,
                    ctx,
                    "adding a CHECK constraint validates every existing row under \
                     ACCESS EXCLUSIVE"
                        .to_string(),
                );
                v.safe_alternative = fix::append_not_valid(ctx.sql);
                return Ok(Some(v));
            }
        }
        Ok(None)
    }
}

/// `ADD UNIQUE` / `ADD PRIMARY KEY` that builds its index inline.
pub struct AddingUniqueConstraint;

impl Rule for AddingUniqueConstraint {
    fn id(&self) -> &'static str {
        "adding-unique-constraint"
    }
    fn name(&self) -> &'static str {
        "Adding a unique constraint without USING INDEX"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags ADD CONSTRAINT UNIQUE/PRIMARY KEY that builds its backing index under \
         the table lock instead of attaching a concurrently built one."
    }
    fn rationale(&self) -> &'static str {
        "The inline index build holds ACCESS EXCLUSIVE for the whole scan. Building a \
         unique index CONCURRENTLY first and attaching it with USING INDEX is instant."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::AlterTable(at) = &statement.statement else {
            return Ok(None);
        };
        if ctx.relation_created_earlier(&at.table) {
            return Ok(None);
        }
        for action in &at.actions {
            let AlterAction::AddConstraint {
                name, constraint, ..
            } = action
            else {
                continue;
            };
            let (keyword, columns, using_index) = match constraint {
                ConstraintKind::Unique {
                    columns,
                    using_index,
                } => ("UNIQUE", columns, using_index),
                ConstraintKind::PrimaryKey {
                    columns,
                    using_index,
                } => ("PRIMARY KEY", columns, using_index),
                _ => continue,
            };
            if using_index.is_some() {
                continue;
            }
            let constraint_name = name
                .as_ref()
                .map(SmolStr::as_str)
                .unwrap_or("<constraint>");
            let column_list = columns
                .iter()
                .map(SmolStr::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let mut v = violation(
                self,
                ctx,
                format!(
                    "{keyword} constraint on `{}` builds its index under ACCESS EXCLUSIVE",
                    at.table
                ),
            );
            v.safe_alternative = Some(format!(
                "CREATE UNIQUE INDEX CONCURRENTLY {name}_idx ON {table} ({cols});\n\
                 ALTER TABLE {table} ADD CONSTRAINT {name} {keyword} USING INDEX {name}_idx;",
                name = constraint_name,
                table = at.table,
                cols = column_list,
            ));
            return Ok(Some(v));
        }
        Ok(None)
    }
}

/// `ALTER COLUMN ... TYPE`.
pub struct ChangingColumnType;

impl Rule for ChangingColumnType {
    fn id(&self) -> &'static str {
        "changing-column-type"
    }
    fn name(&self) -> &'static str {
        "Changing a column's type"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags ALTER COLUMN ... TYPE on an existing table."
    }
    fn rationale(&self) -> &'static str {
        "Most type changes rewrite the whole table under ACCESS EXCLUSIVE and break \
         clients still reading the old type. Add a new column, dual-write, then swap."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::AlterTable(at) = &statement.statement else {
            return Ok(None);
        };
        if ctx.relation_created_earlier(&at.table) {
            return Ok(None);
        }
        for action in &at.actions {
            if let AlterAction::ChangeType { column, type_name } = action {
                return Ok(Some(violation(
                    self,
                    ctx,
                    format!(
                        "changing `{}.{}` to `{}` can rewrite the table and break \
                         deployed readers",
                        at.table, column, type_name
                    ),
                )));
            }
        }
        Ok(None)
    }
}

/// Renaming a column.
pub struct RenamingColumn;

impl Rule for RenamingColumn {
    fn id(&self) -> &'static str {
        "renaming-column"
    }
    fn name(&self) -> &'static str {
        "Renaming a column"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags RENAME COLUMN."
    }
    fn rationale(&self) -> &'static str {
        "Every deployed client still using the old name breaks at the moment of the \
         rename. Add a new column and migrate readers instead."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::Rename(RenameTarget::Column { table, column, to }) = &statement.statement
        else {
            return Ok(None);
        };
        if ctx.relation_created_earlier(table) {
            return Ok(None);
        }
        Ok(Some(violation(
            self,
            ctx,
            format!("renaming `{table}.{column}` to `{to}` breaks deployed clients"),
        )))
    }
}

/// Renaming a table.
pub struct RenamingTable;

impl Rule for RenamingTable {
    fn id(&self) -> &'static str {
        "renaming-table"
    }
    fn name(&self) -> &'static str {
        "Renaming a table"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags ALTER TABLE ... RENAME TO."
    }
    fn rationale(&self) -> &'static str {
        "Every deployed client still using the old name breaks at the moment of the \
         rename. Create a view with the old name or migrate clients first."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::Rename(RenameTarget::Table { table, to }) = &statement.statement else {
            return Ok(None);
        };
        if ctx.relation_created_earlier(table) {
            return Ok(None);
        }
        Ok(Some(violation(
            self,
            ctx,
            format!("renaming `{table}` to `{to}` breaks deployed clients"),
        )))
    }
}

/// Dropping a column.
pub struct DroppingColumn;

impl Rule for DroppingColumn {
    fn id(&self) -> &'static str {
        "dropping-column"
    }
    fn name(&self) -> &'static str {
        "Dropping a column"
    }
    fn severity(&self) -> Severity {
        Severity::Warning
    }
    fn description(&self) -> &'static str {
        "Flags ALTER TABLE ... DROP COLUMN."
    }
    fn rationale(&self) -> &'static str {
        "The data is gone on commit and any deployed reader of the column starts \
         erroring. Deploy code that stops using the column before dropping it."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::AlterTable(at) = &statement.statement else {
            return Ok(None);
        };
        for action in &at.actions {
            if let AlterAction::DropColumn { column } = action {
                return Ok(Some(violation(
                    self,
                    ctx,
                    format!("dropping `{}.{}` is irreversible data loss", at.table, column),
                )));
            }
        }
        Ok(None)
    }
}

/// Dropping a table.
pub struct DroppingTable;

impl Rule for DroppingTable {
    fn id(&self) -> &'static str {
        "dropping-table"
    }
    fn name(&self) -> &'static str {
        "Dropping a table"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags DROP TABLE."
    }
    fn rationale(&self) -> &'static str {
        "Irreversible data loss plus immediate failure of every deployed client that \
         still touches the table."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::DropObject(d) = &statement.statement else {
            return Ok(None);
        };
        if d.kind != ObjectKind::Table {
            return Ok(None);
        }
        let names = d
            .names
            .iter()
            .map(SmolStr::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Some(violation(
            self,
            ctx,
            format!("dropping table(s) `{names}` is irreversible data loss"),
        )))
    }
}

/// `DROP DATABASE` has no place in a migration.
pub struct BanDropDatabase;

impl Rule for BanDropDatabase {
    fn id(&self) -> &'static str {
        "ban-drop-database"
    }
    fn name(&self) -> &'static str {
        "Ban DROP DATABASE"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags DROP DATABASE."
    }
    fn rationale(&self) -> &'static str {
        "A migration that can drop the database it runs against is one mis-targeted \
         deploy away from total loss."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::DropObject(d) = &statement.statement else {
            return Ok(None);
        };
        if d.kind != ObjectKind::Database {
            return Ok(None);
        }
        Ok(Some(violation(
            self,
            ctx,
            "DROP DATABASE does not belong in a schema migration".to_string(),
        )))
    }
}

/// `CLUSTER` rewrites the table under `ACCESS EXCLUSIVE`.
pub struct BanCluster;

impl Rule for BanCluster {
    fn id(&self) -> &'static str {
        "ban-cluster"
    }
    fn name(&self) -> &'static str {
        "Ban CLUSTER"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags CLUSTER."
    }
    fn rationale(&self) -> &'static str {
        "CLUSTER rewrites the whole table under ACCESS EXCLUSIVE — total downtime \
         proportional to table size, with no online variant."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::Cluster(_) = &statement.statement else {
            return Ok(None);
        };
        Ok(Some(violation(
            self,
            ctx,
            "CLUSTER rewrites the table and blocks all access for the duration".to_string(),
        )))
    }
}

/// `VACUUM FULL` rewrites the table under `ACCESS EXCLUSIVE`.
pub struct BanVacuumFull;

impl Rule for BanVacuumFull {
    fn id(&self) -> &'static str {
        "ban-vacuum-full"
    }
    fn name(&self) -> &'static str {
        "Ban VACUUM FULL"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags VACUUM FULL."
    }
    fn rationale(&self) -> &'static str {
        "VACUUM FULL rewrites the table under ACCESS EXCLUSIVE. Plain VACUUM or \
         pg_repack reclaims space without blocking."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::Vacuum(v) = &statement.statement else {
            return Ok(None);
        };
        if !v.full {
            return Ok(None);
        }
        Ok(Some(violation(
            self,
            ctx,
            "VACUUM FULL blocks all access while it rewrites the table".to_string(),
        )))
    }
}

/// Blocking DDL without a preceding `SET lock_timeout`.
pub struct RequireLockTimeout;

impl Rule for RequireLockTimeout {
    fn id(&self) -> &'static str {
        "require-lock-timeout"
    }
    fn name(&self) -> &'static str {
        "Require a lock timeout"
    }
    fn severity(&self) -> Severity {
        Severity::Warning
    }
    fn description(&self) -> &'static str {
        "Flags the first lock-taking statement of a file that is not preceded by \
         SET lock_timeout."
    }
    fn rationale(&self) -> &'static str {
        "Without a lock timeout a blocked DDL statement queues forever — and every \
         later query queues behind it. A timeout turns a stuck deploy into a clean \
         retry."
    }
    fn doc_url(&self) -> Option<&'static str> {
        Some("https://github.com/pegasusheavy/pgvigil/blob/main/docs/rules/require-lock-timeout.md")
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let lock = classify(&statement.statement, ctx.pg_version);
        if !lock.blocks_reads && !lock.blocks_writes {
            return Ok(None);
        }

        // Only the first blocking statement reports, once per file.
        let mut preceding = ctx.statements[..ctx.index].iter();
        let earlier_blocker = preceding.any(|prev| {
            let c = classify(&prev.statement, ctx.pg_version);
            c.blocks_reads || c.blocks_writes
        });
        if earlier_blocker {
            return Ok(None);
        }

        let timeout_set = ctx.statements[..ctx.index].iter().any(|prev| {
            matches!(
                &prev.statement,
                Statement::SetParameter(sp) if sp.name == "lock_timeout"
            )
        });
        if timeout_set {
            return Ok(None);
        }

        let mut v = violation(
            self,
            ctx,
            "blocking DDL without SET lock_timeout can queue behind long transactions \
             and stall all traffic"
                .to_string(),
        );
        v.safe_alternative = Some(fix::LOCK_TIMEOUT_STATEMENT.to_string());
        Ok(Some(v))
    }
}

/// `REFRESH MATERIALIZED VIEW` without `CONCURRENTLY`.
pub struct RefreshMatviewBlocksReads;

impl Rule for RefreshMatviewBlocksReads {
    fn id(&self) -> &'static str {
        "refresh-matview-blocks-reads"
    }
    fn name(&self) -> &'static str {
        "Non-concurrent materialized view refresh"
    }
    fn severity(&self) -> Severity {
        Severity::Warning
    }
    fn description(&self) -> &'static str {
        "Flags REFRESH MATERIALIZED VIEW without CONCURRENTLY."
    }
    fn rationale(&self) -> &'static str {
        "The plain refresh locks the view against reads until the new contents are \
         ready. CONCURRENTLY keeps readers running (it needs a unique index on the \
         view)."
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Statement::RefreshMaterializedView(r) = &statement.statement else {
            return Ok(None);
        };
        if r.concurrently {
            return Ok(None);
        }
        let mut v = violation(
            self,
            ctx,
            format!("refreshing `{}` blocks reads until the refresh completes", r.name),
        );
        v.safe_alternative = Some(format!(
            "REFRESH MATERIALIZED VIEW CONCURRENTLY {};\n\
             -- requires a UNIQUE index on the view",
            r.name
        ));
        Ok(Some(v))
    }
}

/// Paid tier: blocking lock on a table with real query traffic.
pub struct LockingHighTrafficTable;

impl Rule for LockingHighTrafficTable {
    fn id(&self) -> &'static str {
        "locking-high-traffic-table"
    }
    fn name(&self) -> &'static str {
        "Blocking a high-traffic table"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags read- or write-blocking statements against tables with significant \
         observed query traffic."
    }
    fn rationale(&self) -> &'static str {
        "A brief exclusive lock on a cold table is harmless; the same lock on a table \
         serving hundreds of calls per minute stalls the application."
    }
    fn requires_production_context(&self) -> bool {
        true
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Some(production) = ctx.production else {
            return Ok(None);
        };
        let lock = classify(&statement.statement, ctx.pg_version);
        if !lock.blocks_reads && !lock.blocks_writes {
            return Ok(None);
        }

        let relations = statement.statement.target_relations();
        let calls_per_minute: f64 = production
            .queries_across(relations.iter())
            .iter()
            .map(|q| q.calls_per_minute)
            .sum();
        if calls_per_minute < HIGH_TRAFFIC_CALLS_PER_MINUTE {
            return Ok(None);
        }

        Ok(Some(violation(
            self,
            ctx,
            format!(
                "this statement takes {} on a table serving {calls_per_minute:.0} \
                 calls/min in production",
                lock.level
            ),
        )))
    }
}

/// Paid tier: full scan or rewrite of a known-large table.
pub struct RewritingLargeTable;

impl Rule for RewritingLargeTable {
    fn id(&self) -> &'static str {
        "rewriting-large-table"
    }
    fn name(&self) -> &'static str {
        "Rewriting a large table"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn description(&self) -> &'static str {
        "Flags long-held locks against tables at or above the large-table row \
         threshold."
    }
    fn rationale(&self) -> &'static str {
        "A held lock's cost scales with table size. At a million rows, a scan that is \
         instant in staging becomes minutes of blocked writes in production."
    }
    fn requires_production_context(&self) -> bool {
        true
    }

    fn check(
        &self,
        statement: &RawStatement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Violation>, CheckError> {
        let Some(production) = ctx.production else {
            return Ok(None);
        };
        let lock = classify(&statement.statement, ctx.pg_version);
        if !lock.long_held {
            return Ok(None);
        }

        let relations = statement.statement.target_relations();
        let Some(stats) = production.largest_stats(relations.iter()) else {
            return Ok(None);
        };
        if stats.row_count < LARGE_TABLE_ROWS {
            return Ok(None);
        }

        Ok(Some(violation(
            self,
            ctx,
            format!(
                "{} is held for a scan of ~{} rows; expect minutes of blocking",
                lock.level, stats.row_count
            ),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgvigil_ast::source::{ParsedFile, RawStatement};
    use pgvigil_ast::stmt::{
        AlterTable, ColumnDef, CreateIndex, CreateTable, DropIndex, SetParameter,
    };

    use crate::context::{AffectedQuery, ProductionContext, TableStats};
    use crate::rules::RuleEngine;

    fn run_one(statement: Statement, sql: &str) -> Vec<Violation> {
        run_file(vec![RawStatement::new(statement, sql, 1, 0)], None)
            .remove(0)
    }

    fn run_file(
        statements: Vec<RawStatement>,
        production: Option<&ProductionContext>,
    ) -> Vec<Vec<Violation>> {
        let source: String = statements
            .iter()
            .map(|s| s.sql.clone())
            .collect::<Vec<_>>()
            .join("\n");
        let file = ParsedFile::new("test.sql", source, statements);
        let catalog = standard();
        let mut engine = RuleEngine::new(&catalog, PgVersion::V15);
        if let Some(p) = production {
            engine = engine.with_production(p);
        }
        engine
            .run(&file)
            .into_iter()
            .map(|f| f.violations)
            .collect()
    }

    fn plain_index() -> Statement {
        Statement::CreateIndex(CreateIndex {
            name: Some("idx_users_email".into()),
            table: "users".into(),
            columns: vec!["email".into()],
            concurrently: false,
            unique: false,
            access_method: None,
        })
    }

    #[test]
    fn test_concurrent_index_rule_fires_with_safe_alternative() {
        let violations = run_one(plain_index(), "CREATE INDEX idx_users_email ON users (email);");
        let v = violations
            .iter()
            .find(|v| v.rule_id == "require-concurrent-index-creation")
            .expect("rule should fire");
        assert_eq!(v.severity, Severity::Critical);
        let alternative = v.safe_alternative.as_deref().expect("has safe alternative");
        assert!(alternative.contains("CONCURRENTLY"));
    }

    #[test]
    fn test_concurrent_index_rule_quiet_on_new_table() {
        let create = RawStatement::new(
            Statement::CreateTable(CreateTable {
                name: "users".into(),
                columns: vec![],
                constraints: vec![],
                if_not_exists: false,
            }),
            "CREATE TABLE users ();",
            1,
            0,
        );
        let index = RawStatement::new(
            plain_index(),
            "CREATE INDEX idx_users_email ON users (email);",
            2,
            1,
        );
        let violations = run_file(vec![create, index], None);
        assert!(violations[1]
            .iter()
            .all(|v| v.rule_id != "require-concurrent-index-creation"));
    }

    #[test]
    fn test_concurrent_index_in_transaction() {
        let begin = RawStatement::new(
            Statement::TransactionControl {
                op: pgvigil_ast::stmt::TxnOp::Begin,
            },
            "BEGIN;",
            1,
            0,
        );
        let index = RawStatement::new(
            Statement::CreateIndex(CreateIndex {
                name: Some("idx".into()),
                table: "users".into(),
                columns: vec!["email".into()],
                concurrently: true,
                unique: false,
                access_method: None,
            }),
            "CREATE INDEX CONCURRENTLY idx ON users (email);",
            2,
            1,
        );
        let violations = run_file(vec![begin, index], None);
        assert!(violations[1]
            .iter()
            .any(|v| v.rule_id == "no-concurrent-index-in-transaction"));
    }

    #[test]
    fn test_drop_index_rule_is_warning() {
        let stmt = Statement::DropIndex(DropIndex {
            names: vec!["idx_users_email".into()],
            concurrently: false,
            if_exists: false,
        });
        let violations = run_one(stmt, "DROP INDEX idx_users_email;");
        let v = violations
            .iter()
            .find(|v| v.rule_id == "require-concurrent-index-drop")
            .expect("rule should fire");
        assert_eq!(v.severity, Severity::Warning);
    }

    #[test]
    fn test_set_not_null_covered_by_check_is_quiet() {
        let add_check = RawStatement::new(
            Statement::AlterTable(AlterTable {
                table: "users".into(),
                only: false,
                actions: vec![AlterAction::AddConstraint {
                    name: Some("email_not_null".into()),
                    constraint: ConstraintKind::Check {
                        expression: "email IS NOT NULL".into(),
                    },
                    not_valid: true,
                }],
            }),
            "ALTER TABLE users ADD CONSTRAINT email_not_null CHECK (email IS NOT NULL) NOT VALID;",
            1,
            0,
        );
        let set_not_null = RawStatement::new(
            Statement::AlterTable(AlterTable {
                table: "users".into(),
                only: false,
                actions: vec![AlterAction::SetNotNull {
                    column: "email".into(),
                }],
            }),
            "ALTER TABLE users ALTER COLUMN email SET NOT NULL;",
            2,
            1,
        );
        let violations = run_file(vec![add_check, set_not_null], None);
        assert!(violations[1]
            .iter()
            .all(|v| v.rule_id != "setting-column-not-null"));
    }

    #[test]
    fn test_set_not_null_uncovered_fires() {
        let stmt = Statement::AlterTable(AlterTable {
            table: "users".into(),
            only: false,
            actions: vec![AlterAction::SetNotNull {
                column: "email".into(),
            }],
        });
        let violations = run_one(stmt, "ALTER TABLE users ALTER COLUMN email SET NOT NULL;");
        let v = violations
            .iter()
            .find(|v| v.rule_id == "setting-column-not-null")
            .expect("rule should fire");
        assert!(v.safe_alternative.as_deref().unwrap().contains("NOT VALID"));
    }

    #[test]
    fn test_adding_not_nullable_column_fires() {
        let stmt = Statement::AlterTable(AlterTable {
            table: "users".into(),
            only: false,
            actions: vec![AlterAction::AddColumn {
                column: ColumnDef {
                    name: "tenant_id".into(),
                    type_name: "bigint".into(),
                    not_null: true,
                    default: None,
                },
            }],
        });
        let violations = run_one(stmt, "ALTER TABLE users ADD COLUMN tenant_id bigint NOT NULL;");
        assert!(violations
            .iter()
            .any(|v| v.rule_id == "adding-not-nullable-column"));
    }

    #[test]
    fn test_foreign_key_not_valid_is_quiet() {
        let stmt = Statement::AlterTable(AlterTable {
            table: "orders".into(),
            only: false,
            actions: vec![AlterAction::AddConstraint {
                name: Some("orders_user_fk".into()),
                constraint: ConstraintKind::ForeignKey {
                    referenced_table: "users".into(),
                },
                not_valid: true,
            }],
        });
        let violations = run_one(
            stmt,
            "ALTER TABLE orders ADD CONSTRAINT orders_user_fk FOREIGN KEY (user_id) REFERENCES users (id) NOT VALID;",
        );
        assert!(violations
            .iter()
            .all(|v| v.rule_id != "adding-foreign-key-constraint"));
    }

    #[test]
    fn test_lock_timeout_rule_fires_once_on_first_blocker() {
        let first = RawStatement::new(plain_index(), "CREATE INDEX a ON users (email);", 1, 0);
        let second = RawStatement::new(
            Statement::DropIndex(DropIndex {
                names: vec!["old_idx".into()],
                concurrently: false,
                if_exists: false,
            }),
            "DROP INDEX old_idx;",
            2,
            1,
        );
        let violations = run_file(vec![first, second], None);
        let count: usize = violations
            .iter()
            .flatten()
            .filter(|v| v.rule_id == "require-lock-timeout")
            .count();
        assert_eq!(count, 1);
        assert!(violations[0]
            .iter()
            .any(|v| v.rule_id == "require-lock-timeout"));
    }

    #[test]
    fn test_lock_timeout_rule_quiet_when_set() {
        let set = RawStatement::new(
            Statement::SetParameter(SetParameter {
                name: "lock_timeout".into(),
                value: "'5s'".into(),
                local: false,
            }),
            "SET lock_timeout = '5s';",
            1,
            0,
        );
        let index = RawStatement::new(plain_index(), "CREATE INDEX a ON users (email);", 2, 1);
        let violations = run_file(vec![set, index], None);
        assert!(violations
            .iter()
            .flatten()
            .all(|v| v.rule_id != "require-lock-timeout"));
    }

    #[test]
    fn test_high_traffic_rule_needs_production_context() {
        let production = ProductionContext::new().with_query(
            "users",
            AffectedQuery {
                query: "SELECT * FROM users WHERE id = $1".into(),
                calls_per_minute: 500.0,
                mean_exec_ms: 2.0,
            },
        );

        let sql = "CREATE INDEX idx_users_email ON users (email);";
        let statements =
            || vec![RawStatement::new(plain_index(), sql, 1, 0)];

        let with = run_file(statements(), Some(&production));
        assert!(with[0]
            .iter()
            .any(|v| v.rule_id == "locking-high-traffic-table"));

        let without = run_file(statements(), None);
        assert!(without[0]
            .iter()
            .all(|v| v.rule_id != "locking-high-traffic-table"));
    }

    #[test]
    fn test_large_table_rewrite_rule() {
        let production = ProductionContext::new().with_table_stats(
            "users",
            TableStats {
                row_count: 50_000_000,
                total_bytes: 40 << 30,
            },
        );

        let stmt = Statement::AlterTable(AlterTable {
            table: "users".into(),
            only: false,
            actions: vec![AlterAction::SetNotNull {
                column: "email".into(),
            }],
        });
        let statements = vec![RawStatement::new(
            stmt,
            "ALTER TABLE users ALTER COLUMN email SET NOT NULL;",
            1,
            0,
        )];
        let violations = run_file(statements, Some(&production));
        assert!(violations[0]
            .iter()
            .any(|v| v.rule_id == "rewriting-large-table"));
    }

    #[test]
    fn test_ban_rules() {
        let cluster = run_one(
            Statement::Cluster(pgvigil_ast::stmt::Cluster {
                table: Some("users".into()),
                index: None,
            }),
            "CLUSTER users;",
        );
        assert!(cluster.iter().any(|v| v.rule_id == "ban-cluster"));

        let vacuum = run_one(
            Statement::Vacuum(pgvigil_ast::stmt::Vacuum {
                full: true,
                tables: vec!["users".into()],
            }),
            "VACUUM FULL users;",
        );
        assert!(vacuum.iter().any(|v| v.rule_id == "ban-vacuum-full"));

        let drop_db = run_one(
            Statement::DropObject(pgvigil_ast::stmt::DropObject {
                kind: ObjectKind::Database,
                names: vec!["prod".into()],
                cascade: false,
                if_exists: false,
            }),
            "DROP DATABASE prod;",
        );
        assert!(drop_db.iter().any(|v| v.rule_id == "ban-drop-database"));
    }
}
