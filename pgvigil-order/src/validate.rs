//! Cross-file ordering validation.
//!
//! Pure derived reporting: ordering anomalies are findings, never
//! errors, and every check is independently reportable — one file can
//! trigger several.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use pgvigil_ast::severity::Severity;

use crate::file::MigrationFile;
use crate::version::VersionToken;

/// The kind of an ordering finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// Files are not in monotonically increasing version order.
    OutOfOrder,
    /// Two or more files share one parsed version token.
    DuplicateVersion,
    /// A file references a table no earlier file creates.
    MissingDependency,
    /// A missing integer between consecutive sequential versions.
    Gap,
    /// A file name matches no recognized version grammar.
    InvalidName,
}

/// One ordering finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingIssue {
    /// What kind of finding this is.
    pub kind: IssueKind,
    /// How serious it is.
    pub severity: Severity,
    /// Human explanation.
    pub message: String,
    /// The file(s) implicated, in supplied order.
    pub files: Vec<PathBuf>,
}

/// Validate a collection of migration files, in the order supplied.
///
/// Checks are independent; the result can contain several findings for
/// one file. `missing-dependency` is always advisory — without full
/// schema knowledge a pre-existing table and a typo look identical.
pub fn validate(files: &[MigrationFile]) -> Vec<OrderingIssue> {
    let mut issues = Vec::new();

    check_invalid_names(files, &mut issues);
    check_duplicate_versions(files, &mut issues);
    check_out_of_order(files, &mut issues);
    check_gaps(files, &mut issues);
    check_missing_dependencies(files, &mut issues);

    debug!(files = files.len(), issues = issues.len(), "ordering validation complete");
    issues
}

fn check_invalid_names(files: &[MigrationFile], issues: &mut Vec<OrderingIssue>) {
    for file in files {
        if !file.version.is_recognized() {
            issues.push(OrderingIssue {
                kind: IssueKind::InvalidName,
                severity: Severity::Warning,
                message: format!(
                    "`{}` matches no recognized version scheme; ordering falls back to the \
                     file name",
                    file.display_name
                ),
                files: vec![file.path.clone()],
            });
        }
    }
}

fn check_duplicate_versions(files: &[MigrationFile], issues: &mut Vec<OrderingIssue>) {
    let mut by_version: BTreeMap<&VersionToken, Vec<&MigrationFile>> = BTreeMap::new();
    for file in files {
        by_version.entry(&file.version).or_default().push(file);
    }

    for (version, group) in by_version {
        if group.len() < 2 {
            continue;
        }
        let names = group
            .iter()
            .map(|f| f.display_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        issues.push(OrderingIssue {
            kind: IssueKind::DuplicateVersion,
            severity: Severity::Critical,
            message: format!("version {version} is used by {} files: {names}", group.len()),
            files: group.iter().map(|f| f.path.clone()).collect(),
        });
    }
}

fn check_out_of_order(files: &[MigrationFile], issues: &mut Vec<OrderingIssue>) {
    for pair in files.windows(2) {
        let (earlier, later) = (&pair[0], &pair[1]);
        if earlier.version > later.version {
            issues.push(OrderingIssue {
                kind: IssueKind::OutOfOrder,
                severity: Severity::Critical,
                message: format!(
                    "`{}` (version {}) is listed before `{}` (version {})",
                    earlier.display_name, earlier.version, later.display_name, later.version
                ),
                files: vec![earlier.path.clone(), later.path.clone()],
            });
        }
    }
}

fn check_gaps(files: &[MigrationFile], issues: &mut Vec<OrderingIssue>) {
    // Gaps only mean something in strictly-numeric sequential schemes;
    // consecutive timestamps are expected to skip values.
    let mut sequential: Vec<&MigrationFile> =
        files.iter().filter(|f| f.version.is_sequential()).collect();
    sequential.sort_by(|a, b| a.version.cmp(&b.version));

    for pair in sequential.windows(2) {
        let (earlier, later) = (&pair[0], &pair[1]);
        let (Some(a), Some(b)) = (earlier.version.numeric_value(), later.version.numeric_value())
        else {
            continue;
        };
        if b > a + 1 {
            issues.push(OrderingIssue {
                kind: IssueKind::Gap,
                severity: Severity::Warning,
                message: format!(
                    "versions jump from {a} (`{}`) to {b} (`{}`); {} missing in between",
                    earlier.display_name,
                    later.display_name,
                    b - a - 1
                ),
                files: vec![earlier.path.clone(), later.path.clone()],
            });
        }
    }
}

fn check_missing_dependencies(files: &[MigrationFile], issues: &mut Vec<OrderingIssue>) {
    let mut created_so_far = std::collections::BTreeSet::new();

    for file in files {
        let missing: Vec<&str> = file
            .references
            .iter()
            .filter(|table| !created_so_far.contains(table.as_str()))
            .map(|table| table.as_str())
            .collect();

        if !missing.is_empty() {
            issues.push(OrderingIssue {
                kind: IssueKind::MissingDependency,
                severity: Severity::Warning,
                message: format!(
                    "`{}` references table(s) created by no earlier migration: {}",
                    file.display_name,
                    missing.join(", ")
                ),
                files: vec![file.path.clone()],
            });
        }

        created_so_far.extend(file.creates.iter().map(|t| t.to_string()));
    }
}
