//! Parse-boundary input types.
//!
//! The external SQL parser hands pgvigil either a [`ParsedFile`] (the
//! statement sequence with original source spans) or a [`ParseFailure`]
//! (the raw error list). pgvigil never re-parses SQL; a failure is
//! surfaced unchanged and the file is not analyzed.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::stmt::Statement;

/// One parsed statement plus its original source span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatement {
    /// The parsed statement tree.
    pub statement: Statement,
    /// Original SQL text of this statement, comments excluded.
    pub sql: String,
    /// 1-based line the statement starts on.
    pub line: u32,
    /// 0-based position within the file's statement sequence.
    pub index: usize,
}

impl RawStatement {
    /// Create a raw statement.
    pub fn new(statement: Statement, sql: impl Into<String>, line: u32, index: usize) -> Self {
        Self {
            statement,
            sql: sql.into(),
            line,
            index,
        }
    }

    /// The statement text normalized for marker comparison: trimmed,
    /// lowercased, trailing semicolon dropped.
    pub fn normalized_sql(&self) -> String {
        self.sql.trim().trim_end_matches(';').trim().to_lowercase()
    }
}

/// A migration file successfully parsed into a statement sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFile {
    /// Path of the migration file.
    pub path: PathBuf,
    /// Full original source text, comments included.
    ///
    /// Suppression directives live in comments, which the per-statement
    /// `sql` fields do not carry.
    pub source: String,
    /// Statements in file order.
    pub statements: Vec<RawStatement>,
}

impl ParsedFile {
    /// Create a parsed file.
    pub fn new(
        path: impl Into<PathBuf>,
        source: impl Into<String>,
        statements: Vec<RawStatement>,
    ) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            statements,
        }
    }

    /// Display name of the file (final path component).
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A file the upstream parser could not turn into a statement sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    /// Path of the migration file.
    pub path: PathBuf,
    /// Raw parser error messages, unmodified.
    pub errors: Vec<String>,
    /// Byte offset of the parser's cursor when it gave up, if reported.
    #[serde(default)]
    pub cursor: Option<usize>,
}

impl ParseFailure {
    /// Create a parse failure.
    pub fn new(path: impl Into<PathBuf>, errors: Vec<String>) -> Self {
        Self {
            path: path.into(),
            errors,
            cursor: None,
        }
    }

    /// Attach the parser's cursor position.
    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// What the upstream parser produced for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ParseOutcome {
    /// The file parsed; analysis may proceed.
    Parsed(ParsedFile),
    /// The file did not parse; analysis must refuse it.
    Failed(ParseFailure),
}

impl ParseOutcome {
    /// The file path, regardless of outcome.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Parsed(file) => &file.path,
            Self::Failed(failure) => &failure.path,
        }
    }
}
