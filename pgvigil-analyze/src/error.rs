//! Error types for the analysis pipeline.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type for analysis operations.
pub type AnalyzeResult<T> = Result<T, AnalyzeError>;

/// Errors that can stop the analysis of a file.
///
/// Deliberately small: classification and scoring anomalies resolve to
/// conservative defaults, rule-check failures are isolated into
/// [`RuleFault`](crate::rules::RuleFault)s, and ordering findings are
/// reported values — none of those are errors. Only a file the upstream
/// parser could not read halts analysis.
#[derive(Debug, Error, Diagnostic)]
pub enum AnalyzeError {
    /// The upstream parser failed; the raw error list is carried unchanged.
    #[error("failed to parse {}: {} parser error(s)", .path.display(), .errors.len())]
    #[diagnostic(code(pgvigil::analyze::parse_failed))]
    ParseFailed {
        /// Path of the file that did not parse.
        path: PathBuf,
        /// Raw parser error messages, unmodified.
        errors: Vec<String>,
        /// Byte offset of the parser's cursor, if reported.
        cursor: Option<usize>,
    },
}

impl AnalyzeError {
    /// Create a parse failure from the upstream parser's report.
    pub fn parse_failed(failure: &pgvigil_ast::source::ParseFailure) -> Self {
        Self::ParseFailed {
            path: failure.path.clone(),
            errors: failure.errors.clone(),
            cursor: failure.cursor,
        }
    }
}
