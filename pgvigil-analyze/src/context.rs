//! Production context: externally supplied live-database telemetry.
//!
//! Paid-tier input. Absence never changes anything except that the
//! size/frequency risk factors and the paid-tier rules contribute
//! nothing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Size statistics for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    /// Estimated live row count.
    pub row_count: u64,
    /// Total on-disk size in bytes, indexes included.
    pub total_bytes: u64,
}

/// One production query observed touching a relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedQuery {
    /// Normalized query text, as reported by the telemetry source.
    pub query: String,
    /// Average calls per minute.
    pub calls_per_minute: f64,
    /// Mean execution time in milliseconds.
    pub mean_exec_ms: f64,
}

/// Live-database telemetry keyed by relation name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionContext {
    /// Per-table size statistics.
    #[serde(default)]
    pub tables: HashMap<SmolStr, TableStats>,
    /// Per-table query telemetry.
    #[serde(default)]
    pub queries: HashMap<SmolStr, Vec<AffectedQuery>>,
}

impl ProductionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record size statistics for a table.
    pub fn with_table_stats(mut self, table: impl Into<SmolStr>, stats: TableStats) -> Self {
        self.tables.insert(table.into(), stats);
        self
    }

    /// Record a query touching a table.
    pub fn with_query(mut self, table: impl Into<SmolStr>, query: AffectedQuery) -> Self {
        self.queries.entry(table.into()).or_default().push(query);
        self
    }

    /// Statistics for a relation, if known.
    pub fn stats_for(&self, relation: &str) -> Option<&TableStats> {
        self.tables.get(relation)
    }

    /// Queries touching a relation, if known.
    pub fn queries_for(&self, relation: &str) -> &[AffectedQuery] {
        self.queries
            .get(relation)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The largest statistics across a set of relations.
    ///
    /// A statement can touch several relations (e.g. a foreign key); risk
    /// scoring uses the biggest one.
    pub fn largest_stats<'a>(
        &self,
        relations: impl IntoIterator<Item = &'a SmolStr>,
    ) -> Option<TableStats> {
        relations
            .into_iter()
            .filter_map(|name| self.stats_for(name))
            .copied()
            .max_by_key(|s| s.row_count)
    }

    /// All queries across a set of relations.
    pub fn queries_across<'a>(
        &self,
        relations: impl IntoIterator<Item = &'a SmolStr>,
    ) -> Vec<&AffectedQuery> {
        relations
            .into_iter()
            .flat_map(|name| self.queries_for(name))
            .collect()
    }
}
