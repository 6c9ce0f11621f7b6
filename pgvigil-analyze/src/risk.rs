//! Composite risk scoring.
//!
//! [`score`] combines the lock classification with optional production
//! telemetry into a 0–100 score and a traffic-light level. The score is
//! additive and auditable: the factor list always sums to the reported
//! score, so callers can reconstruct and explain it.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::context::{AffectedQuery, TableStats};
use crate::lock::LockClassification;

/// Traffic-light risk level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Safe to run during traffic.
    Green,
    /// Needs review; may block traffic briefly or under load.
    Yellow,
    /// Likely to cause an incident if run during traffic.
    Red,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Green => write!(f, "GREEN"),
            Self::Yellow => write!(f, "YELLOW"),
            Self::Red => write!(f, "RED"),
        }
    }
}

/// One contribution to a risk score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Factor name (`lock`, `table-size`, `query-frequency`).
    pub name: SmolStr,
    /// Maximum value this factor can contribute.
    pub weight: u8,
    /// Value actually contributed.
    pub value: u8,
    /// Human explanation of the contribution.
    pub detail: String,
}

/// A composite risk score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Traffic-light level derived from `score`.
    pub level: RiskLevel,
    /// 0–100; always the sum of `factors[..].value`.
    pub score: u8,
    /// Contributions, in evaluation order.
    pub factors: Vec<RiskFactor>,
}

/// Score at or above this is `Red`.
const RED_CUTOFF: u8 = 70;
/// Score at or above this is `Yellow`.
const YELLOW_CUTOFF: u8 = 40;

/// Maximum contribution of the lock factor.
const LOCK_WEIGHT: u8 = 40;
/// Maximum contribution of the table-size factor.
const SIZE_WEIGHT: u8 = 30;
/// Maximum contribution of the query-frequency factor.
const FREQUENCY_WEIGHT: u8 = 30;

/// Row count at which a table counts as large.
pub const LARGE_TABLE_ROWS: u64 = 1_000_000;

/// Score a statement's risk from its lock classification and optional
/// production telemetry.
///
/// The lock factor is always present; size and frequency factors appear
/// only when the corresponding input is supplied. Monotonic in each
/// input; clamped to 100.
pub fn score(
    lock: &LockClassification,
    table_stats: Option<&TableStats>,
    affected_queries: Option<&[AffectedQuery]>,
) -> RiskScore {
    let mut factors = Vec::with_capacity(3);

    factors.push(lock_factor(lock));

    if let Some(stats) = table_stats {
        factors.push(size_factor(stats));
    }

    if let Some(queries) = affected_queries {
        factors.push(frequency_factor(queries));
    }

    let total: u32 = factors.iter().map(|f| u32::from(f.value)).sum();
    // Factor weights sum to exactly 100, so the clamp never breaks the
    // score == sum(factor values) invariant.
    debug_assert!(total <= 100);
    let score = total.min(100) as u8;

    let level = if score >= RED_CUTOFF {
        RiskLevel::Red
    } else if score >= YELLOW_CUTOFF {
        RiskLevel::Yellow
    } else {
        RiskLevel::Green
    };

    RiskScore {
        level,
        score,
        factors,
    }
}

/// Lock severity contribution, 0–40.
fn lock_factor(lock: &LockClassification) -> RiskFactor {
    let (value, detail) = if lock.blocks_writes && lock.long_held {
        (
            LOCK_WEIGHT,
            format!(
                "{} held for a full table scan or rewrite; writes blocked throughout",
                lock.level
            ),
        )
    } else if lock.blocks_reads {
        (
            30,
            format!("{} briefly blocks reads and writes", lock.level),
        )
    } else if lock.blocks_writes {
        (24, format!("{} briefly blocks writes", lock.level))
    } else if lock.long_held {
        (
            14,
            format!(
                "{} held for a full table scan; reads and writes proceed",
                lock.level
            ),
        )
    } else if lock.level >= crate::lock::LockLevel::ShareUpdateExclusive {
        (8, format!("{} blocks concurrent DDL only", lock.level))
    } else {
        (2, format!("{} blocks nothing of note", lock.level))
    };

    RiskFactor {
        name: SmolStr::new_static("lock"),
        weight: LOCK_WEIGHT,
        value,
        detail,
    }
}

/// Table-size contribution, 0–30. Present only with statistics.
fn size_factor(stats: &TableStats) -> RiskFactor {
    const TEN_GB: u64 = 10 << 30;

    let row_points: u8 = if stats.row_count >= LARGE_TABLE_ROWS {
        SIZE_WEIGHT
    } else if stats.row_count >= 100_000 {
        18
    } else if stats.row_count >= 10_000 {
        8
    } else {
        0
    };
    let byte_points: u8 = if stats.total_bytes >= TEN_GB { SIZE_WEIGHT } else { 0 };

    let value = row_points.max(byte_points);
    RiskFactor {
        name: SmolStr::new_static("table-size"),
        weight: SIZE_WEIGHT,
        value,
        detail: format!(
            "{} rows, {} bytes on disk",
            stats.row_count, stats.total_bytes
        ),
    }
}

/// Query-frequency contribution, 0–30. Present only with telemetry.
fn frequency_factor(queries: &[AffectedQuery]) -> RiskFactor {
    let calls_per_minute: f64 = queries.iter().map(|q| q.calls_per_minute).sum();
    let peak_mean_ms = queries
        .iter()
        .map(|q| q.mean_exec_ms)
        .fold(0.0_f64, f64::max);

    let call_points: u8 = if calls_per_minute >= 1_000.0 {
        20
    } else if calls_per_minute >= 100.0 {
        12
    } else if calls_per_minute >= 10.0 {
        6
    } else {
        0
    };
    let latency_points: u8 = if peak_mean_ms >= 100.0 {
        10
    } else if peak_mean_ms >= 10.0 {
        5
    } else {
        0
    };

    let value = (call_points + latency_points).min(FREQUENCY_WEIGHT);
    RiskFactor {
        name: SmolStr::new_static("query-frequency"),
        weight: FREQUENCY_WEIGHT,
        value,
        detail: format!(
            "{} queries, {calls_per_minute:.0} calls/min, slowest mean {peak_mean_ms:.1}ms",
            queries.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{LockClassification, LockLevel};

    fn blocking_scan() -> LockClassification {
        LockClassification::brief(LockLevel::Share).held_for_scan()
    }

    fn big_table() -> TableStats {
        TableStats {
            row_count: 5_000_000,
            total_bytes: 1 << 30,
        }
    }

    fn hot_queries() -> Vec<AffectedQuery> {
        vec![AffectedQuery {
            query: "SELECT * FROM users WHERE email = $1".into(),
            calls_per_minute: 2_400.0,
            mean_exec_ms: 12.0,
        }]
    }

    #[test]
    fn test_lock_factor_alone_is_always_present() {
        let risk = score(&blocking_scan(), None, None);
        assert_eq!(risk.factors.len(), 1);
        assert_eq!(risk.factors[0].name, "lock");
        assert_eq!(risk.factors[0].value, 40);
        assert_eq!(risk.level, RiskLevel::Yellow);
    }

    #[test]
    fn test_score_is_sum_of_factors() {
        let queries = hot_queries();
        let risk = score(&blocking_scan(), Some(&big_table()), Some(&queries));
        let sum: u32 = risk.factors.iter().map(|f| u32::from(f.value)).sum();
        assert_eq!(u32::from(risk.score), sum.min(100));
    }

    #[test]
    fn test_full_house_is_red() {
        let queries = hot_queries();
        let risk = score(&blocking_scan(), Some(&big_table()), Some(&queries));
        assert_eq!(risk.level, RiskLevel::Red);
        assert!(risk.score >= 70);
    }

    #[test]
    fn test_score_clamped_to_100() {
        let lock = LockClassification::brief(LockLevel::AccessExclusive).held_for_scan();
        let queries = hot_queries();
        let risk = score(&lock, Some(&big_table()), Some(&queries));
        assert!(risk.score <= 100);
    }

    #[test]
    fn test_harmless_statement_is_green() {
        let lock = LockClassification::brief(LockLevel::AccessShare);
        let risk = score(&lock, None, None);
        assert_eq!(risk.level, RiskLevel::Green);
        assert!(risk.score < 40);
    }

    #[test]
    fn test_size_factor_monotonic_in_rows() {
        let lock = blocking_scan();
        let small = TableStats {
            row_count: 5_000,
            total_bytes: 0,
        };
        let medium = TableStats {
            row_count: 500_000,
            total_bytes: 0,
        };
        let small_score = score(&lock, Some(&small), None).score;
        let medium_score = score(&lock, Some(&medium), None).score;
        let large_score = score(&lock, Some(&big_table()), None).score;
        assert!(small_score <= medium_score);
        assert!(medium_score <= large_score);
    }

    #[test]
    fn test_absent_inputs_add_no_factors() {
        let risk = score(&blocking_scan(), None, None);
        assert!(risk.factors.iter().all(|f| f.name == "lock"));
    }
}
