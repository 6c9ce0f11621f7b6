//! Migration version tokens.
//!
//! Recognized grammars, tried in order:
//! - sequence style with a double-underscore separator: `42__add_users.sql`
//!   (an optional leading `V` is accepted)
//! - 14-digit timestamp prefix: `20240101120000_init.sql`, validated as a
//!   real timestamp
//! - bare numeric prefix: `001_init.sql`
//!
//! Names matching none of these fall back to lexical ordering and are
//! reported as `invalid-name` by the validator.

use chrono::NaiveDateTime;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A parsed migration version token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "style", content = "value", rename_all = "kebab-case")]
pub enum VersionToken {
    /// Sequence style: numeric prefix before a `__` separator.
    Sequence(u64),
    /// 14-digit timestamp prefix (`YYYYMMDDHHMMSS`).
    Timestamp(u64),
    /// Bare numeric prefix.
    Numeric(u64),
    /// Unrecognized name; ordered lexically by the full name.
    Lexical(SmolStr),
}

impl VersionToken {
    /// Parse a file name into a version token.
    ///
    /// Total: unrecognized names produce [`VersionToken::Lexical`], which
    /// still participates in ordering comparisons.
    pub fn parse(name: &str) -> Self {
        // Unwraps are fine: the patterns are compile-time constants.
        let sequence = Regex::new(r"^V?(\d+)__").unwrap();
        let timestamp = Regex::new(r"^(\d{14})[_-]").unwrap();
        let numeric = Regex::new(r"^(\d+)[_-]").unwrap();

        if let Some(caps) = sequence.captures(name) {
            if let Ok(value) = caps[1].parse::<u64>() {
                return Self::Sequence(value);
            }
        }

        if let Some(caps) = timestamp.captures(name) {
            let digits = &caps[1];
            if NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S").is_ok() {
                if let Ok(value) = digits.parse::<u64>() {
                    return Self::Timestamp(value);
                }
            }
        }

        if let Some(caps) = numeric.captures(name) {
            if let Ok(value) = caps[1].parse::<u64>() {
                return Self::Numeric(value);
            }
        }

        Self::Lexical(SmolStr::new(name))
    }

    /// The numeric value, when the grammar has one.
    pub fn numeric_value(&self) -> Option<u64> {
        match self {
            Self::Sequence(v) | Self::Timestamp(v) | Self::Numeric(v) => Some(*v),
            Self::Lexical(_) => None,
        }
    }

    /// Whether this token follows a strictly-numeric sequential scheme.
    ///
    /// Timestamps are numeric but not sequential: a missing value between
    /// two timestamps means nothing.
    pub fn is_sequential(&self) -> bool {
        matches!(self, Self::Sequence(_) | Self::Numeric(_))
    }

    /// Whether the name matched a recognized grammar.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Lexical(_))
    }

    /// Discriminant used to break ordering ties between equal numeric
    /// values of different styles.
    fn style_rank(&self) -> u8 {
        match self {
            Self::Sequence(_) => 0,
            Self::Timestamp(_) => 1,
            Self::Numeric(_) => 2,
            Self::Lexical(_) => 3,
        }
    }
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.numeric_value(), other.numeric_value()) {
            (Some(a), Some(b)) => a
                .cmp(&b)
                .then_with(|| self.style_rank().cmp(&other.style_rank())),
            // Numeric versions sort before lexical fallbacks.
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => match (self, other) {
                (Self::Lexical(a), Self::Lexical(b)) => a.cmp(b),
                _ => unreachable!("non-lexical tokens always have a numeric value"),
            },
        }
    }
}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{v}"),
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Lexical(name) => write!(f, "{name}"),
        }
    }
}
