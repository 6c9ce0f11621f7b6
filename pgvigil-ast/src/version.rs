//! Target PostgreSQL version.

use serde::{Deserialize, Serialize};

/// The PostgreSQL major version a migration targets.
///
/// Several behaviors are version-sensitive (e.g. `ADD COLUMN` with a
/// constant default rewrites the table below version 11 and is
/// metadata-only from 11 on), so the analysis pipeline threads this
/// value through classification and rule checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PgVersion {
    /// Major version number (e.g. 15).
    pub major: u16,
}

impl PgVersion {
    /// PostgreSQL 10.
    pub const V10: PgVersion = PgVersion { major: 10 };
    /// PostgreSQL 11.
    pub const V11: PgVersion = PgVersion { major: 11 };
    /// PostgreSQL 12.
    pub const V12: PgVersion = PgVersion { major: 12 };
    /// PostgreSQL 13.
    pub const V13: PgVersion = PgVersion { major: 13 };
    /// PostgreSQL 14.
    pub const V14: PgVersion = PgVersion { major: 14 };
    /// PostgreSQL 15.
    pub const V15: PgVersion = PgVersion { major: 15 };
    /// PostgreSQL 16.
    pub const V16: PgVersion = PgVersion { major: 16 };
    /// PostgreSQL 17.
    pub const V17: PgVersion = PgVersion { major: 17 };

    /// Create a version from a major version number.
    pub fn new(major: u16) -> Self {
        Self { major }
    }

    /// Whether this version is at least `other`.
    pub fn at_least(self, other: PgVersion) -> bool {
        self >= other
    }
}

impl Default for PgVersion {
    fn default() -> Self {
        Self::V15
    }
}

impl std::fmt::Display for PgVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.major)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering() {
        assert!(PgVersion::V11 > PgVersion::V10);
        assert!(PgVersion::V15.at_least(PgVersion::V11));
        assert!(!PgVersion::V10.at_least(PgVersion::V11));
    }

    #[test]
    fn test_version_default() {
        assert_eq!(PgVersion::default(), PgVersion::V15);
    }

    #[test]
    fn test_version_display() {
        assert_eq!(PgVersion::new(14).to_string(), "14");
    }
}
