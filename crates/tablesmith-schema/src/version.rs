use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tablesmith_common::SchemaError;

/// A `major.minor.patch` schema version.
///
/// Ordering compares the three components numerically, so `1.10.0` sorts
/// after `1.9.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SchemaVersion {
    /// Version assumed for tables that have never recorded one.
    pub const ZERO: SchemaVersion = SchemaVersion::new(0, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchemaError::InvalidVersionFormat(s.to_string());

        let mut parts = s.split('.');
        let mut next = || -> Result<u64, SchemaError> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };

        let version = SchemaVersion::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchemaVersion> for String {
    fn from(version: SchemaVersion) -> Self {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::SchemaVersion;
    use tablesmith_common::SchemaError;

    fn v(s: &str) -> SchemaVersion {
        s.parse().unwrap()
    }

    #[test]
    fn orders_numerically_not_lexically() {
        assert!(v("2.0.0") > v("1.9.9"));
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("1.0.10") > v("1.0.9"));
        assert!(v("0.0.1") > SchemaVersion::ZERO);
        assert_eq!(v("1.2.3"), SchemaVersion::new(1, 2, 3));
    }

    #[test]
    fn display_round_trips_the_canonical_form() {
        assert_eq!(v("10.20.30").to_string(), "10.20.30");
        assert_eq!(SchemaVersion::ZERO.to_string(), "0.0.0");
    }

    #[test]
    fn rejects_anything_but_three_numeric_parts() {
        for s in ["", "1", "1.2", "1.2.3.4", "1.a.3", "v1.2.3", "1..3", " 1.2.3", "1.2.-3"] {
            assert_eq!(
                s.parse::<SchemaVersion>(),
                Err(SchemaError::InvalidVersionFormat(s.to_string())),
                "{s:?} should be rejected"
            );
        }
    }

    #[test]
    fn leading_zeros_compare_by_value() {
        assert_eq!(v("01.002.0003"), SchemaVersion::new(1, 2, 3));
    }
}
