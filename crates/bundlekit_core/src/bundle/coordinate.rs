//! Bundle identity coordinates.
//!
//! # Responsibility
//! - Name one bundle uniquely as `group:id:version`.
//! - Normalize blank group/version to stable sentinels.
//!
//! # Invariants
//! - `id` is never blank.
//! - No field contains the `:` separator.
//! - The canonical string is computed once and is the only input to
//!   equality, ordering and hashing.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Group used when none is declared.
pub const DEFAULT_GROUP: &str = "default";
/// Version used when none is declared.
pub const DEFAULT_VERSION: &str = "unversioned";
/// Field separator inside the canonical string.
pub const SEPARATOR: char = ':';

const UNKNOWN_ID: &str = "unknown";

/// Immutable `(group, id, version)` identity of one bundle.
#[derive(Debug, Clone)]
pub struct BundleCoordinate {
    group: String,
    id: String,
    version: String,
    canonical: String,
}

impl BundleCoordinate {
    /// Builds a validated coordinate.
    ///
    /// Blank `group`/`version` fall back to [`DEFAULT_GROUP`] and
    /// [`DEFAULT_VERSION`].
    ///
    /// # Errors
    /// - [`CoordinateError::BlankId`] when `id` is empty or whitespace.
    /// - [`CoordinateError::ContainsSeparator`] when any field contains `:`.
    pub fn new(
        group: Option<&str>,
        id: &str,
        version: Option<&str>,
    ) -> Result<Self, CoordinateError> {
        let group = non_blank_or(group, DEFAULT_GROUP);
        let version = non_blank_or(version, DEFAULT_VERSION);

        if id.trim().is_empty() {
            return Err(CoordinateError::BlankId);
        }

        if group.contains(SEPARATOR) || id.contains(SEPARATOR) || version.contains(SEPARATOR) {
            return Err(CoordinateError::ContainsSeparator {
                group,
                id: id.to_string(),
                version,
            });
        }

        let canonical = format!("{group}{SEPARATOR}{id}{SEPARATOR}{version}");
        Ok(Self {
            group,
            id: id.to_string(),
            version,
            canonical,
        })
    }

    /// Placeholder coordinate for content whose bundle is not known.
    pub fn unknown() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            id: UNKNOWN_ID.to_string(),
            version: DEFAULT_VERSION.to_string(),
            canonical: format!("{DEFAULT_GROUP}{SEPARATOR}{UNKNOWN_ID}{SEPARATOR}{DEFAULT_VERSION}"),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Canonical `group:id:version` form.
    pub fn coordinates(&self) -> &str {
        &self.canonical
    }
}

fn non_blank_or(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(raw) if !raw.trim().is_empty() => raw.to_string(),
        _ => fallback.to_string(),
    }
}

impl FromStr for BundleCoordinate {
    type Err = CoordinateError;

    /// Parses a canonical `group:id:version` string.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(CoordinateError::Malformed(value.to_string()));
        }
        Self::new(Some(parts[0]), parts[1], Some(parts[2]))
    }
}

impl Display for BundleCoordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl PartialEq for BundleCoordinate {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for BundleCoordinate {}

impl Hash for BundleCoordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for BundleCoordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BundleCoordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl Serialize for BundleCoordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for BundleCoordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Coordinate validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinateError {
    BlankId,
    ContainsSeparator {
        group: String,
        id: String,
        version: String,
    },
    Malformed(String),
}

impl Display for CoordinateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "bundle coordinate id is required"),
            Self::ContainsSeparator { group, id, version } => write!(
                f,
                "invalid coordinates: cannot contain {SEPARATOR} character group[{group}] id[{id}] version[{version}]"
            ),
            Self::Malformed(value) => write!(
                f,
                "bundle coordinate is malformed: {value} (expected group{SEPARATOR}id{SEPARATOR}version)"
            ),
        }
    }
}

impl Error for CoordinateError {}

#[cfg(test)]
mod tests {
    use super::{BundleCoordinate, CoordinateError, DEFAULT_GROUP, DEFAULT_VERSION};
    use std::collections::HashSet;

    #[test]
    fn blank_group_and_version_take_sentinels() {
        let coordinate = BundleCoordinate::new(None, "x", None).expect("valid coordinate");
        assert_eq!(coordinate.group(), DEFAULT_GROUP);
        assert_eq!(coordinate.version(), DEFAULT_VERSION);
        assert_eq!(coordinate.coordinates(), "default:x:unversioned");

        let whitespace =
            BundleCoordinate::new(Some("  "), "x", Some("\t")).expect("valid coordinate");
        assert_eq!(whitespace, coordinate);
    }

    #[test]
    fn rejects_blank_id() {
        let err = BundleCoordinate::new(Some("g"), "", Some("v")).expect_err("blank id");
        assert_eq!(err, CoordinateError::BlankId);
        let err = BundleCoordinate::new(Some("g"), "   ", Some("v")).expect_err("blank id");
        assert_eq!(err, CoordinateError::BlankId);
    }

    #[test]
    fn rejects_separator_in_any_field() {
        for (group, id, version) in [("g:h", "x", "v"), ("g", "x:y", "v"), ("g", "x", "1:0")] {
            let err = BundleCoordinate::new(Some(group), id, Some(version))
                .expect_err("separator must be rejected");
            assert!(matches!(err, CoordinateError::ContainsSeparator { .. }));
        }
    }

    #[test]
    fn parse_requires_three_parts() {
        let err = "g:x".parse::<BundleCoordinate>().expect_err("two parts");
        assert!(matches!(err, CoordinateError::Malformed(_)));
        let err = "g:x:v:w".parse::<BundleCoordinate>().expect_err("four parts");
        assert!(matches!(err, CoordinateError::Malformed(_)));
    }

    #[test]
    fn equality_and_hash_follow_canonical_string() {
        let a = BundleCoordinate::new(Some("default"), "x", None).expect("valid");
        let b = BundleCoordinate::new(None, "x", Some("unversioned")).expect("valid");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn unknown_coordinate_is_stable() {
        assert_eq!(
            BundleCoordinate::unknown().to_string(),
            "default:unknown:unversioned"
        );
    }
}
