use crate::errors::{DocshiftError, DocshiftResult, ErrorKind};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// An immutable, totally-ordered `major.minor.patch` version identifier.
///
/// `VersionId` is the comparable unit that orders migrations and marks the
/// database state recorded in the history ledger. Ordering is lexicographic
/// over `(major, minor, patch)`; equality is component-wise. The canonical
/// textual form is `"{major}.{minor}.{patch}"` and round-trips through
/// [`VersionId::parse`].
///
/// A missing version (an empty history) is represented as
/// `Option<VersionId>::None`, which is distinct from version `0.0.0`.
///
/// # Examples
///
/// ```rust,ignore
/// use docshift::common::VersionId;
///
/// let v = VersionId::parse("1.2.3")?;
/// assert_eq!(v.to_string(), "1.2.3");
/// assert!(v > VersionId::new(1, 2, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionId {
    major: u32,
    minor: u32,
    patch: u32,
}

impl VersionId {
    /// Version `0.0.0`, the implicit floor of an empty history.
    pub const ZERO: VersionId = VersionId {
        major: 0,
        minor: 0,
        patch: 0,
    };

    /// Creates a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        VersionId {
            major,
            minor,
            patch,
        }
    }

    /// Parses a version from its canonical `"major.minor.patch"` text form.
    ///
    /// The input must contain exactly three dot-separated components, each a
    /// non-negative integer that fits in a `u32`. Out-of-range components are
    /// rejected, never clamped or wrapped.
    ///
    /// # Arguments
    ///
    /// * `text` - The version string to parse
    ///
    /// # Returns
    ///
    /// * `Ok(VersionId)` if the input is well-formed
    /// * `Err` with kind `ValidationError` if the input is empty
    /// * `Err` with kind `InvalidVersionFormat` if the component count is wrong
    /// * `Err` with kind `VersionOutOfRange` if a component is not a valid `u32`
    pub fn parse(text: &str) -> DocshiftResult<Self> {
        if text.trim().is_empty() {
            return Err(DocshiftError::new(
                "Version string is required",
                ErrorKind::ValidationError,
            ));
        }

        let components: Vec<&str> = text.split('.').collect();
        if components.len() != 3 {
            return Err(DocshiftError::new(
                &format!(
                    "Version '{}' must have exactly 3 dot-separated components, found {}",
                    text,
                    components.len()
                ),
                ErrorKind::InvalidVersionFormat,
            ));
        }

        let mut parsed = [0u32; 3];
        for (i, component) in components.iter().enumerate() {
            parsed[i] = component.trim().parse::<u32>().map_err(|e| {
                DocshiftError::new_with_cause(
                    &format!(
                        "Version component '{}' in '{}' is not a non-negative integer",
                        component, text
                    ),
                    ErrorKind::VersionOutOfRange,
                    e.into(),
                )
            })?;
        }

        Ok(VersionId::new(parsed[0], parsed[1], parsed[2]))
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for VersionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionId {
    type Err = DocshiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionId::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_valid_version() {
        let v = VersionId::parse("1.2.3").unwrap();
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 2);
        assert_eq!(v.patch(), 3);
    }

    #[test]
    fn test_parse_zero_version() {
        let v = VersionId::parse("0.0.0").unwrap();
        assert_eq!(v, VersionId::ZERO);
    }

    #[test]
    fn test_parse_large_components() {
        let v = VersionId::parse("4294967295.0.1").unwrap();
        assert_eq!(v.major(), u32::MAX);
    }

    #[test]
    fn test_parse_empty_fails_with_validation_error() {
        let err = VersionId::parse("").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let err = VersionId::parse("   ").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_parse_wrong_component_count_fails() {
        for input in ["1", "1.2", "1.2.3.4", "1..2.3.4"] {
            let err = VersionId::parse(input).unwrap_err();
            assert_eq!(
                err.kind(),
                &ErrorKind::InvalidVersionFormat,
                "input: {}",
                input
            );
        }
    }

    #[test]
    fn test_parse_non_numeric_component_fails() {
        for input in ["a.2.3", "1.b.3", "1.2.c", "1.2.", ".2.3"] {
            let err = VersionId::parse(input).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::VersionOutOfRange, "input: {}", input);
        }
    }

    #[test]
    fn test_parse_negative_component_fails() {
        let err = VersionId::parse("-1.2.3").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::VersionOutOfRange);
    }

    #[test]
    fn test_parse_overflowing_component_fails() {
        // u32::MAX + 1
        let err = VersionId::parse("4294967296.0.0").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::VersionOutOfRange);
    }

    #[test]
    fn test_parse_error_carries_cause() {
        let err = VersionId::parse("x.0.0").unwrap_err();
        assert!(err.cause().is_some());
    }

    // ==================== Round Trip Tests ====================

    #[test]
    fn test_display_round_trip() {
        for input in ["0.0.1", "1.0.0", "10.20.30", "0.0.0"] {
            let v = VersionId::parse(input).unwrap();
            assert_eq!(v.to_string(), input);
            assert_eq!(VersionId::parse(&v.to_string()).unwrap(), v);
        }
    }

    #[test]
    fn test_from_str_delegates_to_parse() {
        let v: VersionId = "2.3.4".parse().unwrap();
        assert_eq!(v, VersionId::new(2, 3, 4));
        assert!("not-a-version".parse::<VersionId>().is_err());
    }

    // ==================== Ordering Tests ====================

    #[test]
    fn test_ordering_is_lexicographic() {
        assert!(VersionId::new(1, 0, 0) > VersionId::new(0, 9, 9));
        assert!(VersionId::new(1, 1, 0) > VersionId::new(1, 0, 9));
        assert!(VersionId::new(1, 1, 2) > VersionId::new(1, 1, 1));
        assert!(VersionId::new(0, 0, 1) > VersionId::ZERO);
    }

    #[test]
    fn test_ordering_trichotomy() {
        let pairs = [
            (VersionId::new(1, 2, 3), VersionId::new(1, 2, 3)),
            (VersionId::new(1, 2, 3), VersionId::new(1, 2, 4)),
            (VersionId::new(2, 0, 0), VersionId::new(1, 9, 9)),
        ];
        for (a, b) in pairs {
            let holds =
                [(a < b) as u8, (a == b) as u8, (a > b) as u8].iter().sum::<u8>();
            assert_eq!(holds, 1, "exactly one of <, ==, > must hold for {} and {}", a, b);
        }
    }

    #[test]
    fn test_ordering_transitive() {
        let a = VersionId::new(0, 0, 1);
        let b = VersionId::new(0, 1, 0);
        let c = VersionId::new(1, 0, 0);
        assert!(a < b && b < c && a < c);
    }

    #[test]
    fn test_equality_is_component_wise() {
        assert_eq!(VersionId::new(1, 2, 3), VersionId::parse("1.2.3").unwrap());
        assert_ne!(VersionId::new(1, 2, 3), VersionId::new(1, 2, 4));
    }

    #[test]
    fn test_zero_is_distinct_from_absent() {
        let absent: Option<VersionId> = None;
        let zero = Some(VersionId::ZERO);
        assert_ne!(absent, zero);
    }

    #[test]
    fn test_max_of_versions_uses_version_order() {
        // 0.0.10 sorts after 0.0.9 numerically even though "10" < "9" as text
        let versions = [
            VersionId::parse("0.0.9").unwrap(),
            VersionId::parse("0.0.10").unwrap(),
            VersionId::parse("0.0.2").unwrap(),
        ];
        let max = versions.iter().max().unwrap();
        assert_eq!(*max, VersionId::new(0, 0, 10));
    }
}
