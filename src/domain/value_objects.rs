//! Domain value objects representing immutable concepts

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{VersionError, VersionSegment};

/// Reserved literal for the version that sorts before every other version.
pub const MIN_VERSION: &str = "#MINV#";

/// Reserved literal for the version that sorts after every other version.
pub const MAX_VERSION: &str = "#MAXV#";

const UPSTREAM_ALLOWED_SYMBOLS: &[char] = &['.', '-', '+', '~', ':', '_'];
const REVISION_ALLOWED_SYMBOLS: &[char] = &['.', '+', '~', '_'];

/// A dpkg-style package version.
///
/// A concrete version is the `epoch:upstream-revision` triple described by the
/// Debian policy manual, parsed and ordered with the exact algorithm of
/// dpkg-1.17.25 (`lib/parsehelp.c` / `lib/version.c`). The two sentinel
/// variants sort below and above every concrete version; they exist so that
/// "affected in every released version" and "not affected at all" can be
/// expressed without magic strings in the normal fields.
///
/// Equality is structural. Precedence is exposed through
/// [`Version::cmp_precedence`] rather than `Ord`, because dpkg precedence
/// equates structurally distinct values (`"0"` and `"00"` compare equal) and a
/// derived `Ord` would contradict `Eq` in sets and maps keyed by version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    Minimum,
    Maximum,
    Concrete {
        epoch: u32,
        upstream: String,
        revision: String,
    },
}

impl Version {
    /// Parse a version string into a `Version`.
    ///
    /// Surrounding whitespace is trimmed first. The reserved sentinel literals
    /// yield the corresponding sentinel variant. Otherwise the first `:`
    /// delimits a non-negative integer epoch, the last `-` splits upstream
    /// from revision, and both segments are checked against their character
    /// classes.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();

        if s.is_empty() {
            return Err(VersionError::EmptyVersion);
        }

        match s {
            MIN_VERSION => return Ok(Version::Minimum),
            MAX_VERSION => return Ok(Version::Maximum),
            _ => {}
        }

        let (epoch, rest) = match s.find(':') {
            Some(idx) => {
                let value: i64 = s[..idx]
                    .parse()
                    .map_err(|_| VersionError::NonNumericEpoch)?;
                if value < 0 {
                    return Err(VersionError::NegativeEpoch);
                }
                let epoch = u32::try_from(value).map_err(|_| VersionError::NonNumericEpoch)?;
                (epoch, &s[idx + 1..])
            }
            None => (0, s),
        };

        let (upstream, revision) = match rest.rfind('-') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };

        if upstream.is_empty() {
            return Err(VersionError::EmptyVersion);
        }

        check_segment(upstream, VersionSegment::Upstream, UPSTREAM_ALLOWED_SYMBOLS)?;
        check_segment(revision, VersionSegment::Revision, REVISION_ALLOWED_SYMBOLS)?;

        Ok(Version::Concrete {
            epoch,
            upstream: upstream.to_string(),
            revision: revision.to_string(),
        })
    }

    /// Whether this version is one of the two sentinels.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Version::Minimum | Version::Maximum)
    }

    /// Compare two versions by dpkg precedence.
    ///
    /// Structurally equal versions are equal; a sentinel dominates every other
    /// version; concrete versions compare by epoch, then upstream, then
    /// revision, the latter two through the dpkg segment walk.
    pub fn cmp_precedence(&self, other: &Version) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }

        match (self, other) {
            (Version::Minimum, _) | (_, Version::Maximum) => Ordering::Less,
            (Version::Maximum, _) | (_, Version::Minimum) => Ordering::Greater,
            (
                Version::Concrete {
                    epoch: e1,
                    upstream: u1,
                    revision: r1,
                },
                Version::Concrete {
                    epoch: e2,
                    upstream: u2,
                    revision: r2,
                },
            ) => e1
                .cmp(e2)
                .then_with(|| clamp(segment_cmp(u1, u2)))
                .then_with(|| clamp(segment_cmp(r1, r2))),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Minimum => write!(f, "{}", MIN_VERSION),
            Version::Maximum => write!(f, "{}", MAX_VERSION),
            Version::Concrete {
                epoch,
                upstream,
                revision,
            } => {
                if *epoch != 0 {
                    write!(f, "{}:", epoch)?;
                }
                write!(f, "{}", upstream)?;
                if !revision.is_empty() {
                    write!(f, "-{}", revision)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn check_segment(
    segment: &str,
    kind: VersionSegment,
    allowed_symbols: &[char],
) -> Result<(), VersionError> {
    for character in segment.chars() {
        if !character.is_ascii_alphanumeric() && !allowed_symbols.contains(&character) {
            return Err(VersionError::InvalidCharacter { character, segment: kind });
        }
    }
    Ok(())
}

fn clamp(value: i32) -> Ordering {
    value.cmp(&0)
}

/// The dpkg segment walk, applied independently to upstream and revision.
///
/// Both strings are consumed left to right in alternating non-digit and digit
/// runs. Non-digit runs compare character by character through a modified
/// ASCII ranking where digits rank lowest, a tilde ranks below even the end of
/// the string, letters rank by code and every other symbol ranks after the
/// letters. Digit runs skip numeric left-padding, then remember the first
/// differing digit pair; a longer remaining digit run wins outright, otherwise
/// that remembered pair decides. This replicates dpkg's literal behavior for
/// numeric runs of different length, which vulnerability matching depends on.
fn segment_cmp(a: &str, b: &str) -> i32 {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut i = 0;
    let mut j = 0;

    while i < a.len() || j < b.len() {
        let mut first_diff: i32 = 0;

        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let ac = a.get(i).map_or(0, |&c| char_rank(c));
            let bc = b.get(j).map_or(0, |&c| char_rank(c));

            if ac != bc {
                return ac - bc;
            }

            i += 1;
            j += 1;
        }

        while a.get(i) == Some(&b'0') {
            i += 1;
        }
        while b.get(j) == Some(&b'0') {
            j += 1;
        }

        while i < a.len() && a[i].is_ascii_digit() && j < b.len() && b[j].is_ascii_digit() {
            if first_diff == 0 {
                first_diff = i32::from(a[i]) - i32::from(b[j]);
            }
            i += 1;
            j += 1;
        }

        if i < a.len() && a[i].is_ascii_digit() {
            return 1;
        }
        if j < b.len() && b[j].is_ascii_digit() {
            return -1;
        }
        if first_diff != 0 {
            return first_diff;
        }
    }

    0
}

/// Ranks a byte on the modified ASCII table: digits lowest, tilde before
/// everything, letters by code, remaining symbols after the letters.
fn char_rank(c: u8) -> i32 {
    if c.is_ascii_digit() {
        0
    } else if c.is_ascii_alphabetic() {
        i32::from(c)
    } else if c == b'~' {
        -1
    } else {
        i32::from(c) + 256
    }
}

/// The release a feature belongs to, together with the version format its
/// versions are expressed in (e.g. `debian:12` / `dpkg`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub version_format: String,
}

impl Namespace {
    pub fn new(name: impl Into<String>, version_format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_format: version_format.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Advisory severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Unknown,
    Negligible,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Unknown => write!(f, "Unknown"),
            Severity::Negligible => write!(f, "Negligible"),
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

/// An opaque proxy for "how much of an upstream feed has been consumed": a
/// commit hash, a content digest or a timestamp. Markers are only ever
/// compared for equality and overwritten wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeMarker(String);

impl ChangeMarker {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LESS: Ordering = Ordering::Less;
    const EQUAL: Ordering = Ordering::Equal;
    const GREATER: Ordering = Ordering::Greater;

    fn concrete(epoch: u32, upstream: &str, revision: &str) -> Version {
        Version::Concrete {
            epoch,
            upstream: upstream.to_string(),
            revision: revision.to_string(),
        }
    }

    fn compare(a: &str, b: &str) -> Ordering {
        Version::parse(a)
            .unwrap()
            .cmp_precedence(&Version::parse(b).unwrap())
    }

    #[test]
    fn test_parse() {
        let cases = [
            ("0", concrete(0, "0", "")),
            ("0:0", concrete(0, "0", "")),
            ("0:0-", concrete(0, "0", "")),
            ("0:0-0", concrete(0, "0", "0")),
            ("0:0.0-0.0", concrete(0, "0.0", "0.0")),
            // Epochs
            ("1:0", concrete(1, "0", "")),
            ("5:1", concrete(5, "1", "")),
            // Multiple hyphens: the last one is the revision separator
            ("0:0-0-0", concrete(0, "0-0", "0")),
            ("0:0-0-0-0", concrete(0, "0-0-0", "0")),
            // Multiple colons: only the first one delimits the epoch
            ("0:0:0-0", concrete(0, "0:0", "0")),
            ("0:0:0:0-0", concrete(0, "0:0:0", "0")),
            ("0:0:0-0-0", concrete(0, "0:0-0", "0")),
            ("0:0-0:0-0", concrete(0, "0-0:0", "0")),
            // Allowed characters in each segment
            ("0:09azAZ.-+~:_-0", concrete(0, "09azAZ.-+~:_", "0")),
            ("0:0-azAZ09.+~_", concrete(0, "0", "azAZ09.+~_")),
            // Surrounding whitespace
            ("  \t0:0-1", concrete(0, "0", "1")),
            ("0:0-1\t  ", concrete(0, "0", "1")),
            // Discouraged but accepted: upstream not starting with a digit
            ("0:abc3-0", concrete(0, "abc3", "0")),
        ];
        for (input, expected) in cases {
            assert_eq!(Version::parse(input).unwrap(), expected, "parsing {:?}", input);
        }
    }

    #[test]
    fn test_parse_sentinels() {
        assert_eq!(Version::parse(MIN_VERSION).unwrap(), Version::Minimum);
        assert_eq!(Version::parse(MAX_VERSION).unwrap(), Version::Maximum);
        assert_eq!(Version::parse(" #MAXV# ").unwrap(), Version::Maximum);
    }

    #[test]
    fn test_parse_rejections() {
        assert_eq!(Version::parse("").unwrap_err(), VersionError::EmptyVersion);
        assert_eq!(Version::parse(" ").unwrap_err(), VersionError::EmptyVersion);
        assert_eq!(Version::parse("0:").unwrap_err(), VersionError::EmptyVersion);
        assert_eq!(
            Version::parse("-1:0-1").unwrap_err(),
            VersionError::NegativeEpoch
        );
        assert_eq!(
            Version::parse("a:0-0").unwrap_err(),
            VersionError::NonNumericEpoch
        );
        assert_eq!(
            Version::parse("A:0-0").unwrap_err(),
            VersionError::NonNumericEpoch
        );
        // Embedded spaces are not part of any character class
        assert!(matches!(
            Version::parse("0:0 0-1").unwrap_err(),
            VersionError::InvalidCharacter {
                segment: VersionSegment::Upstream,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_invalid_characters() {
        for symbol in "!#@$%&/|\\<>()[]{};,=*^'".chars() {
            let input = format!("0:0{}-0", symbol);
            assert!(
                matches!(
                    Version::parse(&input),
                    Err(VersionError::InvalidCharacter {
                        segment: VersionSegment::Upstream,
                        ..
                    })
                ),
                "{:?} should be rejected in the version segment",
                symbol
            );
        }

        for symbol in "!#@$%&/|\\<>()[]{}:;,=*^'".chars() {
            let input = format!("0:0-{}", symbol);
            assert!(
                matches!(
                    Version::parse(&input),
                    Err(VersionError::InvalidCharacter {
                        segment: VersionSegment::Revision,
                        ..
                    })
                ),
                "{:?} should be rejected in the revision segment",
                symbol
            );
        }
    }

    #[test]
    fn test_parse_and_compare() {
        let cases = [
            ("7.6p2-4", GREATER, "7.6-0"),
            ("1.0.3-3", GREATER, "1.0-1"),
            ("1.3", GREATER, "1.2.2-2"),
            ("1.3", GREATER, "1.2.2"),
            // Properties of text strings
            ("0-pre", EQUAL, "0-pre"),
            ("0-pre", LESS, "0-pree"),
            ("1.1.6r2-2", GREATER, "1.1.6r-1"),
            ("2.6b2-1", GREATER, "2.6b-2"),
            ("98.1p5-1", LESS, "98.1-pre2-b6-2"),
            ("0.4a6-2", GREATER, "0.4-1"),
            ("1:3.0.5-2", LESS, "1:3.0.5.1"),
            // Epochs
            ("1:0.4", GREATER, "10.3"),
            ("1:1.25-4", LESS, "1:1.25-8"),
            ("0:1.18.36", EQUAL, "1.18.36"),
            ("1.18.36", GREATER, "1.18.35"),
            ("0:1.18.36", GREATER, "1.18.35"),
            // Funky but allowed characters in the upstream version
            ("9:1.18.36:5.4-20", LESS, "10:0.5.1-22"),
            ("9:1.18.36:5.4-20", LESS, "9:1.18.36:5.5-1"),
            ("9:1.18.36:5.4-20", LESS, " 9:1.18.37:4.3-22"),
            ("1.18.36-0.17.35-18", GREATER, "1.18.36-19"),
            ("1:1.2.13-3", LESS, "1:1.2.13-3.1"),
            ("2.0.7pre1-4", LESS, "2.0.7r-1"),
            // A dash inside the upstream version is allowed
            ("0:0-0-0", GREATER, "0-0"),
            // Numeric left-padding is ignored
            ("0", EQUAL, "0"),
            ("0", EQUAL, "00"),
            ("009", EQUAL, "9"),
            ("009ab5", EQUAL, "9ab5"),
            ("5.10.0", GREATER, "5.005"),
            // Tilde sorts before everything, including the empty string
            ("3.0~rc1-1", LESS, "3.0-1"),
            ("1.0", EQUAL, "1.0-0"),
            ("0.2", LESS, "1.0-0"),
            ("1.0", LESS, "1.0-0+b1"),
            ("1.0", GREATER, "1.0-0~"),
            ("1.2a+~bCd3", LESS, "1.2a++"),
            ("1.2a+~bCd3", GREATER, "1.2a+~"),
            ("1.4+OOo3.0.0~", LESS, "1.4+OOo3.0.0-4"),
            ("3a9.8", GREATER, "3~10"),
            // Identity
            ("1.2.3", EQUAL, "1.2.3"),
            ("4.4.3-2", EQUAL, "4.4.3-2"),
            ("1:2ab:5", EQUAL, "1:2ab:5"),
            ("7:1-a:b-5", EQUAL, "7:1-a:b-5"),
            ("57:1.2.3abYZ+~-4-5", EQUAL, "57:1.2.3abYZ+~-4-5"),
            ("1.2.3", EQUAL, "0:1.2.3"),
            ("1.2.3", EQUAL, "1.2.3-0"),
            // Plain orderings
            ("1.2.3", LESS, "1.2.3-1"),
            ("1.2.3", LESS, "1.2.4"),
            ("1.2.4", GREATER, "1.2.3"),
            ("1.2.24", GREATER, "1.2.3"),
            ("0.10.0", GREATER, "0.8.7"),
            ("3.2", GREATER, "2.3"),
            ("1.3.2a", GREATER, "1.3.2"),
            ("0.5.0~git", LESS, "0.5.0~git2"),
            ("2a", LESS, "21"),
            ("1.3.2a", LESS, "1.3.2b"),
            ("1:1.2.3", GREATER, "1.2.4"),
            ("1:1.2.3", LESS, "1:1.2.4"),
            ("5:2", GREATER, "304-2"),
            ("5:2", LESS, "304:2"),
            ("25:2", GREATER, "3:2"),
            ("1:2:123", LESS, "1:12:3"),
            ("1.2-5", LESS, "1.2-3-5"),
            ("3a9.8", LESS, "3.10.2"),
            ("2.4.7-1", LESS, "2.4.7-z"),
            ("1.002-1+b2", GREATER, "1.00"),
        ];

        for (v1, expected, v2) in cases {
            assert_eq!(compare(v1, v2), expected, "{} vs. {}", v1, v2);
            assert_eq!(
                compare(v2, v1),
                expected.reverse(),
                "{} vs. {} (reversed)",
                v2,
                v1
            );
        }
    }

    #[test]
    fn test_sentinel_dominance() {
        for v in ["0", "1:0.4", "1.0~", "57:1.2.3abYZ+~-4-5"] {
            assert_eq!(compare(MIN_VERSION, v), LESS, "#MINV# vs. {}", v);
            assert_eq!(compare(v, MIN_VERSION), GREATER, "{} vs. #MINV#", v);
            assert_eq!(compare(MAX_VERSION, v), GREATER, "#MAXV# vs. {}", v);
            assert_eq!(compare(v, MAX_VERSION), LESS, "{} vs. #MAXV#", v);
        }
        assert_eq!(compare(MIN_VERSION, MIN_VERSION), EQUAL);
        assert_eq!(compare(MAX_VERSION, MAX_VERSION), EQUAL);
        assert_eq!(compare(MIN_VERSION, MAX_VERSION), LESS);
    }

    #[test]
    fn test_transitivity_over_chain() {
        // A sorted chain; every pair must agree with the chain order.
        let chain = ["1.0~", "1.0", "1.0-0+b1", "1.0.1", "1:0.1"];
        for (i, a) in chain.iter().enumerate() {
            for (j, b) in chain.iter().enumerate() {
                assert_eq!(compare(a, b), i.cmp(&j), "{} vs. {}", a, b);
            }
        }
    }

    #[test]
    fn test_display_round_trip() {
        for input in [
            "0",
            "1:0",
            "0:0-0",
            "1.18.36-0.17.35-18",
            "9:1.18.36:5.4-20",
            "57:1.2.3abYZ+~-4-5",
            MIN_VERSION,
            MAX_VERSION,
        ] {
            let parsed = Version::parse(input).unwrap();
            assert_eq!(
                Version::parse(&parsed.to_string()).unwrap(),
                parsed,
                "round-tripping {:?}",
                input
            );
        }
    }

    #[test]
    fn test_display_canonical_form() {
        assert_eq!(Version::parse("0:1.2-3").unwrap().to_string(), "1.2-3");
        assert_eq!(Version::parse("1:1.2").unwrap().to_string(), "1:1.2");
        assert_eq!(Version::parse("1.2-").unwrap().to_string(), "1.2");
        assert_eq!(Version::parse(MAX_VERSION).unwrap().to_string(), MAX_VERSION);
    }

    #[test]
    fn test_serde_as_string() {
        let version = Version::parse("1:1.2-3").unwrap();
        let encoded = serde_json::to_string(&version).unwrap();
        assert_eq!(encoded, "\"1:1.2-3\"");
        let decoded: Version = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, version);
        assert!(serde_json::from_str::<Version>("\"not a version!\"").is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Unknown < Severity::Negligible);
        assert!(Severity::Negligible < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_change_marker_equality() {
        let a = ChangeMarker::new("abc123");
        let b = ChangeMarker::new("abc123");
        let c = ChangeMarker::new("def456");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "abc123");
    }
}
