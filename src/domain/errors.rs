//! Domain-specific error types

use std::fmt;

use thiserror::Error;

/// The two character-class-checked segments of a package version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSegment {
    Upstream,
    Revision,
}

impl fmt::Display for VersionSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSegment::Upstream => write!(f, "version"),
            VersionSegment::Revision => write!(f, "revision"),
        }
    }
}

/// Errors produced while parsing or comparing package versions.
///
/// All variants are recoverable: a caller facing a malformed version string is
/// expected to log it, drop the offending record and carry on with the rest of
/// the feed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("version string is empty")]
    EmptyVersion,

    #[error("epoch in version is not a number")]
    NonNumericEpoch,

    #[error("epoch in version is negative")]
    NegativeEpoch,

    #[error("invalid character {character:?} in {segment}")]
    InvalidCharacter {
        character: char,
        segment: VersionSegment,
    },

    #[error("unknown version format: {format}")]
    UnknownFormat { format: String },
}
