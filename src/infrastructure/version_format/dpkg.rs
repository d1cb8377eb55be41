//! The dpkg comparator, registered for every Debian-derived feed.
//!
//! Thin adapter over the engine in [`crate::domain::Version`]; Alpine's apk
//! versions are close enough to the dpkg grammar that its feed registers
//! under this format too, as the original trackers do.

use std::cmp::Ordering;

use super::VersionComparator;
use crate::domain::{Version, VersionError};

/// The name by which the dpkg comparator is registered.
pub const FORMAT_NAME: &str = "dpkg";

pub struct DpkgComparator;

impl VersionComparator for DpkgComparator {
    fn valid(&self, version: &str) -> bool {
        Version::parse(version).is_ok()
    }

    fn compare(&self, a: &str, b: &str) -> Result<Ordering, VersionError> {
        let a = Version::parse(a)?;
        let b = Version::parse(b)?;
        Ok(a.cmp_precedence(&b))
    }
}
