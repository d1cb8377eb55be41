//! Pluggable version-format comparators and their process-wide registry.
//!
//! Every other component stays format-agnostic by naming the format
//! (`"dpkg"`) instead of hard-wiring a comparison algorithm. Comparator
//! implementations live in sibling modules and are registered once, at
//! process initialization, before any lookup happens.

pub mod dpkg;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::VersionError;

/// Any algorithm that can validate and totally order the version strings of
/// one packaging ecosystem.
pub trait VersionComparator: Send + Sync {
    /// Attempts to parse a version string and reports whether it is valid.
    fn valid(&self, version: &str) -> bool;

    /// Orders two version strings. The first operand's parse error wins when
    /// both are malformed.
    fn compare(&self, a: &str, b: &str) -> Result<Ordering, VersionError>;
}

/// Name-keyed table of registered version comparators.
///
/// Reads vastly outnumber writes: `register` runs once per format at startup,
/// while `validate`/`compare` are called for every record of every feed, from
/// arbitrarily many tasks at once. A reader/writer lock keeps the readers
/// from ever blocking each other.
///
/// Registering under an empty or already-taken name is a programming error
/// and panics; asking for an unregistered format is a data error and is
/// reported as [`VersionError::UnknownFormat`].
pub struct FormatRegistry {
    comparators: RwLock<HashMap<String, Arc<dyn VersionComparator>>>,
}

impl FormatRegistry {
    /// An empty registry, mostly useful to tests that want full control over
    /// what is registered.
    pub fn new() -> Self {
        Self {
            comparators: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with every comparator this crate ships.
    pub fn with_default_formats() -> Self {
        let registry = Self::new();
        registry.register(dpkg::FORMAT_NAME, Arc::new(dpkg::DpkgComparator));
        registry
    }

    /// Registers a comparator under `name`. Panics on an empty name or a
    /// duplicate registration: both are startup-time programming errors that
    /// must not surface as runtime failures deep inside a feed run.
    pub fn register(&self, name: &str, comparator: Arc<dyn VersionComparator>) {
        if name.is_empty() {
            panic!("cannot register a version comparator under an empty name");
        }

        let mut comparators = self
            .comparators
            .write()
            .expect("version format registry lock poisoned");
        if comparators.contains_key(name) {
            panic!("version comparator already registered for {:?}", name);
        }

        comparators.insert(name.to_string(), comparator);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn VersionComparator>> {
        self.comparators
            .read()
            .expect("version format registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Validates `version` against the named format.
    pub fn validate(&self, format: &str, version: &str) -> Result<bool, VersionError> {
        Ok(self.comparator(format)?.valid(version))
    }

    /// Compares two version strings under the named format.
    pub fn compare(&self, format: &str, a: &str, b: &str) -> Result<Ordering, VersionError> {
        self.comparator(format)?.compare(a, b)
    }

    fn comparator(&self, format: &str) -> Result<Arc<dyn VersionComparator>, VersionError> {
        self.lookup(format).ok_or_else(|| VersionError::UnknownFormat {
            format: format.to_string(),
        })
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_default_formats()
    }
}
