//! Infrastructure Layer - External concerns and implementations
//!
//! Version-format comparators, feed transports, marker persistence and the
//! feed-specific updaters live here; the domain layer never imports from
//! this module.

pub mod fetchers;
pub mod repositories;
pub mod updaters;
pub mod version_format;

// Re-export specific items to avoid ambiguous glob conflicts
pub use fetchers::{FeedFetcher, FetchMetadata, FetchedBody, HttpFeedFetcher};
pub use repositories::{InMemoryMarkerRepository, MarkerRepository};
pub use updaters::{MarkerUpdate, UpdateResponse, VulnerabilityUpdater};
pub use version_format::{FormatRegistry, VersionComparator};
