//! Feed-specific vulnerability updaters.
//!
//! Each updater knows one upstream source: how to obtain its change marker,
//! how to decode its body and how to turn the decoded records into normalized
//! advisories. The synchronization protocol that drives them (read last
//! markers, let the updater run, persist the proposed markers only on
//! success) lives in [`crate::application::UpdateService`].

pub mod alpine;
pub mod debian;
pub mod ubuntu;

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::fetchers::FeedFetcher;
use crate::application::errors::UpdateError;
use crate::domain::{Advisory, ChangeMarker};

/// A proposed marker value for one sub-feed key. `changed` is false when the
/// updater merely re-affirms what was already persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerUpdate {
    pub key: String,
    pub marker: ChangeMarker,
    pub changed: bool,
}

impl MarkerUpdate {
    pub fn changed(key: impl Into<String>, marker: ChangeMarker) -> Self {
        Self {
            key: key.into(),
            marker,
            changed: true,
        }
    }

    pub fn unchanged(key: impl Into<String>, marker: ChangeMarker) -> Self {
        Self {
            key: key.into(),
            marker,
            changed: false,
        }
    }
}

/// Everything one updater run produced. An unchanged upstream yields zero
/// advisories and only re-affirmed markers; `notes` carries non-fatal
/// observations the caller may surface as warnings.
#[derive(Debug, Default)]
pub struct UpdateResponse {
    pub advisories: Vec<Advisory>,
    pub markers: Vec<MarkerUpdate>,
    pub notes: Vec<String>,
}

impl UpdateResponse {
    /// True when no sub-feed of the source had changed.
    pub fn unchanged(&self) -> bool {
        self.markers.iter().all(|marker| !marker.changed)
    }
}

/// One upstream advisory source.
#[async_trait]
pub trait VulnerabilityUpdater: Send + Sync {
    /// Stable identifier, also used to serialize overlapping runs.
    fn name(&self) -> &'static str;

    /// Every marker key this updater tracks; one per independently-versioned
    /// sub-feed.
    fn marker_keys(&self) -> Vec<String>;

    /// Fetches whatever changed since `last` and decodes it into advisories.
    /// Implementations must not persist anything themselves: the proposed
    /// markers in the response are written by the caller, and only when this
    /// method returns `Ok`.
    async fn update(
        &self,
        fetcher: &dyn FeedFetcher,
        last: &HashMap<String, ChangeMarker>,
    ) -> Result<UpdateResponse, UpdateError>;
}

/// Content digest used as a change marker by sources without a cheaper
/// signal.
pub(crate) fn content_digest(bytes: &[u8]) -> ChangeMarker {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ChangeMarker::new(hex::encode(hasher.finalize()))
}
