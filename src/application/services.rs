//! Application services orchestrating updater runs

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::errors::UpdateError;
use crate::domain::{Advisory, ChangeMarker};
use crate::infrastructure::fetchers::FeedFetcher;
use crate::infrastructure::repositories::MarkerRepository;
use crate::infrastructure::updaters::{MarkerUpdate, VulnerabilityUpdater};

/// Outcome of one updater run: the advisories it emitted, the markers it
/// proposed (re-affirmed ones included) and any non-fatal notes.
#[derive(Debug)]
pub struct UpdateResult {
    pub updater: String,
    pub advisories: Vec<Advisory>,
    pub markers: Vec<MarkerUpdate>,
    pub notes: Vec<String>,
}

impl UpdateResult {
    /// True when no sub-feed of the source had changed and the run was an
    /// explicit no-op.
    pub fn unchanged(&self) -> bool {
        self.markers.iter().all(|marker| !marker.changed)
    }
}

/// Drives the synchronization protocol for every registered updater:
/// read the last persisted markers, let the updater fetch and decode, and
/// persist the proposed markers only when the run succeeded. A failed run
/// leaves every previously persisted marker untouched, so the same work is
/// retried on the next pass.
///
/// Updaters run concurrently with each other, one task per source; runs of
/// the *same* updater are serialized through a per-updater mutex so that two
/// overlapping runs cannot both observe "changed" and race their marker
/// writes.
pub struct UpdateService {
    updaters: Vec<Arc<dyn VulnerabilityUpdater>>,
    locks: HashMap<&'static str, Arc<Mutex<()>>>,
    fetcher: Arc<dyn FeedFetcher>,
    markers: Arc<dyn MarkerRepository>,
}

impl UpdateService {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, markers: Arc<dyn MarkerRepository>) -> Self {
        Self {
            updaters: Vec::new(),
            locks: HashMap::new(),
            fetcher,
            markers,
        }
    }

    pub fn register_updater(&mut self, updater: Arc<dyn VulnerabilityUpdater>) {
        self.locks
            .insert(updater.name(), Arc::new(Mutex::new(())));
        self.updaters.push(updater);
    }

    /// Runs a single updater by name.
    pub async fn run_one(&self, name: &str) -> Option<Result<UpdateResult, UpdateError>> {
        let updater = self
            .updaters
            .iter()
            .find(|updater| updater.name() == name)?
            .clone();
        let lock = self.locks.get(updater.name())?.clone();

        Some(Self::run_protocol(updater, self.fetcher.clone(), self.markers.clone(), lock).await)
    }

    /// Runs every registered updater concurrently. One source failing never
    /// stops the others; each result is reported under its updater name.
    pub async fn run_all(&self) -> Vec<(String, Result<UpdateResult, UpdateError>)> {
        let mut join_set = JoinSet::new();

        for updater in &self.updaters {
            let updater = updater.clone();
            let fetcher = self.fetcher.clone();
            let markers = self.markers.clone();
            let lock = self
                .locks
                .get(updater.name())
                .expect("every registered updater has a lock")
                .clone();

            join_set.spawn(async move {
                let name = updater.name().to_string();
                let result = Self::run_protocol(updater, fetcher, markers, lock).await;
                (name, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(join_error) => error!(%join_error, "updater task panicked"),
            }
        }
        results
    }

    async fn run_protocol(
        updater: Arc<dyn VulnerabilityUpdater>,
        fetcher: Arc<dyn FeedFetcher>,
        markers: Arc<dyn MarkerRepository>,
        lock: Arc<Mutex<()>>,
    ) -> Result<UpdateResult, UpdateError> {
        let _serialized = lock.lock().await;
        info!(updater = updater.name(), "starting updater run");

        // Plain reads; no storage lock stays open across the fetch below.
        let mut last: HashMap<String, ChangeMarker> = HashMap::new();
        for key in updater.marker_keys() {
            if let Some(marker) = markers.find_marker(&key).await? {
                last.insert(key, marker);
            }
        }

        let response = updater.update(fetcher.as_ref(), &last).await?;

        // The updater succeeded; only now do its proposed markers become
        // durable. Re-affirmed markers are left alone.
        for marker in response.markers.iter().filter(|marker| marker.changed) {
            markers.persist_marker(&marker.key, &marker.marker).await?;
        }

        let result = UpdateResult {
            updater: updater.name().to_string(),
            advisories: response.advisories,
            markers: response.markers,
            notes: response.notes,
        };

        if result.unchanged() {
            debug!(updater = updater.name(), "no update");
        } else {
            info!(
                updater = updater.name(),
                advisories = result.advisories.len(),
                notes = result.notes.len(),
                "updater run finished"
            );
        }

        Ok(result)
    }
}
