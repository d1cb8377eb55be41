//! Vulnfeed - one-shot feed refresh entry point

use std::sync::Arc;
use std::time::Duration;

use vulnfeed::{
    infrastructure::{
        fetchers::HttpFeedFetcher,
        repositories::InMemoryMarkerRepository,
        updaters::{alpine::AlpineUpdater, debian::DebianUpdater, ubuntu::UbuntuUpdater},
        version_format::FormatRegistry,
    },
    application::UpdateService,
    init_tracing, Config,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load().unwrap_or_else(|_| {
        eprintln!("Failed to load configuration, using defaults");
        Config::default()
    });

    init_tracing(&config.logging)?;
    tracing::info!(
        build_date = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"),
        "starting vulnfeed"
    );

    let registry = Arc::new(FormatRegistry::with_default_formats());
    let fetcher = Arc::new(HttpFeedFetcher::new(Duration::from_secs(
        config.http.timeout_seconds,
    )));
    let markers = Arc::new(InMemoryMarkerRepository::new());

    let mut service = UpdateService::new(fetcher, markers);
    if config.feeds.debian.enabled {
        service.register_updater(Arc::new(DebianUpdater::new(
            config.feeds.debian.url.clone(),
            registry.clone(),
        )));
    }
    if config.feeds.ubuntu.enabled {
        service.register_updater(Arc::new(UbuntuUpdater::new(
            config.feeds.ubuntu.base_url.clone(),
            config.feeds.ubuntu.releases.clone(),
        )));
    }
    if config.feeds.alpine.enabled {
        service.register_updater(Arc::new(AlpineUpdater::new(
            config.feeds.alpine.base_url.clone(),
            config.feeds.alpine.branches.clone(),
            config.feeds.alpine.repositories.clone(),
            registry.clone(),
        )));
    }

    let mut failures = 0usize;
    for (updater, outcome) in service.run_all().await {
        match outcome {
            Ok(result) => {
                for note in &result.notes {
                    tracing::warn!(%updater, %note, "updater note");
                }
                tracing::info!(
                    %updater,
                    advisories = result.advisories.len(),
                    unchanged = result.unchanged(),
                    "run complete"
                );
            }
            Err(error) => {
                failures += 1;
                tracing::error!(%updater, %error, "run failed");
            }
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
