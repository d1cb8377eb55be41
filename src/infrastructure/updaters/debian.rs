//! Debian Security Tracker updater.
//!
//! The tracker publishes one large JSON document covering every package and
//! release. There is no cheap change signal, so the change marker is a
//! SHA-256 digest of the fetched body: identical bytes mean an identical
//! feed, and the run ends before decoding anything.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{content_digest, MarkerUpdate, UpdateResponse, VulnerabilityUpdater};
use crate::application::errors::{DecodeError, UpdateError};
use crate::domain::{Advisory, AffectedFeature, ChangeMarker, Namespace, Severity, Version};
use crate::infrastructure::fetchers::FeedFetcher;
use crate::infrastructure::version_format::{dpkg, FormatRegistry};

pub const UPDATER_NAME: &str = "debian";
pub const DEFAULT_URL: &str = "https://security-tracker.debian.org/tracker/data/json";

const MARKER_KEY: &str = "debian-updater";
const TRACKER_PREFIX: &str = "https://security-tracker.debian.org/tracker";

/// Codename to release-number mapping; releases absent here are reported as
/// notes instead of silently producing unusable namespaces.
const RELEASES: &[(&str, &str)] = &[
    ("wheezy", "7"),
    ("jessie", "8"),
    ("stretch", "9"),
    ("buster", "10"),
    ("bullseye", "11"),
    ("bookworm", "12"),
    ("trixie", "13"),
    ("sid", "unstable"),
];

// BTreeMaps keep decoding deterministic; the upstream document is one big
// unordered object.
type DebianFeed = BTreeMap<String, BTreeMap<String, DebianVulnerability>>;

#[derive(Debug, Deserialize)]
struct DebianVulnerability {
    #[serde(default)]
    description: String,
    #[serde(default)]
    releases: BTreeMap<String, DebianReleaseStatus>,
}

#[derive(Debug, Deserialize)]
struct DebianReleaseStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    urgency: String,
    #[serde(default)]
    fixed_version: Option<String>,
}

pub struct DebianUpdater {
    url: String,
    registry: Arc<FormatRegistry>,
}

impl DebianUpdater {
    pub fn new(url: impl Into<String>, registry: Arc<FormatRegistry>) -> Self {
        Self {
            url: url.into(),
            registry,
        }
    }

    fn release_number(codename: &str) -> Option<&'static str> {
        RELEASES
            .iter()
            .find(|(name, _)| *name == codename)
            .map(|(_, number)| *number)
    }

    fn parse_feed(&self, feed: &DebianFeed) -> (Vec<Advisory>, Vec<String>) {
        let mut advisories: BTreeMap<&str, Advisory> = BTreeMap::new();
        let mut unknown_releases = BTreeSet::new();

        for (package, vulnerabilities) in feed {
            for (name, vulnerability) in vulnerabilities {
                // The tracker also carries temporary TEMP-* identifiers.
                if !name.starts_with("CVE-") {
                    continue;
                }

                for (codename, release) in &vulnerability.releases {
                    let Some(number) = Self::release_number(codename) else {
                        unknown_releases.insert(codename.clone());
                        continue;
                    };

                    if release.status == "undetermined" {
                        continue;
                    }

                    let affected_version = if release.fixed_version.as_deref() == Some("0") {
                        // A fixed version of "0" means the package was never
                        // affected in this release.
                        Version::Minimum
                    } else if release.status == "open" {
                        Version::Maximum
                    } else if release.status == "resolved" {
                        let Some(fixed) = release.fixed_version.as_deref() else {
                            continue;
                        };
                        match self.registry.validate(dpkg::FORMAT_NAME, fixed) {
                            Ok(true) => {}
                            Ok(false) => {
                                warn!(version = fixed, "could not parse package version, skipping record");
                                continue;
                            }
                            Err(error) => {
                                warn!(%error, "version format lookup failed, skipping record");
                                continue;
                            }
                        }
                        match Version::parse(fixed) {
                            Ok(version) => version,
                            Err(_) => continue,
                        }
                    } else {
                        continue;
                    };

                    let advisory = advisories.entry(name.as_str()).or_insert_with(|| {
                        let mut advisory =
                            Advisory::new(name.clone(), format!("{}/{}", TRACKER_PREFIX, name));
                        advisory.description = vulnerability.description.clone();
                        advisory
                    });

                    // One urgency per affected package; the highest wins.
                    let severity = severity_from_urgency(&release.urgency);
                    if severity > advisory.severity {
                        advisory.severity = severity;
                    }

                    advisory.affected.push(AffectedFeature::new(
                        package.clone(),
                        Namespace::new(format!("debian:{}", number), dpkg::FORMAT_NAME),
                        affected_version,
                    ));
                }
            }
        }

        let notes = unknown_releases
            .into_iter()
            .map(|codename| {
                format!(
                    "Debian {} is not mapped to any version number (eg. jessie->8), skipping it",
                    codename
                )
            })
            .collect();

        (advisories.into_values().collect(), notes)
    }
}

fn severity_from_urgency(urgency: &str) -> Severity {
    match urgency {
        "not yet assigned" => Severity::Unknown,
        "end-of-life" | "unimportant" => Severity::Negligible,
        "low" | "low*" | "low**" => Severity::Low,
        "medium" | "medium*" | "medium**" => Severity::Medium,
        "high" | "high*" | "high**" => Severity::High,
        _ => {
            warn!(urgency, "could not determine a severity from urgency");
            Severity::Unknown
        }
    }
}

#[async_trait]
impl VulnerabilityUpdater for DebianUpdater {
    fn name(&self) -> &'static str {
        UPDATER_NAME
    }

    fn marker_keys(&self) -> Vec<String> {
        vec![MARKER_KEY.to_string()]
    }

    async fn update(
        &self,
        fetcher: &dyn FeedFetcher,
        last: &HashMap<String, ChangeMarker>,
    ) -> Result<UpdateResponse, UpdateError> {
        info!("start fetching Debian vulnerabilities");
        let body = fetcher.get(&self.url).await?;

        let digest = content_digest(&body.bytes);
        if last.get(MARKER_KEY) == Some(&digest) {
            debug!("Debian feed unchanged");
            return Ok(UpdateResponse {
                markers: vec![MarkerUpdate::unchanged(MARKER_KEY, digest)],
                ..UpdateResponse::default()
            });
        }

        let feed: DebianFeed =
            serde_json::from_slice(&body.bytes).map_err(DecodeError::Json)?;
        let (advisories, notes) = self.parse_feed(&feed);

        Ok(UpdateResponse {
            advisories,
            markers: vec![MarkerUpdate::changed(MARKER_KEY, digest)],
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"{
        "nginx": {
            "CVE-2021-23017": {
                "description": "Off-by-one in ngx_resolver_copy",
                "releases": {
                    "bookworm": {
                        "status": "resolved",
                        "urgency": "medium",
                        "fixed_version": "1.20.1-1"
                    },
                    "sid": {
                        "status": "open",
                        "urgency": "low"
                    },
                    "lenny": {
                        "status": "resolved",
                        "urgency": "low",
                        "fixed_version": "1.0-1"
                    }
                }
            },
            "TEMP-0000000-AAAAAA": {
                "description": "placeholder",
                "releases": {
                    "bookworm": {"status": "open", "urgency": "unimportant"}
                }
            }
        },
        "zlib": {
            "CVE-2018-25032": {
                "description": "Memory corruption in deflate",
                "releases": {
                    "bookworm": {
                        "status": "resolved",
                        "urgency": "high",
                        "fixed_version": "0"
                    },
                    "bullseye": {"status": "undetermined", "urgency": "low"},
                    "buster": {
                        "status": "resolved",
                        "urgency": "low",
                        "fixed_version": "not a ver$ion"
                    }
                }
            }
        }
    }"#;

    fn updater() -> DebianUpdater {
        DebianUpdater::new(DEFAULT_URL, Arc::new(FormatRegistry::with_default_formats()))
    }

    #[test]
    fn test_parse_feed() {
        let feed: DebianFeed = serde_json::from_str(FEED).unwrap();
        let (advisories, notes) = updater().parse_feed(&feed);

        // TEMP-* entries are skipped entirely.
        assert_eq!(advisories.len(), 2);

        let nginx = advisories
            .iter()
            .find(|advisory| advisory.name == "CVE-2021-23017")
            .unwrap();
        assert_eq!(
            nginx.link,
            "https://security-tracker.debian.org/tracker/CVE-2021-23017"
        );
        assert_eq!(nginx.description, "Off-by-one in ngx_resolver_copy");
        assert_eq!(nginx.severity, Severity::Medium);
        assert_eq!(nginx.affected.len(), 2);

        let resolved = nginx
            .affected
            .iter()
            .find(|feature| feature.namespace.name == "debian:12")
            .unwrap();
        assert_eq!(resolved.name, "nginx");
        assert_eq!(resolved.namespace.version_format, "dpkg");
        assert_eq!(
            resolved.affected_version,
            Version::parse("1.20.1-1").unwrap()
        );
        assert_eq!(
            resolved.fixed_in_version,
            Some(Version::parse("1.20.1-1").unwrap())
        );

        let open = nginx
            .affected
            .iter()
            .find(|feature| feature.namespace.name == "debian:unstable")
            .unwrap();
        assert_eq!(open.affected_version, Version::Maximum);
        assert_eq!(open.fixed_in_version, None);

        // fixed_version "0" means never affected; undetermined and malformed
        // versions drop only their own record.
        let zlib = advisories
            .iter()
            .find(|advisory| advisory.name == "CVE-2018-25032")
            .unwrap();
        assert_eq!(zlib.severity, Severity::High);
        assert_eq!(zlib.affected.len(), 1);
        assert_eq!(zlib.affected[0].affected_version, Version::Minimum);
        assert_eq!(
            zlib.affected[0].fixed_in_version,
            Some(Version::Minimum)
        );

        // The unknown "lenny" release surfaces as a note, not an error.
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("lenny"));
    }

    #[test]
    fn test_severity_from_urgency() {
        assert_eq!(severity_from_urgency("not yet assigned"), Severity::Unknown);
        assert_eq!(severity_from_urgency("unimportant"), Severity::Negligible);
        assert_eq!(severity_from_urgency("low**"), Severity::Low);
        assert_eq!(severity_from_urgency("medium"), Severity::Medium);
        assert_eq!(severity_from_urgency("high"), Severity::High);
        assert_eq!(severity_from_urgency("wat"), Severity::Unknown);
    }
}
