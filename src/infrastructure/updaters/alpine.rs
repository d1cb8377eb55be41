//! Alpine secdb updater.
//!
//! The secdb publishes one YAML file per branch and repository
//! (`v3.19/main.yaml`, `v3.19/community.yaml`, …), each listing packages with
//! their `secfixes: {version: [CVE ids]}` records. Every file is an
//! independently-versioned sub-feed with its own content-digest marker. The
//! apk version grammar is close enough to dpkg that the records validate
//! under the dpkg comparator, as the original tracker ingestion did.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{content_digest, MarkerUpdate, UpdateResponse, VulnerabilityUpdater};
use crate::application::errors::{DecodeError, UpdateError};
use crate::domain::{Advisory, AffectedFeature, ChangeMarker, Namespace, Version};
use crate::infrastructure::fetchers::FeedFetcher;
use crate::infrastructure::version_format::{dpkg, FormatRegistry};

pub const UPDATER_NAME: &str = "alpine";
pub const DEFAULT_BASE_URL: &str = "https://secdb.alpinelinux.org";

const VULN_URL_PREFIX: &str = "https://security.alpinelinux.org/vuln";

#[derive(Debug, Deserialize)]
struct SecDb {
    #[serde(default)]
    distroversion: String,
    #[serde(default)]
    packages: Vec<PackageWrapper>,
}

#[derive(Debug, Deserialize)]
struct PackageWrapper {
    pkg: SecDbPackage,
}

#[derive(Debug, Deserialize)]
struct SecDbPackage {
    name: String,
    // The fix-version keys are left as raw YAML values: the secdb writes the
    // "0" marker unquoted, which parses as a number, not a string.
    #[serde(default)]
    secfixes: serde_yaml::Mapping,
}

pub struct AlpineUpdater {
    base_url: String,
    branches: Vec<String>,
    repositories: Vec<String>,
    registry: Arc<FormatRegistry>,
}

impl AlpineUpdater {
    pub fn new(
        base_url: impl Into<String>,
        branches: Vec<String>,
        repositories: Vec<String>,
        registry: Arc<FormatRegistry>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            branches,
            repositories,
            registry,
        }
    }

    fn file_url(&self, branch: &str, repository: &str) -> String {
        format!("{}/{}/{}.yaml", self.base_url, branch, repository)
    }

    fn marker_key(branch: &str, repository: &str) -> String {
        format!("alpine-updater/{}/{}", branch, repository)
    }

    /// Folds one secdb file into the advisory map, keyed by CVE id: the same
    /// CVE regularly appears under several packages and branches.
    fn parse_file(&self, db: &SecDb, advisories: &mut BTreeMap<String, Advisory>) {
        let namespace_name = format!("alpine:{}", db.distroversion);

        for wrapper in &db.packages {
            let package = &wrapper.pkg;
            for (version_key, names_value) in &package.secfixes {
                let version = match version_key {
                    serde_yaml::Value::String(version) => version.clone(),
                    serde_yaml::Value::Number(number) => number.to_string(),
                    other => {
                        warn!(?other, package = %package.name, "unexpected secfixes key, skipping record");
                        continue;
                    }
                };
                let Ok(vulnerability_names) =
                    serde_yaml::from_value::<Vec<String>>(names_value.clone())
                else {
                    warn!(version = %version, package = %package.name, "malformed secfixes entry, skipping record");
                    continue;
                };

                // "0" marks advisories the branch will not fix: the package
                // stays affected without an upper bound.
                let affected_version = if version == "0" {
                    Version::Maximum
                } else {
                    match self.registry.validate(dpkg::FORMAT_NAME, &version) {
                        Ok(true) => match Version::parse(&version) {
                            Ok(parsed) => parsed,
                            Err(_) => continue,
                        },
                        Ok(false) => {
                            warn!(version = %version, package = %package.name, "could not parse package version, skipping record");
                            continue;
                        }
                        Err(error) => {
                            warn!(%error, "version format lookup failed, skipping record");
                            continue;
                        }
                    }
                };

                for name in vulnerability_names {
                    let advisory = advisories.entry(name.clone()).or_insert_with(|| {
                        Advisory::new(name.as_str(), format!("{}/{}", VULN_URL_PREFIX, name))
                    });
                    advisory.affected.push(AffectedFeature::new(
                        package.name.clone(),
                        Namespace::new(namespace_name.clone(), dpkg::FORMAT_NAME),
                        affected_version.clone(),
                    ));
                }
            }
        }
    }
}

#[async_trait]
impl VulnerabilityUpdater for AlpineUpdater {
    fn name(&self) -> &'static str {
        UPDATER_NAME
    }

    fn marker_keys(&self) -> Vec<String> {
        self.branches
            .iter()
            .flat_map(|branch| {
                self.repositories
                    .iter()
                    .map(|repository| Self::marker_key(branch, repository))
            })
            .collect()
    }

    async fn update(
        &self,
        fetcher: &dyn FeedFetcher,
        last: &HashMap<String, ChangeMarker>,
    ) -> Result<UpdateResponse, UpdateError> {
        info!("start fetching Alpine vulnerabilities");
        let mut response = UpdateResponse::default();
        let mut advisories = BTreeMap::new();

        for branch in &self.branches {
            for repository in &self.repositories {
                let key = Self::marker_key(branch, repository);
                let url = self.file_url(branch, repository);

                let body = fetcher.get(&url).await?;
                let digest = content_digest(&body.bytes);
                if last.get(&key) == Some(&digest) {
                    debug!(%branch, %repository, "secdb file unchanged");
                    response.markers.push(MarkerUpdate::unchanged(key, digest));
                    continue;
                }

                let db: SecDb =
                    serde_yaml::from_slice(&body.bytes).map_err(DecodeError::Yaml)?;
                self.parse_file(&db, &mut advisories);
                response.markers.push(MarkerUpdate::changed(key, digest));
            }
        }

        response.advisories = advisories.into_values().collect();
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECDB: &str = r#"
distroversion: v3.19
packages:
  - pkg:
      name: openssl
      secfixes:
        3.1.4-r1:
          - CVE-2023-5678
        0:
          - CVE-2023-9999
  - pkg:
      name: curl
      secfixes:
        8.5.0-r0:
          - CVE-2023-46218
          - CVE-2023-5678
        bogus!version:
          - CVE-2023-0000
"#;

    fn updater() -> AlpineUpdater {
        AlpineUpdater::new(
            DEFAULT_BASE_URL,
            vec!["v3.19".to_string()],
            vec!["main".to_string()],
            Arc::new(FormatRegistry::with_default_formats()),
        )
    }

    #[test]
    fn test_parse_file() {
        let db: SecDb = serde_yaml::from_str(SECDB).unwrap();
        let mut advisories = BTreeMap::new();
        updater().parse_file(&db, &mut advisories);

        // CVE-2023-0000 is dropped with its malformed version; the rest stay.
        assert_eq!(advisories.len(), 3);
        assert!(!advisories.contains_key("CVE-2023-0000"));

        // The same CVE under two packages folds into one advisory.
        let shared = &advisories["CVE-2023-5678"];
        assert_eq!(shared.link, "https://security.alpinelinux.org/vuln/CVE-2023-5678");
        assert_eq!(shared.affected.len(), 2);
        let names: Vec<&str> = shared
            .affected
            .iter()
            .map(|feature| feature.name.as_str())
            .collect();
        assert!(names.contains(&"openssl"));
        assert!(names.contains(&"curl"));
        assert!(shared
            .affected
            .iter()
            .all(|feature| feature.namespace.name == "alpine:v3.19"
                && feature.namespace.version_format == "dpkg"));

        // A "0" fix version means affected without an upper bound.
        let unfixed = &advisories["CVE-2023-9999"];
        assert_eq!(unfixed.affected.len(), 1);
        assert_eq!(unfixed.affected[0].affected_version, Version::Maximum);
        assert_eq!(unfixed.affected[0].fixed_in_version, None);

        let fixed = &advisories["CVE-2023-46218"];
        assert_eq!(
            fixed.affected[0].fixed_in_version,
            Some(Version::parse("8.5.0-r0").unwrap())
        );
    }
}
