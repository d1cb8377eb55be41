//! Ubuntu OVAL updater.
//!
//! Canonical publishes one OVAL XML document per release channel, each
//! independently versioned. A `HEAD` request per channel yields a
//! Last-Modified timestamp that serves as the change marker, so unchanged
//! channels cost one round-trip and no download; a channel that does not
//! expose the header falls back to a content digest of the body. Advisory
//! definitions carry boolean criteria trees whose leaf comments name the
//! package, release and fixed version.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{content_digest, MarkerUpdate, UpdateResponse, VulnerabilityUpdater};
use crate::application::errors::{DecodeError, UpdateError};
use crate::domain::{
    Advisory, ChangeMarker, CriteriaNode, CriteriaResolver, Criterion, ExtractedClaims,
    FeatureExtractor, Operator, Severity, MAX_VERSION, MIN_VERSION,
};
use crate::infrastructure::fetchers::FeedFetcher;
use crate::infrastructure::version_format::dpkg;

pub const UPDATER_NAME: &str = "ubuntu";
pub const DEFAULT_BASE_URL: &str = "https://security-metadata.canonical.com/oval";

/// Release leaves ("Ubuntu 22.04 LTS (jammy) is installed.") carry no package
/// data; the release is read from the package comments instead.
const IGNORED_CRITERIONS: &[&str] = &[" is installed"];

/// Codename to release-number mapping; codenames absent here are reported as
/// notes instead of silently producing unusable namespaces.
const RELEASES: &[(&str, &str)] = &[
    ("trusty", "14.04"),
    ("xenial", "16.04"),
    ("bionic", "18.04"),
    ("focal", "20.04"),
    ("jammy", "22.04"),
    ("noble", "24.04"),
];

fn release_number(codename: &str) -> Option<&'static str> {
    RELEASES
        .iter()
        .find(|(name, _)| *name == codename)
        .map(|(_, number)| *number)
}

/// Pattern-matches Ubuntu OVAL criterion comments:
///
/// ```text
/// firefox package in jammy is affected and needs fixing.
/// firefox package in jammy has been fixed (note: '99.0+build2-0ubuntu0.22.04.1').
/// firefox package in jammy is not-affected.
/// ```
///
/// Codenames that do not map to a release number are collected so the updater
/// can surface them as notes.
struct UbuntuCommentExtractor {
    package_pattern: Regex,
    note_pattern: Regex,
    unknown_releases: Mutex<BTreeSet<String>>,
}

impl UbuntuCommentExtractor {
    fn new() -> Self {
        Self {
            package_pattern: Regex::new(r"^(?P<package>\S+) package in (?P<release>\w+)")
                .expect("static pattern"),
            note_pattern: Regex::new(r"\(note: '(?P<version>[^']*)'\)").expect("static pattern"),
            unknown_releases: Mutex::new(BTreeSet::new()),
        }
    }

    fn drain_unknown_releases(&self) -> BTreeSet<String> {
        std::mem::take(
            &mut *self
                .unknown_releases
                .lock()
                .expect("unknown release set lock poisoned"),
        )
    }
}

impl FeatureExtractor for UbuntuCommentExtractor {
    fn extract(&self, comment: &str) -> Option<ExtractedClaims> {
        let caps = self.package_pattern.captures(comment)?;

        let codename = &caps["release"];
        let release = match release_number(codename) {
            Some(number) => Some(format!("ubuntu:{}", number)),
            None => {
                self.unknown_releases
                    .lock()
                    .expect("unknown release set lock poisoned")
                    .insert(codename.to_string());
                None
            }
        };

        let fixed_version = if let Some(note) = self.note_pattern.captures(comment) {
            Some(note["version"].to_string())
        } else if comment.contains("not-affected") {
            Some(MIN_VERSION.to_string())
        } else if comment.contains("is affected") {
            Some(MAX_VERSION.to_string())
        } else {
            None
        };

        Some(ExtractedClaims {
            feature_name: Some(caps["package"].to_string()),
            release,
            fixed_version,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OvalDocument {
    definitions: XmlDefinitions,
}

#[derive(Debug, Deserialize, Default)]
struct XmlDefinitions {
    #[serde(rename = "definition", default)]
    definitions: Vec<XmlDefinition>,
}

#[derive(Debug, Deserialize)]
struct XmlDefinition {
    metadata: XmlMetadata,
    criteria: Option<XmlCriteria>,
}

#[derive(Debug, Deserialize)]
struct XmlMetadata {
    #[serde(default)]
    title: String,
    #[serde(rename = "reference", default)]
    references: Vec<XmlReference>,
    #[serde(default)]
    description: String,
    advisory: Option<XmlAdvisory>,
}

#[derive(Debug, Deserialize)]
struct XmlReference {
    #[serde(rename = "@source", default)]
    source: String,
    #[serde(rename = "@ref_id", default)]
    ref_id: String,
    #[serde(rename = "@ref_url", default)]
    ref_url: String,
}

#[derive(Debug, Deserialize)]
struct XmlAdvisory {
    #[serde(default)]
    severity: String,
}

#[derive(Debug, Deserialize)]
struct XmlCriteria {
    #[serde(rename = "@operator", default)]
    operator: String,
    #[serde(rename = "criteria", default)]
    children: Vec<XmlCriteria>,
    #[serde(rename = "criterion", default)]
    criterions: Vec<XmlCriterion>,
}

#[derive(Debug, Deserialize)]
struct XmlCriterion {
    #[serde(rename = "@test_ref", default)]
    test_ref: String,
    #[serde(rename = "@comment", default)]
    comment: String,
}

impl XmlCriteria {
    fn to_domain(&self) -> CriteriaNode {
        CriteriaNode {
            operator: Operator::from_label(&self.operator),
            children: self.children.iter().map(XmlCriteria::to_domain).collect(),
            criterions: self
                .criterions
                .iter()
                .map(|criterion| Criterion::new(criterion.test_ref.clone(), criterion.comment.clone()))
                .collect(),
        }
    }
}

impl XmlDefinition {
    /// The CVE reference when there is one, the (trimmed) title otherwise.
    fn name(&self) -> String {
        self.metadata
            .references
            .iter()
            .find(|reference| reference.source == "CVE")
            .map(|reference| reference.ref_id.clone())
            .unwrap_or_else(|| self.metadata.title.trim().to_string())
    }

    fn link(&self) -> String {
        self.metadata
            .references
            .iter()
            .find(|reference| reference.source == "CVE")
            .map(|reference| reference.ref_url.clone())
            .unwrap_or_default()
    }
}

fn severity_from_priority(priority: &str) -> Severity {
    match priority.to_lowercase().as_str() {
        "" | "untriaged" => Severity::Unknown,
        "negligible" => Severity::Negligible,
        "low" => Severity::Low,
        "medium" => Severity::Medium,
        "high" => Severity::High,
        "critical" => Severity::Critical,
        other => {
            warn!(priority = other, "could not determine a severity from priority");
            Severity::Unknown
        }
    }
}

pub struct UbuntuUpdater {
    base_url: String,
    releases: Vec<String>,
    resolver: CriteriaResolver,
    ignore_list: Vec<String>,
}

impl UbuntuUpdater {
    pub fn new(base_url: impl Into<String>, releases: Vec<String>) -> Self {
        Self {
            base_url: base_url.into(),
            releases,
            resolver: CriteriaResolver::new(dpkg::FORMAT_NAME),
            ignore_list: IGNORED_CRITERIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn stream_url(&self, release: &str) -> String {
        format!("{}/com.ubuntu.{}.cve.oval.xml", self.base_url, release)
    }

    fn marker_key(release: &str) -> String {
        format!("ubuntu-updater/{}", release)
    }

    fn parse_document(
        &self,
        document: &OvalDocument,
        extractor: &UbuntuCommentExtractor,
    ) -> Vec<Advisory> {
        let mut advisories = Vec::new();

        for definition in &document.definitions.definitions {
            let Some(criteria) = &definition.criteria else {
                continue;
            };

            let tree = criteria.to_domain();
            let affected = self.resolver.resolve(&tree, &self.ignore_list, extractor);
            if affected.is_empty() {
                continue;
            }

            let mut advisory = Advisory::new(definition.name(), definition.link());
            advisory.severity = severity_from_priority(
                definition
                    .metadata
                    .advisory
                    .as_ref()
                    .map(|advisory| advisory.severity.as_str())
                    .unwrap_or(""),
            );
            advisory.description = definition
                .metadata
                .description
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            advisory.affected = affected;
            advisories.push(advisory);
        }

        advisories
    }
}

#[async_trait]
impl VulnerabilityUpdater for UbuntuUpdater {
    fn name(&self) -> &'static str {
        UPDATER_NAME
    }

    fn marker_keys(&self) -> Vec<String> {
        self.releases
            .iter()
            .map(|release| Self::marker_key(release))
            .collect()
    }

    async fn update(
        &self,
        fetcher: &dyn FeedFetcher,
        last: &HashMap<String, ChangeMarker>,
    ) -> Result<UpdateResponse, UpdateError> {
        info!("start fetching Ubuntu vulnerabilities");
        let mut response = UpdateResponse::default();

        for release in &self.releases {
            let key = Self::marker_key(release);
            let url = self.stream_url(release);
            let last_marker = last.get(&key);

            let head = fetcher.head(&url).await?;
            let (bytes, marker) = match head.last_modified {
                Some(timestamp) => {
                    let marker = ChangeMarker::new(timestamp.timestamp().to_string());
                    if last_marker == Some(&marker) {
                        debug!(%release, "OVAL stream unchanged");
                        response.markers.push(MarkerUpdate::unchanged(key, marker));
                        continue;
                    }
                    (fetcher.get(&url).await?.bytes, marker)
                }
                None => {
                    // No Last-Modified header on this stream; the body digest
                    // is the next cheapest signal.
                    let body = fetcher.get(&url).await?;
                    let marker = content_digest(&body.bytes);
                    if last_marker == Some(&marker) {
                        debug!(%release, "OVAL stream unchanged");
                        response.markers.push(MarkerUpdate::unchanged(key, marker));
                        continue;
                    }
                    (body.bytes, marker)
                }
            };

            let document: OvalDocument =
                quick_xml::de::from_reader(bytes.as_slice()).map_err(DecodeError::Xml)?;

            let extractor = UbuntuCommentExtractor::new();
            response
                .advisories
                .extend(self.parse_document(&document, &extractor));
            response.notes.extend(
                extractor.drain_unknown_releases().into_iter().map(|codename| {
                    format!(
                        "Ubuntu {} is not mapped to any version number (eg. jammy->22.04), skipping it",
                        codename
                    )
                }),
            );
            response.markers.push(MarkerUpdate::changed(key, marker));
        }

        Ok(response)
    }
}
