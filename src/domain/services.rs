//! Domain services containing business logic

use std::collections::HashMap;

use tracing::{debug, warn};

use super::entities::{AffectedFeature, CriteriaNode, Criterion, Operator};
use super::value_objects::{Namespace, Version};

/// What an extractor managed to read out of one criterion comment.
///
/// Each field is independent: a leaf whose comment only names a release
/// contributes the release and nothing else. A claimed version bound is a
/// version string; the unbounded "affected everywhere" claim is expressed as
/// the [`MAX_VERSION`](super::value_objects::MAX_VERSION) literal.
#[derive(Debug, Clone, Default)]
pub struct ExtractedClaims {
    pub feature_name: Option<String>,
    pub release: Option<String>,
    pub fixed_version: Option<String>,
}

/// Capability to pattern-match package, release and fixed-version data out of
/// the free-text comments carried by criteria leaves. Supplied by each feed
/// updater, since every distribution words its comments differently.
pub trait FeatureExtractor: Send + Sync {
    /// Returns `None` when the comment does not match the extraction pattern
    /// at all; a malformed comment contributes nothing, it is not an error.
    fn extract(&self, comment: &str) -> Option<ExtractedClaims>;
}

/// Resolves an advisory's boolean criteria tree into the affected-feature
/// facts the tree logically implies.
///
/// Pure computation over its inputs; safe to call concurrently from any
/// number of updaters.
pub struct CriteriaResolver {
    version_format: String,
}

impl CriteriaResolver {
    pub fn new(version_format: impl Into<String>) -> Self {
        Self {
            version_format: version_format.into(),
        }
    }

    /// Flattens a criteria tree into the list of criterion sets it implies:
    /// an OR contributes each alternative on its own, an AND contributes the
    /// cross-join of its parts. The fold is a literal cross-join, so the
    /// returned list may legitimately repeat sets.
    pub fn possibilities<'a>(
        node: &'a CriteriaNode,
        ignore_list: &[String],
    ) -> Vec<Vec<&'a Criterion>> {
        if node.children.is_empty() {
            return Self::leaf_possibilities(node, ignore_list);
        }

        let mut groups: Vec<Vec<Vec<&Criterion>>> = node
            .children
            .iter()
            .map(|child| Self::possibilities(child, ignore_list))
            .collect();
        if !node.criterions.is_empty() {
            groups.push(Self::leaf_possibilities(node, ignore_list));
        }

        match node.operator {
            Operator::Or => groups.into_iter().flatten().collect(),
            Operator::And => {
                let mut groups = groups.into_iter();
                let mut possibilities = groups.next().unwrap_or_default();

                for group in groups {
                    let mut combined = Vec::new();
                    for possibility in &possibilities {
                        for alternative in &group {
                            let mut entry = possibility.clone();
                            entry.extend(alternative.iter().copied());
                            combined.push(entry);
                        }
                    }
                    possibilities = combined;
                }

                possibilities
            }
        }
    }

    fn leaf_possibilities<'a>(
        node: &'a CriteriaNode,
        ignore_list: &[String],
    ) -> Vec<Vec<&'a Criterion>> {
        let criterions: Vec<&Criterion> = node
            .criterions
            .iter()
            .filter(|criterion| {
                !ignore_list
                    .iter()
                    .any(|ignored| criterion.comment.contains(ignored))
            })
            .collect();

        match node.operator {
            Operator::And => vec![criterions],
            Operator::Or => criterions
                .into_iter()
                .map(|criterion| vec![criterion])
                .collect(),
        }
    }

    /// Resolves a criteria tree into affected-feature facts.
    ///
    /// Within each possibility the last leaf whose comment matches the
    /// extractor wins, field by field. An extracted version bound that fails
    /// to parse is logged and degrades the possibility to the unbounded
    /// sentinel; a possibility without a complete name, release and bound is
    /// dropped. Upstream documents repeat packages across definitions, so
    /// facts are de-duplicated by namespace and feature name, later
    /// possibilities replacing earlier ones in place.
    pub fn resolve(
        &self,
        tree: &CriteriaNode,
        ignore_list: &[String],
        extractor: &dyn FeatureExtractor,
    ) -> Vec<AffectedFeature> {
        let mut features: Vec<AffectedFeature> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();

        for possibility in Self::possibilities(tree, ignore_list) {
            let mut feature_name = None;
            let mut release = None;
            let mut fixed_version = None;

            for criterion in &possibility {
                let Some(claims) = extractor.extract(&criterion.comment) else {
                    continue;
                };
                if claims.feature_name.is_some() {
                    feature_name = claims.feature_name;
                }
                if claims.release.is_some() {
                    release = claims.release;
                }
                if claims.fixed_version.is_some() {
                    fixed_version = claims.fixed_version;
                }
            }

            let (Some(name), Some(release), Some(raw_bound)) =
                (feature_name, release, fixed_version)
            else {
                debug!("criterions do not describe a complete feature, skipping possibility");
                continue;
            };
            if name.is_empty() || release.is_empty() {
                continue;
            }

            let affected_version = match Version::parse(&raw_bound) {
                Ok(version) => version,
                Err(error) => {
                    warn!(version = %raw_bound, %error, "could not parse fixed version, treating the feature as unbounded");
                    Version::Maximum
                }
            };

            let namespace = Namespace::new(release, self.version_format.clone());
            let feature = AffectedFeature::new(name, namespace, affected_version);
            let key = format!("{}:{}", feature.namespace.name, feature.name);
            match slots.get(&key) {
                Some(&slot) => features[slot] = feature,
                None => {
                    slots.insert(key, features.len());
                    features.push(feature);
                }
            }
        }

        features
    }
}
