//! Domain entities representing core business concepts

use serde::{Deserialize, Serialize};

use super::value_objects::{Namespace, Severity, Version};

/// A normalized fact stating that a package is vulnerable within a version
/// range inside one release namespace.
///
/// `affected_version` is the inclusive upper bound of the vulnerable range:
/// `Version::Maximum` means "affected in everything currently released", while
/// a concrete version means "affected below it and fixed at it".
/// `fixed_in_version` is present exactly when the bound is not the unbounded
/// sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedFeature {
    pub name: String,
    pub namespace: Namespace,
    pub affected_version: Version,
    pub fixed_in_version: Option<Version>,
}

impl AffectedFeature {
    pub fn new(name: impl Into<String>, namespace: Namespace, affected_version: Version) -> Self {
        let fixed_in_version = match &affected_version {
            Version::Maximum => None,
            bound => Some(bound.clone()),
        };

        Self {
            name: name.into(),
            namespace,
            affected_version,
            fixed_in_version,
        }
    }
}

/// A single upstream advisory, normalized: its identity and metadata plus the
/// affected-feature facts it implies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advisory {
    pub name: String,
    pub link: String,
    pub severity: Severity,
    pub description: String,
    pub affected: Vec<AffectedFeature>,
}

impl Advisory {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
            severity: Severity::Unknown,
            description: String::new(),
            affected: Vec::new(),
        }
    }
}

/// The boolean operator of a criteria node. Anything that is not literally
/// `"OR"` in the source document, including an absent operator, resolves as a
/// conjunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    And,
    Or,
}

impl Operator {
    pub fn from_label(label: &str) -> Self {
        if label == "OR" {
            Operator::Or
        } else {
            Operator::And
        }
    }
}

/// A leaf predicate of an advisory's criteria tree. The free-text comment is
/// the only carrier of package, release and fixed-version data; it has to be
/// pattern-matched by an extractor supplied by the feed updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub test_ref: String,
    pub comment: String,
}

impl Criterion {
    pub fn new(test_ref: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            test_ref: test_ref.into(),
            comment: comment.into(),
        }
    }
}

/// A node of an advisory's boolean predicate tree. Trees are built once per
/// decoded advisory document, resolved into [`AffectedFeature`] facts and
/// discarded; upstream guarantees them acyclic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriteriaNode {
    pub operator: Operator,
    pub children: Vec<CriteriaNode>,
    pub criterions: Vec<Criterion>,
}

impl CriteriaNode {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            children: Vec::new(),
            criterions: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<CriteriaNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_criterions(mut self, criterions: Vec<Criterion>) -> Self {
        self.criterions = criterions;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affected_feature_fixed_in_follows_bound() {
        let namespace = Namespace::new("debian:12", "dpkg");

        let fixed = AffectedFeature::new(
            "openssl",
            namespace.clone(),
            Version::parse("3.0.11-1~deb12u2").unwrap(),
        );
        assert_eq!(
            fixed.fixed_in_version,
            Some(Version::parse("3.0.11-1~deb12u2").unwrap())
        );

        let unbounded = AffectedFeature::new("openssl", namespace, Version::Maximum);
        assert_eq!(unbounded.fixed_in_version, None);
    }

    #[test]
    fn test_operator_from_label() {
        assert_eq!(Operator::from_label("OR"), Operator::Or);
        assert_eq!(Operator::from_label("AND"), Operator::And);
        assert_eq!(Operator::from_label("XOR"), Operator::And);
        assert_eq!(Operator::from_label(""), Operator::And);
        assert_eq!(Operator::default(), Operator::And);
    }
}
