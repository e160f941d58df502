use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::profile::Requirements;

/// One disclosed attribute of a shared attestation, keyed by its
/// fully-qualified identifier (e.g. `org.iso.18013.5.1:family_name`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: serde_json::Value,
}

/// A single attestation shared by the wallet: its attestation-type id and the
/// attributes it disclosed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Single {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl Single {
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// The keys of the disclosed attributes, in disclosure order.
    pub fn attribute_keys(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.key.as_str()).collect()
    }
}

/// An attestation as returned in a wallet response: either a single
/// attestation, or an envelope wrapping the attestations of a combined
/// disclosure.
///
/// Envelopes hold `Single`s directly: flattening unwraps exactly one level,
/// and the type makes deeper nesting unrepresentable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SharedAttestation {
    Single(Single),
    Enveloped { attestations: Vec<Single> },
}

/// Flatten a wallet's attestation set.
///
/// Output follows input order; enveloped children keep their original
/// relative order.
pub fn flatten(shared: &[SharedAttestation]) -> Vec<Single> {
    let mut singles = Vec::new();
    for attestation in shared {
        match attestation {
            SharedAttestation::Single(single) => singles.push(single.clone()),
            SharedAttestation::Enveloped { attestations } => {
                singles.extend(attestations.iter().cloned())
            }
        }
    }
    singles
}

/// Diff a flattened response against a request-type profile.
///
/// For every attestation type the profile requires, the required-but-absent
/// attribute keys are collected in required-list order; types with nothing
/// missing contribute no entry. A type wholly absent from the response is
/// treated as having disclosed nothing, so all its required keys are
/// reported. When the response carries several attestations of the same
/// type, the last one wins.
pub fn missing_attributes(
    attestations: &[Single],
    requirements: Requirements,
) -> BTreeMap<String, Vec<String>> {
    let mut present: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for attestation in attestations {
        present.insert(attestation.name.as_str(), attestation.attribute_keys());
    }

    let mut missing = BTreeMap::new();
    for (type_id, required) in requirements {
        let disclosed = present.get(type_id).map(Vec::as_slice).unwrap_or(&[]);
        let absent: Vec<String> = required
            .iter()
            .filter(|key| !disclosed.contains(*key))
            .map(|key| key.to_string())
            .collect();
        if !absent.is_empty() {
            missing.insert(type_id.to_string(), absent);
        }
    }
    missing
}

/// The attribute-completeness report of one concluded transaction.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub missing_attributes: BTreeMap<String, Vec<String>>,
}

impl ValidationReport {
    /// Flatten a wallet's attestation set and diff it against the
    /// requirements of a request-type profile.
    pub fn new(shared: &[SharedAttestation], requirements: Requirements) -> Self {
        let flattened = flatten(shared);
        Self {
            missing_attributes: missing_attributes(&flattened, requirements),
        }
    }

    /// Whether every required attribute was disclosed.
    pub fn is_complete(&self) -> bool {
        self.missing_attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::profile::{requirements_for, RequestType};
    use serde_json::json;

    fn attribute(key: &str) -> Attribute {
        Attribute {
            key: key.to_string(),
            value: json!("value"),
        }
    }

    fn mdl(keys: &[&str]) -> Single {
        Single::new(
            "org.iso.18013.5.1.mDL",
            keys.iter().map(|k| attribute(k)).collect(),
        )
    }

    #[test]
    fn flatten_unwraps_one_envelope_level() {
        let shared = vec![
            SharedAttestation::Single(Single::new("A", vec![])),
            SharedAttestation::Enveloped {
                attestations: vec![Single::new("B", vec![]), Single::new("C", vec![])],
            },
        ];

        let names: Vec<String> = flatten(&shared).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn deserializes_tagged_attestations() {
        let shared: Vec<SharedAttestation> = serde_json::from_value(json!([
            { "kind": "single", "name": "A", "attributes": [] },
            { "kind": "enveloped", "attestations": [
                { "name": "B", "attributes": [] }
            ]}
        ]))
        .unwrap();
        assert_eq!(flatten(&shared).len(), 2);
    }

    #[test]
    fn complete_response_has_no_missing_attributes() {
        let attestations = vec![mdl(&[
            "org.iso.18013.5.1:family_name",
            "org.iso.18013.5.1:given_name",
            "org.iso.18013.5.1:birth_date",
            "org.iso.18013.5.1:expiry_date",
        ])];

        let missing = missing_attributes(&attestations, RequestType::Mdl.requirements());
        assert!(missing.is_empty());
    }

    #[test]
    fn partial_mdl_response_reports_absent_keys_in_order() {
        let attestations = vec![mdl(&[
            "org.iso.18013.5.1:family_name",
            "org.iso.18013.5.1:given_name",
        ])];

        let missing = missing_attributes(&attestations, RequestType::Mdl.requirements());
        assert_eq!(
            missing.get("org.iso.18013.5.1.mDL").map(Vec::as_slice),
            Some(
                &[
                    "org.iso.18013.5.1:birth_date".to_string(),
                    "org.iso.18013.5.1:expiry_date".to_string(),
                ][..]
            )
        );
    }

    #[test]
    fn wholly_absent_type_reports_every_required_key() {
        let attestations = vec![Single::new("eu.europa.ec.eudi.pid.1", vec![])];

        let missing = missing_attributes(
            &attestations,
            RequestType::PartialMdlUnderage.requirements(),
        );
        assert_eq!(
            missing.get("org.iso.18013.5.1.mDL").map(Vec::len),
            Some(4)
        );
    }

    #[test]
    fn duplicate_type_ids_overwrite() {
        let attestations = vec![
            mdl(&[
                "org.iso.18013.5.1:family_name",
                "org.iso.18013.5.1:given_name",
                "org.iso.18013.5.1:birth_date",
                "org.iso.18013.5.1:expiry_date",
            ]),
            mdl(&["org.iso.18013.5.1:family_name"]),
        ];

        let missing = missing_attributes(&attestations, RequestType::Mdl.requirements());
        assert_eq!(missing.get("org.iso.18013.5.1.mDL").map(Vec::len), Some(3));
    }

    #[test]
    fn unrecognized_request_type_reports_nothing() {
        let attestations = vec![mdl(&[])];
        let missing = missing_attributes(&attestations, requirements_for("unknown"));
        assert!(missing.is_empty());
    }

    #[test]
    fn report_over_enveloped_response() {
        let shared = vec![SharedAttestation::Enveloped {
            attestations: vec![mdl(&[
                "org.iso.18013.5.1:family_name",
                "org.iso.18013.5.1:given_name",
                "org.iso.18013.5.1:expiry_date",
            ])],
        }];

        let report = ValidationReport::new(&shared, RequestType::PartialMdl.requirements());
        assert!(report.is_complete());
    }
}
