use serde::{Deserialize, Serialize};

use crate::core::attestation::Attestation;
use crate::utils::NonEmptyVec;

/// A JSONPath expression locating a value within a credential.
pub type JsonPath = String;

/// The ordered alternative paths identifying one logical attribute across
/// encodings. The first element is the primary path; within an input
/// descriptor a constraint is identified by its primary path alone, not by
/// the full alternative list.
pub type AttributePath = NonEmptyVec<JsonPath>;

/// Path of the credential-type declaration claim in SD-JWT VC payloads.
pub const VCT_PATH: &str = "$.vct";

/// An optional predicate attached to a field constraint, asserting the shape
/// or content of the selected value.
///
/// Two filters are equal iff they have the same type tag and a structurally
/// identical comparison payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValueFilter {
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    contains: Option<serde_json::Value>,
}

impl ValueFilter {
    /// A filter asserting that a string-typed claim contains the given
    /// constant value.
    pub fn string_contains(value: &str) -> Self {
        Self {
            kind: "string".to_string(),
            contains: Some(serde_json::json!({ "const": value })),
        }
    }

    /// Return the type tag of the filter.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Return the comparison payload of the filter, if any.
    pub fn contains(&self) -> Option<&serde_json::Value> {
        self.contains.as_ref()
    }
}

/// One requested attribute within an input descriptor: a non-empty list of
/// alternative JSONPaths, an optional value filter, and the verifier's intent
/// to retain the disclosed value.
///
/// Equality is structural: equal paths (length and element-wise), equal
/// filters, and an equal retention flag.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldConstraint {
    path: AttributePath,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<ValueFilter>,
    #[serde(default)]
    intent_to_retain: bool,
}

impl FieldConstraint {
    /// Build the default constraint for an attribute path: no filter, and no
    /// intent to retain.
    pub fn for_path(path: AttributePath) -> Self {
        Self {
            path,
            filter: None,
            intent_to_retain: false,
        }
    }

    /// Attach a value filter to the constraint.
    pub fn with_filter(mut self, filter: ValueFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the verifier's intent to retain the disclosed value.
    pub fn set_retained(mut self, intent_to_retain: bool) -> Self {
        self.intent_to_retain = intent_to_retain;
        self
    }

    /// Return the alternative paths of the constraint.
    pub fn path(&self) -> &AttributePath {
        &self.path
    }

    /// Return the primary path, which identifies the constraint within an
    /// input descriptor.
    pub fn primary_path(&self) -> &str {
        self.path.first()
    }

    /// Return the value filter of the constraint, if any.
    pub fn filter(&self) -> Option<&ValueFilter> {
        self.filter.as_ref()
    }

    pub fn intent_to_retain(&self) -> bool {
        self.intent_to_retain
    }

    /// Whether any of the constraint's alternative paths equals the given
    /// path expression.
    pub fn selects(&self, path: &str) -> bool {
        self.path.iter().any(|p| p == path)
    }
}

/// The mandatory credential-type constraint for SD-JWT VC attestations.
///
/// Asserts that the `vct` claim contains the attestation's declared type
/// identifier. Only meaningful for SD-JWT style formats; other formats carry
/// their type binding elsewhere (e.g. the mdoc doctype).
pub fn type_binding_constraint(attestation: &Attestation) -> FieldConstraint {
    FieldConstraint::for_path(NonEmptyVec::new(VCT_PATH.to_string()))
        .with_filter(ValueFilter::string_contains(attestation.type_identifier))
}
