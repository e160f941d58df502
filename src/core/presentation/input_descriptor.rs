use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::field_constraint::FieldConstraint;
use crate::core::attestation::{attestation_for, AttestationFormat, AttestationType, SchemaNotFound};

/// The claim formats accepted for one input descriptor, keyed by format
/// designation.
pub type ClaimFormatMap = BTreeMap<AttestationFormat, ClaimFormat>;

/// Algorithms the verifier accepts for a claim format.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimFormat {
    pub alg: Vec<String>,
}

impl ClaimFormat {
    pub fn es256() -> Self {
        Self {
            alg: vec!["ES256".to_string()],
        }
    }
}

/// The field constraints a wallet must satisfy to fulfill an input
/// descriptor.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldConstraint>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[FieldConstraint] {
        &self.fields
    }

    /// Replace the full field list.
    pub fn set_fields(&mut self, fields: Vec<FieldConstraint>) {
        self.fields = fields;
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A request fragment naming one attestation type/format pair and the
/// attribute constraints requested from it.
///
/// Wire shape: `{ id, format, constraints: { fields: [..] } }`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDescriptor {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    format: ClaimFormatMap,
    #[serde(default)]
    constraints: Constraints,
}

impl InputDescriptor {
    /// Create an input descriptor with the given id and accepted formats,
    /// and no constraints.
    pub fn new(id: String, format: ClaimFormatMap) -> Self {
        Self {
            id,
            name: None,
            purpose: None,
            format,
            constraints: Constraints::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set the purpose for which the descriptor's data is being requested.
    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    pub fn format(&self) -> &ClaimFormatMap {
        &self.format
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn constraints_mut(&mut self) -> &mut Constraints {
        &mut self.constraints
    }
}

/// Produce an empty input descriptor for a (type, format) pair.
///
/// The descriptor id is the attestation-type identifier; a non-empty purpose
/// is carried through. Fails when no attribute schema is registered for the
/// pair.
pub fn seed_descriptor(
    attestation_type: AttestationType,
    format: AttestationFormat,
    purpose: &str,
) -> Result<InputDescriptor, SchemaNotFound> {
    let attestation = attestation_for(attestation_type, format).ok_or(SchemaNotFound {
        attestation_type,
        format,
    })?;

    let mut formats = ClaimFormatMap::new();
    formats.insert(format, ClaimFormat::es256());

    let descriptor = InputDescriptor::new(attestation.attestation_type.id().to_string(), formats);
    if purpose.is_empty() {
        Ok(descriptor)
    } else {
        Ok(descriptor.set_purpose(purpose.to_string()))
    }
}
