use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::presentation::field_constraint::{AttributePath, FieldConstraint};
use crate::utils::{to_human_readable_string, NonEmptyVec};

const FORMAT_MSO_MDOC: &str = "mso_mdoc";
const FORMAT_SD_JWT_VC: &str = "vc+sd-jwt";

/// The credential formats an attestation can be requested in.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttestationFormat {
    /// ISO/IEC 18013-5 mobile documents.
    #[serde(rename = "mso_mdoc")]
    MsoMdoc,
    /// IETF SD-JWT Verifiable Credentials.
    #[serde(rename = "vc+sd-jwt")]
    SdJwtVc,
}

impl AttestationFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MsoMdoc => FORMAT_MSO_MDOC,
            Self::SdJwtVc => FORMAT_SD_JWT_VC,
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttestationFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            FORMAT_MSO_MDOC => Ok(Self::MsoMdoc),
            FORMAT_SD_JWT_VC => Ok(Self::SdJwtVc),
            _ => anyhow::bail!("unrecognized attestation format: {s}"),
        }
    }
}

/// The attestation types this verifier knows how to request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttestationType {
    /// EUDI Person Identification Data.
    Pid,
    /// ISO mobile driving licence.
    Mdl,
    /// Age verification pseudonymous attestation. Only issued as an mdoc.
    AgeOver18,
}

impl AttestationType {
    /// The attestation-type identifier used as the input descriptor id and as
    /// the key of validation reports.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Pid => PID_TYPE_ID,
            Self::Mdl => MDL_TYPE_ID,
            Self::AgeOver18 => AGE_OVER_18_TYPE_ID,
        }
    }
}

impl fmt::Display for AttestationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

pub const PID_TYPE_ID: &str = "eu.europa.ec.eudi.pid.1";
pub const MDL_TYPE_ID: &str = "org.iso.18013.5.1.mDL";
pub const AGE_OVER_18_TYPE_ID: &str = "eu.europa.ec.av.1";

const PID_NAMESPACE: &str = "eu.europa.ec.eudi.pid.1";
const MDL_NAMESPACE: &str = "org.iso.18013.5.1";

const PID_VCT: &str = "urn:eu.europa.ec.eudi:pid:1";
const MDL_VCT: &str = "urn:org.iso.18013.5.1:mDL";

/// No attribute schema is registered for a requested (type, format) pair.
///
/// Recoverable: callers treat this as "no selectable fields", not as a fatal
/// condition.
#[derive(Debug, thiserror::Error)]
#[error("no attribute schema registered for `{attestation_type}` in format `{format}`")]
pub struct SchemaNotFound {
    pub attestation_type: AttestationType,
    pub format: AttestationFormat,
}

/// The static attribute schema of one attestation type in one format.
#[derive(Debug)]
pub struct Attestation {
    pub attestation_type: AttestationType,
    pub format: AttestationFormat,
    /// The type identifier asserted on the wire: the doctype for mdocs, the
    /// `vct` value for SD-JWT VCs.
    pub type_identifier: &'static str,
    /// The namespace qualifying mdoc data element identifiers.
    pub namespace: &'static str,
    /// Ordered attribute identifiers disclosed by this attestation.
    pub data_set: &'static [&'static str],
}

impl Attestation {
    /// Compute the schema path expression of an attribute for this
    /// attestation's format.
    pub fn attribute_path(&self, attribute: &str) -> AttributePath {
        match self.format {
            AttestationFormat::MsoMdoc => {
                NonEmptyVec::new(format!("$['{}']['{}']", self.namespace, attribute))
            }
            AttestationFormat::SdJwtVc => NonEmptyVec::new(format!("$.{attribute}")),
        }
    }
}

const PID_ATTRIBUTES: &[&str] = &[
    "family_name",
    "given_name",
    "birth_date",
    "family_name_birth",
    "given_name_birth",
    "age_over_18",
    "issuing_authority",
    "issuing_country",
    "expiry_date",
];

const AGE_OVER_18_ATTRIBUTES: &[&str] = &["age_over_18", "issuing_authority", "issuing_country", "expiry_date"];

const MDL_ATTRIBUTES: &[&str] = &[
    "family_name",
    "given_name",
    "birth_date",
    "issue_date",
    "expiry_date",
    "issuing_country",
    "document_number",
    "driving_privileges",
    "age_over_18",
];

static REGISTRY: [Attestation; 5] = [
    Attestation {
        attestation_type: AttestationType::AgeOver18,
        format: AttestationFormat::MsoMdoc,
        type_identifier: AGE_OVER_18_TYPE_ID,
        namespace: AGE_OVER_18_TYPE_ID,
        data_set: AGE_OVER_18_ATTRIBUTES,
    },
    Attestation {
        attestation_type: AttestationType::Pid,
        format: AttestationFormat::MsoMdoc,
        type_identifier: PID_TYPE_ID,
        namespace: PID_NAMESPACE,
        data_set: PID_ATTRIBUTES,
    },
    Attestation {
        attestation_type: AttestationType::Pid,
        format: AttestationFormat::SdJwtVc,
        type_identifier: PID_VCT,
        namespace: PID_NAMESPACE,
        data_set: PID_ATTRIBUTES,
    },
    Attestation {
        attestation_type: AttestationType::Mdl,
        format: AttestationFormat::MsoMdoc,
        type_identifier: MDL_TYPE_ID,
        namespace: MDL_NAMESPACE,
        data_set: MDL_ATTRIBUTES,
    },
    Attestation {
        attestation_type: AttestationType::Mdl,
        format: AttestationFormat::SdJwtVc,
        type_identifier: MDL_VCT,
        namespace: MDL_NAMESPACE,
        data_set: MDL_ATTRIBUTES,
    },
];

/// Resolve the attribute schema for a (type, format) pair.
///
/// Returns `None` when no schema is registered; never panics.
pub fn attestation_for(
    attestation_type: AttestationType,
    format: AttestationFormat,
) -> Option<&'static Attestation> {
    REGISTRY
        .iter()
        .find(|a| a.attestation_type == attestation_type && a.format == format)
}

/// One selectable attribute of an attestation, ready to be toggled into a
/// selection set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormField {
    /// Index of the attribute in the schema's data set; unique per schema.
    pub id: usize,
    /// Humanized attribute label.
    pub label: String,
    /// Default field constraint selecting the attribute.
    pub constraint: FieldConstraint,
}

/// Derive the selectable form fields for a (type, format) pair, one per
/// schema attribute.
///
/// An unregistered pair yields an empty list.
pub fn extract_form_fields(
    attestation_type: AttestationType,
    format: AttestationFormat,
) -> Vec<FormField> {
    let Some(attestation) = attestation_for(attestation_type, format) else {
        tracing::debug!(%attestation_type, %format, "no attribute schema registered");
        return Vec::new();
    };

    attestation
        .data_set
        .iter()
        .enumerate()
        .map(|(id, attribute)| FormField {
            id,
            label: to_human_readable_string(*attribute),
            constraint: FieldConstraint::for_path(attestation.attribute_path(attribute)),
        })
        .collect()
}
