use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::attestation::{MDL_TYPE_ID, PID_TYPE_ID};

/// The attribute requirements of one request-type profile: ordered
/// `(attestation type id, required fully-qualified attribute ids)` pairs.
///
/// Fixed domain data, not user-editable state.
pub type Requirements = &'static [(&'static str, &'static [&'static str])];

const PID_REQUIRED: &[&str] = &[
    "eu.europa.ec.eudi.pid.1:family_name_birth",
    "eu.europa.ec.eudi.pid.1:given_name_birth",
    "eu.europa.ec.eudi.pid.1:expiry_date",
];

const MDL_REQUIRED: &[&str] = &[
    "org.iso.18013.5.1:family_name",
    "org.iso.18013.5.1:given_name",
    "org.iso.18013.5.1:birth_date",
    "org.iso.18013.5.1:expiry_date",
];

const PARTIAL_MDL_REQUIRED: &[&str] = &[
    "org.iso.18013.5.1:family_name",
    "org.iso.18013.5.1:given_name",
    "org.iso.18013.5.1:expiry_date",
];

const PARTIAL_MDL_UNDERAGE_REQUIRED: &[&str] = &[
    "org.iso.18013.5.1:family_name",
    "org.iso.18013.5.1:given_name",
    "org.iso.18013.5.1:expiry_date",
    "org.iso.18013.5.1:age_over_18",
];

/// A named verifier policy defining which attributes are mandatory in the
/// expected wallet response.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RequestType {
    #[serde(rename = "PID")]
    Pid,
    #[serde(rename = "PIDMDL")]
    PidMdl,
    #[serde(rename = "MDL")]
    Mdl,
    #[serde(rename = "PartialMDL")]
    PartialMdl,
    #[serde(rename = "PartialMDLUnderage")]
    PartialMdlUnderage,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pid => "PID",
            Self::PidMdl => "PIDMDL",
            Self::Mdl => "MDL",
            Self::PartialMdl => "PartialMDL",
            Self::PartialMdlUnderage => "PartialMDLUnderage",
        }
    }

    /// The required attribute set of this profile.
    pub fn requirements(&self) -> Requirements {
        match self {
            Self::Pid => &[(PID_TYPE_ID, PID_REQUIRED)],
            Self::PidMdl => &[(PID_TYPE_ID, PID_REQUIRED), (MDL_TYPE_ID, MDL_REQUIRED)],
            Self::Mdl => &[(MDL_TYPE_ID, MDL_REQUIRED)],
            Self::PartialMdl => &[(MDL_TYPE_ID, PARTIAL_MDL_REQUIRED)],
            Self::PartialMdlUnderage => &[(MDL_TYPE_ID, PARTIAL_MDL_UNDERAGE_REQUIRED)],
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PID" => Ok(Self::Pid),
            "PIDMDL" => Ok(Self::PidMdl),
            "MDL" => Ok(Self::Mdl),
            "PartialMDL" => Ok(Self::PartialMdl),
            "PartialMDLUnderage" => Ok(Self::PartialMdlUnderage),
            _ => anyhow::bail!("unrecognized request type: {s}"),
        }
    }
}

/// Look up the requirements for a request-type tag.
///
/// An unrecognized tag yields an empty requirement set, so nothing is ever
/// reported missing for it.
pub fn requirements_for(tag: &str) -> Requirements {
    tag.parse::<RequestType>()
        .map(|request_type| request_type.requirements())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_type_tags_round_trip() {
        for request_type in [
            RequestType::Pid,
            RequestType::PidMdl,
            RequestType::Mdl,
            RequestType::PartialMdl,
            RequestType::PartialMdlUnderage,
        ] {
            assert_eq!(
                request_type.as_str().parse::<RequestType>().unwrap(),
                request_type
            );
        }
    }

    #[test]
    fn unrecognized_tag_has_no_requirements() {
        assert!(requirements_for("SIOP").is_empty());
        assert!(requirements_for("").is_empty());
    }

    #[test]
    fn combined_profile_requires_both_types() {
        let requirements = RequestType::PidMdl.requirements();
        assert_eq!(requirements.len(), 2);
        assert_eq!(requirements[0].0, PID_TYPE_ID);
        assert_eq!(requirements[1].0, MDL_TYPE_ID);
    }
}
