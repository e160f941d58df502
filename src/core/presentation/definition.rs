use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::input_descriptor::InputDescriptor;

/// A presentation definition with no input descriptors was assembled.
///
/// A presentation requesting zero attestation types is invalid and must not
/// be transmitted.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("presentation definition contains no input descriptors")]
pub struct EmptyDefinition;

/// The full set of input descriptors sent to the wallet, one per requested
/// attestation type.
///
/// Descriptor order is insertion order and is preserved for a stable
/// serialized request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    id: String,
    input_descriptors: Vec<InputDescriptor>,
}

impl PresentationDefinition {
    /// Combine finalized input descriptors into a presentation definition.
    ///
    /// Absent descriptors (attestation types the user did not request) are
    /// filtered out; the caller-given order of the rest is preserved. Fails
    /// when nothing remains.
    pub fn assemble(
        descriptors: impl IntoIterator<Item = Option<InputDescriptor>>,
    ) -> Result<Self, EmptyDefinition> {
        let input_descriptors: Vec<InputDescriptor> =
            descriptors.into_iter().flatten().collect();

        if input_descriptors.is_empty() {
            return Err(EmptyDefinition);
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            input_descriptors,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input_descriptors(&self) -> &[InputDescriptor] {
        &self.input_descriptors
    }
}
