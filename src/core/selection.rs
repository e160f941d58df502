use crate::core::attestation::{
    attestation_for, extract_form_fields, Attestation, AttestationFormat, AttestationType,
    FormField, SchemaNotFound,
};
use crate::core::presentation::field_constraint::{
    type_binding_constraint, FieldConstraint, VCT_PATH,
};
use crate::core::presentation::input_descriptor::{seed_descriptor, InputDescriptor};

/// The user-driven set of chosen field constraints for one attestation
/// type/format pair, together with the input descriptor draft it maintains.
///
/// A selection set is owned by a single UI session; it is not shared.
#[derive(Debug)]
pub struct SelectionSet {
    attestation: &'static Attestation,
    selected: Vec<FieldConstraint>,
    draft: InputDescriptor,
}

impl SelectionSet {
    /// Start an empty selection for a (type, format) pair.
    pub fn new(
        attestation_type: AttestationType,
        format: AttestationFormat,
    ) -> Result<Self, SchemaNotFound> {
        let attestation = attestation_for(attestation_type, format).ok_or(SchemaNotFound {
            attestation_type,
            format,
        })?;
        let draft = seed_descriptor(attestation_type, format, "")?;

        Ok(Self {
            attestation,
            selected: Vec::new(),
            draft,
        })
    }

    /// Resume a selection from a previously finalized descriptor, e.g. when
    /// the user re-opens an attestation to adjust its attributes.
    pub fn from_seed(
        attestation_type: AttestationType,
        format: AttestationFormat,
        seed: InputDescriptor,
    ) -> Result<Self, SchemaNotFound> {
        let attestation = attestation_for(attestation_type, format).ok_or(SchemaNotFound {
            attestation_type,
            format,
        })?;

        Ok(Self {
            attestation,
            selected: seed.constraints().fields().to_vec(),
            draft: seed,
        })
    }

    /// The selectable form fields of the bound attestation schema.
    pub fn form_fields(&self) -> Vec<FormField> {
        extract_form_fields(self.attestation.attestation_type, self.attestation.format)
    }

    /// Toggle a field constraint by its primary path.
    ///
    /// If no selected field shares the toggled field's primary path, the
    /// field is appended; otherwise every selected field sharing that primary
    /// path is removed. The descriptor draft is recomputed after every
    /// mutation.
    pub fn toggle(&mut self, field: FieldConstraint) {
        let primary = field.primary_path().to_string();
        if self.selected.iter().any(|f| f.primary_path() == primary) {
            self.selected.retain(|f| f.primary_path() != primary);
        } else {
            self.selected.push(field);
        }
        self.refresh_draft();
    }

    /// Whether a structurally equal field constraint is currently selected.
    pub fn is_selected(&self, field: &FieldConstraint) -> bool {
        self.selected.iter().any(|f| f == field)
    }

    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }

    /// The current input descriptor draft.
    pub fn draft(&self) -> &InputDescriptor {
        &self.draft
    }

    /// Finish the selection.
    ///
    /// Returns `None` when nothing is selected, signalling that this
    /// attestation type is not part of the request.
    pub fn finalize(self) -> Option<InputDescriptor> {
        if self.selected.is_empty() {
            return None;
        }
        Some(self.draft)
    }

    fn refresh_draft(&mut self) {
        let fields = self.with_type_binding(self.selected.clone());
        self.draft.constraints_mut().set_fields(fields);
    }

    /// For SD-JWT VC descriptors, any non-empty field list must carry the
    /// `vct` type-binding constraint. It is prepended when absent and removed
    /// along with the last remaining selection.
    fn with_type_binding(&self, fields: Vec<FieldConstraint>) -> Vec<FieldConstraint> {
        if self.attestation.format != AttestationFormat::SdJwtVc || fields.is_empty() {
            return fields;
        }

        if fields.iter().any(|f| f.selects(VCT_PATH)) {
            return fields;
        }

        let mut with_binding = Vec::with_capacity(fields.len() + 1);
        with_binding.push(type_binding_constraint(self.attestation));
        with_binding.extend(fields);
        with_binding
    }
}
