pub mod definition;
pub mod field_constraint;
pub mod input_descriptor;

pub use definition::{EmptyDefinition, PresentationDefinition};
pub use field_constraint::{AttributePath, FieldConstraint, ValueFilter};
pub use input_descriptor::InputDescriptor;
