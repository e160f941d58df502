//! Core types of the presentation exchange: attestation schemas, field
//! constraints, input descriptors, presentation definitions, request-type
//! profiles, and response validation.

pub mod attestation;
pub mod presentation;
pub mod profile;
pub mod response;
pub mod selection;
