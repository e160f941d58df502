//! Verifier-side workflow for [OID4VP]-style credential exchanges.
//!
//! [OID4VP]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//!
//! This library covers the request/response cycle of a verifier:
//!
//! 1. *Request construction*: derive the selectable attributes of an
//!    attestation from its schema ([`core::attestation`]), let a user toggle
//!    them into a [`SelectionSet`], and assemble the finalized input
//!    descriptors into a [`PresentationDefinition`].
//! 2. *Transaction lifecycle*: initiate a transaction with a verifier
//!    endpoint, render the wallet deep link, and poll for the wallet's
//!    response on a bounded schedule ([`verifier::transaction`]).
//! 3. *Response validation*: flatten the returned attestation set and diff
//!    the disclosed attributes against a request-type profile, reporting the
//!    missing ones ([`core::response`]).
//!
//! # Usage
//!
//! ```ignore
//! use oid4vp_verifier::core::attestation::{AttestationFormat, AttestationType};
//! use oid4vp_verifier::core::profile::RequestType;
//! use oid4vp_verifier::core::response::ValidationReport;
//! use oid4vp_verifier::core::selection::SelectionSet;
//! use oid4vp_verifier::core::presentation::PresentationDefinition;
//! use oid4vp_verifier::verifier::endpoint::{HttpVerifierEndpoint, InitiationProfile};
//! use oid4vp_verifier::verifier::transaction::{cancellation, TransactionLifecycle};
//!
//! // Let the user pick the attributes to request.
//! let mut selection = SelectionSet::new(AttestationType::Mdl, AttestationFormat::MsoMdoc)?;
//! for field in selection.form_fields() {
//!     selection.toggle(field.constraint);
//! }
//! let definition = PresentationDefinition::assemble([selection.finalize()])?;
//!
//! // Run the transaction.
//! let endpoint = HttpVerifierEndpoint::new("https://verifier.example.com/".parse()?);
//! let mut lifecycle = TransactionLifecycle::new(Arc::new(endpoint));
//! lifecycle.start(definition, InitiationProfile::Default).await?;
//! render_qr_code(lifecycle.connection_uri());
//!
//! let (handle, mut token) = cancellation();
//! lifecycle.poll_for_response(&mut token).await?;
//!
//! // Validate the response.
//! if let Some(concluded) = lifecycle.take_conclusion() {
//!     let attestations = parse_vp_token(&concluded.wallet_response);
//!     let report = ValidationReport::new(&attestations, RequestType::Mdl.requirements());
//!     lifecycle.report_conclusion(&concluded, &report).await;
//! }
//! ```
//!
//! Cryptographic verification of the presented credentials is out of scope:
//! this crate checks attribute completeness of an already-parsed wallet
//! response. The endpoint behavior can be customized by implementing the
//! [`VerifierEndpoint`] trait.
//!
//! [`SelectionSet`]: crate::core::selection::SelectionSet
//! [`PresentationDefinition`]: crate::core::presentation::PresentationDefinition
//! [`VerifierEndpoint`]: crate::verifier::endpoint::VerifierEndpoint

pub mod core;
pub mod utils;
pub mod verifier;
