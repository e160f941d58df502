//! The verifier-side transaction workflow: the endpoint interface, the
//! per-session state, and the transaction lifecycle state machine.

pub mod endpoint;
pub mod session;
pub mod transaction;

pub use endpoint::{HttpVerifierEndpoint, MemoryEndpoint, VerifierEndpoint};
pub use session::SessionState;
pub use transaction::{cancellation, CancelHandle, CancelToken, Transaction, TransactionLifecycle};
