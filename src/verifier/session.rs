use super::endpoint::{InitializedTransaction, TransactionId};

/// Wallet deep-link scheme used when none has been configured.
pub const DEFAULT_SCHEME: &str = "eudi-openid4vp://";

/// Per-session verifier state with an explicit lifecycle: initialized when a
/// transaction starts, cleared at conclusion and at cancellation.
///
/// The configured wallet scheme outlives individual transactions.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    scheme: Option<String>,
    active_transaction: Option<TransactionId>,
    registration_data: Option<serde_json::Value>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the wallet deep-link scheme.
    pub fn set_scheme(&mut self, scheme: impl Into<String>) {
        self.scheme = Some(scheme.into());
    }

    /// The wallet deep-link scheme, falling back to [DEFAULT_SCHEME].
    pub fn scheme(&self) -> &str {
        self.scheme.as_deref().unwrap_or(DEFAULT_SCHEME)
    }

    /// Mark a transaction as the active one.
    pub fn begin(&mut self, transaction_id: &str) {
        self.active_transaction = Some(transaction_id.to_string());
    }

    pub fn active_transaction(&self) -> Option<&str> {
        self.active_transaction.as_deref()
    }

    pub fn set_registration_data(&mut self, data: serde_json::Value) {
        self.registration_data = Some(data);
    }

    pub fn registration_data(&self) -> Option<&serde_json::Value> {
        self.registration_data.as_ref()
    }

    /// Clear all transaction-scoped state. The scheme persists.
    pub fn clear(&mut self) {
        self.active_transaction = None;
        self.registration_data = None;
    }
}

/// Build the wallet deep link for an initialized transaction:
/// `<scheme>?client_id=<clientId>&request_uri=<url-encoded requestUri>`.
pub fn connection_uri(scheme: &str, transaction: &InitializedTransaction) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("client_id", &transaction.client_id);
    query.append_pair("request_uri", &transaction.request_uri);
    format!("{scheme}?{}", query.finish())
}
