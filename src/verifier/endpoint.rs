use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use crate::core::presentation::PresentationDefinition;
use crate::core::response::ValidationReport;

/// Identifier assigned to a transaction by the verifier endpoint.
pub type TransactionId = String;

/// How the transaction is initiated with the endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InitiationProfile {
    /// Plain `direct_post` wallet responses.
    #[default]
    Default,
    /// CBOR/mdoc profile: the wallet response comes back encrypted as
    /// `direct_post.jwt`.
    Cbor,
}

impl InitiationProfile {
    fn wallet_response_mode(&self) -> &'static str {
        match self {
            Self::Default => "direct_post",
            Self::Cbor => "direct_post.jwt",
        }
    }
}

/// Body of the transaction-initiation request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitTransactionRequest {
    #[serde(rename = "type")]
    pub presentation_type: String,
    pub presentation_definition: PresentationDefinition,
    pub nonce: String,
    pub wallet_response_mode: String,
}

impl InitTransactionRequest {
    pub fn new(definition: PresentationDefinition, profile: InitiationProfile) -> Self {
        Self {
            presentation_type: "vp_token".to_string(),
            presentation_definition: definition,
            nonce: Uuid::new_v4().to_string(),
            wallet_response_mode: profile.wallet_response_mode().to_string(),
        }
    }
}

/// The triple returned by a successful transaction initiation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitializedTransaction {
    pub transaction_id: TransactionId,
    pub client_id: String,
    pub request_uri: String,
}

/// A wallet's authorization response, as parsed by the endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vp_token: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one wallet-response poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResult {
    /// The wallet has not responded yet.
    Pending,
    Response(WalletResponse),
}

/// Registration-status update posted after a transaction concludes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdate {
    pub wallet_response: WalletResponse,
    /// The missing-attribute map, serialized as a JSON string.
    pub missing_attributes: String,
}

impl StatusUpdate {
    pub fn new(wallet_response: WalletResponse, report: &ValidationReport) -> Result<Self> {
        Ok(Self {
            wallet_response,
            missing_attributes: serde_json::to_string(&report.missing_attributes)
                .context("failed to serialize missing attributes")?,
        })
    }
}

/// The verifier endpoint consumed by the transaction lifecycle.
#[async_trait]
pub trait VerifierEndpoint: Debug {
    /// Initiate a new presentation transaction.
    async fn initiate_transaction(
        &self,
        request: InitTransactionRequest,
    ) -> Result<InitializedTransaction>;

    /// Query for the wallet's response to a transaction.
    async fn wallet_response(&self, transaction_id: &str) -> Result<PollResult>;

    /// Attach the validation outcome to the transaction's registration data.
    async fn update_registration_status(
        &self,
        transaction_id: &str,
        update: StatusUpdate,
    ) -> Result<()>;
}

/// A [VerifierEndpoint] speaking to a verifier backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpVerifierEndpoint {
    base: Url,
    http: reqwest::Client,
}

impl HttpVerifierEndpoint {
    /// Create an endpoint client for the given base URL. The base URL should
    /// end with a trailing slash for relative paths to resolve under it.
    pub fn new(base: Url) -> Self {
        Self {
            base,
            http: reqwest::Client::new(),
        }
    }

    fn presentations_url(&self) -> Result<Url> {
        self.base
            .join("ui/presentations")
            .context("invalid presentations url")
    }

    fn presentation_url(&self, transaction_id: &str) -> Result<Url> {
        self.base
            .join(&format!("ui/presentations/{transaction_id}"))
            .context("invalid presentation url")
    }

    fn registration_url(&self, transaction_id: &str) -> Result<Url> {
        self.base
            .join(&format!("ui/presentations/{transaction_id}/registration"))
            .context("invalid registration url")
    }
}

#[async_trait]
impl VerifierEndpoint for HttpVerifierEndpoint {
    async fn initiate_transaction(
        &self,
        request: InitTransactionRequest,
    ) -> Result<InitializedTransaction> {
        let response = self
            .http
            .post(self.presentations_url()?)
            .json(&request)
            .send()
            .await
            .context("transaction initiation request failed")?
            .error_for_status()
            .context("verifier endpoint rejected transaction initiation")?;

        response
            .json()
            .await
            .context("malformed transaction initiation response")
    }

    async fn wallet_response(&self, transaction_id: &str) -> Result<PollResult> {
        let response = self
            .http
            .get(self.presentation_url(transaction_id)?)
            .send()
            .await
            .context("wallet response query failed")?;

        match response.status() {
            status if status.is_success() => Ok(PollResult::Response(
                response
                    .json()
                    .await
                    .context("malformed wallet response")?,
            )),
            // The backend answers 400/404 while no wallet response has been
            // submitted for the transaction.
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => Ok(PollResult::Pending),
            status => bail!("unexpected status {status} while polling for wallet response"),
        }
    }

    async fn update_registration_status(
        &self,
        transaction_id: &str,
        update: StatusUpdate,
    ) -> Result<()> {
        self.http
            .post(self.registration_url(transaction_id)?)
            .json(&update)
            .send()
            .await
            .context("registration status update failed")?
            .error_for_status()
            .context("verifier endpoint rejected registration status update")?;

        Ok(())
    }
}

/// A local in-memory verifier endpoint. Not for production use!
///
/// # Warning
/// This endpoint exists so that flows can be exercised without a backend,
/// e.g. in tests. The wallet side of the exchange is simulated by calling
/// [MemoryEndpoint::deliver].
#[derive(Debug, Clone, Default)]
pub struct MemoryEndpoint {
    state: Arc<Mutex<MemoryEndpointState>>,
}

#[derive(Debug, Default)]
struct MemoryEndpointState {
    transactions: BTreeMap<TransactionId, InitTransactionRequest>,
    responses: BTreeMap<TransactionId, WalletResponse>,
    status_updates: BTreeMap<TransactionId, StatusUpdate>,
    poll_counts: BTreeMap<TransactionId, u32>,
}

impl MemoryEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a wallet submitting its response for a transaction.
    pub fn deliver(&self, transaction_id: &str, response: WalletResponse) -> Result<()> {
        self.state
            .try_lock()?
            .responses
            .insert(transaction_id.to_string(), response);
        Ok(())
    }

    /// The number of wallet-response polls observed for a transaction.
    pub fn poll_count(&self, transaction_id: &str) -> Result<u32> {
        Ok(self
            .state
            .try_lock()?
            .poll_counts
            .get(transaction_id)
            .copied()
            .unwrap_or(0))
    }

    /// The registration-status update recorded for a transaction, if any.
    pub fn status_update(&self, transaction_id: &str) -> Result<Option<StatusUpdate>> {
        Ok(self
            .state
            .try_lock()?
            .status_updates
            .get(transaction_id)
            .cloned())
    }
}

#[async_trait]
impl VerifierEndpoint for MemoryEndpoint {
    async fn initiate_transaction(
        &self,
        request: InitTransactionRequest,
    ) -> Result<InitializedTransaction> {
        let transaction_id = Uuid::new_v4().to_string();
        self.state
            .try_lock()?
            .transactions
            .insert(transaction_id.clone(), request);

        Ok(InitializedTransaction {
            request_uri: format!("https://verifier.example.com/wallet/request.jwt/{transaction_id}"),
            client_id: "verifier.example.com".to_string(),
            transaction_id,
        })
    }

    async fn wallet_response(&self, transaction_id: &str) -> Result<PollResult> {
        let mut state = self.state.try_lock()?;
        *state
            .poll_counts
            .entry(transaction_id.to_string())
            .or_insert(0) += 1;

        if !state.transactions.contains_key(transaction_id) {
            bail!("unknown transaction: {transaction_id}")
        }

        match state.responses.get(transaction_id) {
            Some(response) => Ok(PollResult::Response(response.clone())),
            None => Ok(PollResult::Pending),
        }
    }

    async fn update_registration_status(
        &self,
        transaction_id: &str,
        update: StatusUpdate,
    ) -> Result<()> {
        self.state
            .try_lock()?
            .status_updates
            .insert(transaction_id.to_string(), update);
        Ok(())
    }
}
