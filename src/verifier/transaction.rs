use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::presentation::PresentationDefinition;
use crate::core::response::ValidationReport;

use super::endpoint::{
    InitTransactionRequest, InitializedTransaction, InitiationProfile, PollResult, StatusUpdate,
    TransactionId, VerifierEndpoint, WalletResponse,
};
use super::session::{connection_uri, SessionState};

/// Fixed delay between wallet-response polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Maximum number of wallet-response polls before the transaction times out.
pub const MAX_POLL_ATTEMPTS: u32 = 60;

/// The state of one presentation transaction.
///
/// `Concluded` and `TimedOut` are terminal; a new transaction requires a
/// fresh [TransactionLifecycle::start].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    /// The endpoint accepted the transaction; the request is ready to be
    /// handed to the wallet.
    Initialized {
        transaction: InitializedTransaction,
        presentation_definition: PresentationDefinition,
    },
    /// The poll loop is running.
    AwaitingResponse {
        transaction: InitializedTransaction,
        presentation_definition: PresentationDefinition,
        attempt: u32,
    },
    /// A wallet response arrived.
    Concluded(ConcludedTransaction),
    /// All poll attempts were exhausted without a wallet response.
    TimedOut { transaction_id: TransactionId },
}

/// A finished transaction: the original request and the wallet's response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcludedTransaction {
    pub transaction_id: TransactionId,
    pub presentation_definition: PresentationDefinition,
    pub wallet_response: WalletResponse,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The transaction-initiation call failed. The lifecycle stays
    /// unstarted; there is no automatic retry.
    #[error("transaction initiation failed")]
    InitiationFailed(#[source] anyhow::Error),
    /// An operation was invoked in a state that does not admit it.
    #[error("no active transaction in the `{expected}` state")]
    InvalidState { expected: &'static str },
}

/// How a poll loop ended. Timeouts and cancellations are values, not errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// A wallet response arrived; consume it with
    /// [TransactionLifecycle::take_conclusion].
    Concluded,
    TimedOut,
    Cancelled,
}

/// Cancellation handle for an in-flight poll loop.
///
/// Cancelling is explicit and idempotent; dropping the handle without
/// cancelling lets the loop run to its natural conclusion.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a linked cancellation handle and token.
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// The receiving half of a [CancelHandle].
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Resolve once cancellation is signalled. Never resolves if the handle
    /// is dropped without cancelling.
    async fn cancelled(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

/// The verifier-side transaction state machine.
///
/// Owns the request/response cycle of one transaction at a time: initiation,
/// deep-link rendering, bounded polling, and conclusion. An instance is owned
/// by a single session; starting a new transaction fully resets the previous
/// one.
#[derive(Debug)]
pub struct TransactionLifecycle {
    endpoint: Arc<dyn VerifierEndpoint + Send + Sync>,
    session: SessionState,
    poll_interval: Duration,
    max_attempts: u32,
    state: Option<Transaction>,
}

impl TransactionLifecycle {
    pub fn new(endpoint: Arc<dyn VerifierEndpoint + Send + Sync>) -> Self {
        Self {
            endpoint,
            session: SessionState::new(),
            poll_interval: POLL_INTERVAL,
            max_attempts: MAX_POLL_ATTEMPTS,
            state: None,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// The current transaction state, if a transaction is active.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.state.as_ref()
    }

    /// Initiate a new transaction from an assembled presentation definition.
    ///
    /// Any prior transaction state is discarded first. On transport failure
    /// the lifecycle stays unstarted.
    pub async fn start(
        &mut self,
        definition: PresentationDefinition,
        profile: InitiationProfile,
    ) -> Result<InitializedTransaction, LifecycleError> {
        self.state = None;
        self.session.clear();

        let request = InitTransactionRequest::new(definition.clone(), profile);
        let transaction = self
            .endpoint
            .initiate_transaction(request)
            .await
            .map_err(LifecycleError::InitiationFailed)?;

        info!(transaction_id = %transaction.transaction_id, "transaction initialized");
        self.session.begin(&transaction.transaction_id);
        self.state = Some(Transaction::Initialized {
            transaction: transaction.clone(),
            presentation_definition: definition,
        });

        Ok(transaction)
    }

    /// The wallet deep link of the active transaction, if one is in
    /// progress.
    pub fn connection_uri(&self) -> Option<String> {
        match &self.state {
            Some(Transaction::Initialized { transaction, .. })
            | Some(Transaction::AwaitingResponse { transaction, .. }) => {
                Some(connection_uri(self.session.scheme(), transaction))
            }
            _ => None,
        }
    }

    /// Poll the endpoint until the wallet responds, the attempt budget is
    /// exhausted, or the loop is cancelled.
    ///
    /// Used for cross-device flows; same-device flows conclude through
    /// [TransactionLifecycle::conclude_with] instead. The first non-pending
    /// response concludes the transaction and stops the loop; transport
    /// errors during a poll are logged and treated as pending. A response
    /// in flight when cancellation arrives is discarded.
    pub async fn poll_for_response(
        &mut self,
        cancel: &mut CancelToken,
    ) -> Result<PollOutcome, LifecycleError> {
        let (transaction, definition) = match self.state.take() {
            Some(Transaction::Initialized {
                transaction,
                presentation_definition,
            }) => (transaction, presentation_definition),
            other => {
                self.state = other;
                return Err(LifecycleError::InvalidState {
                    expected: "initialized",
                });
            }
        };
        let transaction_id = transaction.transaction_id.clone();

        for attempt in 0..self.max_attempts {
            self.state = Some(Transaction::AwaitingResponse {
                transaction: transaction.clone(),
                presentation_definition: definition.clone(),
                attempt,
            });

            let cancelled = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.poll_interval) => false,
            };
            if cancelled {
                return Ok(self.cancelled(&transaction_id));
            }

            // None when cancellation won the race; the in-flight query is
            // dropped with it.
            let queried = tokio::select! {
                _ = cancel.cancelled() => None,
                result = self.endpoint.wallet_response(&transaction_id) => Some(result),
            };
            match queried {
                None => return Ok(self.cancelled(&transaction_id)),
                Some(Ok(PollResult::Pending)) => {
                    debug!(%transaction_id, attempt, "wallet response pending");
                }
                Some(Ok(PollResult::Response(wallet_response))) => {
                    info!(%transaction_id, attempt, "wallet response received");
                    self.session.clear();
                    self.state = Some(Transaction::Concluded(ConcludedTransaction {
                        transaction_id,
                        presentation_definition: definition,
                        wallet_response,
                    }));
                    return Ok(PollOutcome::Concluded);
                }
                Some(Err(error)) => {
                    warn!(%transaction_id, attempt, %error, "wallet response query failed");
                }
            }
        }

        info!(%transaction_id, "poll attempts exhausted without a wallet response");
        self.session.clear();
        self.state = Some(Transaction::TimedOut { transaction_id });
        Ok(PollOutcome::TimedOut)
    }

    fn cancelled(&mut self, transaction_id: &str) -> PollOutcome {
        debug!(transaction_id, "polling cancelled");
        self.session.clear();
        self.state = None;
        PollOutcome::Cancelled
    }

    /// Conclude an initialized transaction with an externally received
    /// wallet response (the same-device flow, which does not poll).
    ///
    /// A response arriving for a cancelled or already-concluded transaction
    /// is not applied.
    pub fn conclude_with(
        &mut self,
        wallet_response: WalletResponse,
    ) -> Result<(), LifecycleError> {
        match self.state.take() {
            Some(Transaction::Initialized {
                transaction,
                presentation_definition,
            }) => {
                info!(transaction_id = %transaction.transaction_id, "transaction concluded by external signal");
                self.session.clear();
                self.state = Some(Transaction::Concluded(ConcludedTransaction {
                    transaction_id: transaction.transaction_id,
                    presentation_definition,
                    wallet_response,
                }));
                Ok(())
            }
            other => {
                debug!("discarding wallet response without an initialized transaction");
                self.state = other;
                Err(LifecycleError::InvalidState {
                    expected: "initialized",
                })
            }
        }
    }

    /// Hand the conclusion to the caller, resetting the lifecycle.
    ///
    /// Returns `None` unless the active transaction is concluded.
    pub fn take_conclusion(&mut self) -> Option<ConcludedTransaction> {
        match self.state.take() {
            Some(Transaction::Concluded(concluded)) => Some(concluded),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Post the validation outcome of a concluded transaction to the
    /// endpoint's registration data. Fire-and-forget: endpoint failures are
    /// logged, not propagated.
    pub async fn report_conclusion(
        &self,
        concluded: &ConcludedTransaction,
        report: &ValidationReport,
    ) {
        let update = match StatusUpdate::new(concluded.wallet_response.clone(), report) {
            Ok(update) => update,
            Err(error) => {
                warn!(%error, "could not build registration status update");
                return;
            }
        };

        if let Err(error) = self
            .endpoint
            .update_registration_status(&concluded.transaction_id, update)
            .await
        {
            warn!(
                transaction_id = %concluded.transaction_id,
                %error,
                "registration status update failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;

    use crate::core::attestation::{AttestationFormat, AttestationType};
    use crate::core::presentation::input_descriptor::seed_descriptor;
    use crate::verifier::endpoint::MemoryEndpoint;

    fn definition() -> PresentationDefinition {
        PresentationDefinition::assemble([Some(
            seed_descriptor(AttestationType::Mdl, AttestationFormat::MsoMdoc, "").unwrap(),
        )])
        .unwrap()
    }

    fn response() -> WalletResponse {
        WalletResponse {
            vp_token: Some(serde_json::json!("token")),
            ..Default::default()
        }
    }

    /// An endpoint whose wallet-response call takes a fixed amount of time
    /// before resolving, to exercise cancellation of in-flight queries.
    #[derive(Debug)]
    struct SlowEndpoint {
        delay: Duration,
        calls: AtomicU32,
    }

    #[async_trait]
    impl VerifierEndpoint for SlowEndpoint {
        async fn initiate_transaction(
            &self,
            _request: InitTransactionRequest,
        ) -> Result<InitializedTransaction> {
            Ok(InitializedTransaction {
                transaction_id: "slow-tx".to_string(),
                client_id: "verifier.example.com".to_string(),
                request_uri: "https://verifier.example.com/request/slow-tx".to_string(),
            })
        }

        async fn wallet_response(&self, _transaction_id: &str) -> Result<PollResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(PollResult::Response(WalletResponse::default()))
        }

        async fn update_registration_status(
            &self,
            _transaction_id: &str,
            _update: StatusUpdate,
        ) -> Result<()> {
            Ok(())
        }
    }

    /// An endpoint that always fails to initiate.
    #[derive(Debug)]
    struct FailingEndpoint;

    #[async_trait]
    impl VerifierEndpoint for FailingEndpoint {
        async fn initiate_transaction(
            &self,
            _request: InitTransactionRequest,
        ) -> Result<InitializedTransaction> {
            anyhow::bail!("connection refused")
        }

        async fn wallet_response(&self, _transaction_id: &str) -> Result<PollResult> {
            anyhow::bail!("connection refused")
        }

        async fn update_registration_status(
            &self,
            _transaction_id: &str,
            _update: StatusUpdate,
        ) -> Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn failed_initiation_leaves_lifecycle_unstarted() {
        let mut lifecycle = TransactionLifecycle::new(Arc::new(FailingEndpoint));

        let error = lifecycle
            .start(definition(), InitiationProfile::Default)
            .await
            .unwrap_err();
        assert!(matches!(error, LifecycleError::InitiationFailed(_)));
        assert!(lifecycle.transaction().is_none());
        assert!(lifecycle.session().active_transaction().is_none());
    }

    #[tokio::test]
    async fn start_initializes_and_exposes_deep_link() {
        let endpoint = MemoryEndpoint::new();
        let mut lifecycle = TransactionLifecycle::new(Arc::new(endpoint));

        let transaction = lifecycle
            .start(definition(), InitiationProfile::Default)
            .await
            .unwrap();
        assert_eq!(
            lifecycle.session().active_transaction(),
            Some(transaction.transaction_id.as_str())
        );

        let uri = lifecycle.connection_uri().unwrap();
        assert!(uri.starts_with("eudi-openid4vp://?client_id="));
        assert!(uri.contains("request_uri="));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_times_out_after_sixty_attempts() {
        let endpoint = MemoryEndpoint::new();
        let mut lifecycle = TransactionLifecycle::new(Arc::new(endpoint.clone()));

        let transaction = lifecycle
            .start(definition(), InitiationProfile::Default)
            .await
            .unwrap();
        let (_handle, mut token) = cancellation();

        let outcome = lifecycle.poll_for_response(&mut token).await.unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(endpoint.poll_count(&transaction.transaction_id).unwrap(), 60);
        assert_eq!(
            lifecycle.transaction(),
            Some(&Transaction::TimedOut {
                transaction_id: transaction.transaction_id
            })
        );
        assert!(lifecycle.take_conclusion().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn first_response_stops_the_poll_loop() {
        let endpoint = MemoryEndpoint::new();
        let mut lifecycle = TransactionLifecycle::new(Arc::new(endpoint.clone()));

        let transaction = lifecycle
            .start(definition(), InitiationProfile::Default)
            .await
            .unwrap();
        let transaction_id = transaction.transaction_id.clone();
        let (_handle, mut token) = cancellation();

        // Deliver the wallet response just before the third poll (polls run
        // at 2s, 4s, 6s).
        let deliverer = {
            let endpoint = endpoint.clone();
            let transaction_id = transaction_id.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                endpoint.deliver(&transaction_id, response()).unwrap();
            }
        };

        let (outcome, _) = tokio::join!(lifecycle.poll_for_response(&mut token), deliverer);
        assert_eq!(outcome.unwrap(), PollOutcome::Concluded);
        // Two pending polls plus the successful one; no further attempts.
        assert_eq!(endpoint.poll_count(&transaction_id).unwrap(), 3);

        let concluded = lifecycle.take_conclusion().unwrap();
        assert_eq!(concluded.transaction_id, transaction_id);
        assert_eq!(concluded.wallet_response, response());
        assert!(lifecycle.transaction().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling_between_attempts() {
        let endpoint = MemoryEndpoint::new();
        let mut lifecycle = TransactionLifecycle::new(Arc::new(endpoint.clone()));

        let transaction = lifecycle
            .start(definition(), InitiationProfile::Default)
            .await
            .unwrap();
        let (handle, mut token) = cancellation();

        let canceller = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            handle.cancel();
            // Idempotent.
            handle.cancel();
        };

        let (outcome, _) = tokio::join!(lifecycle.poll_for_response(&mut token), canceller);
        assert_eq!(outcome.unwrap(), PollOutcome::Cancelled);
        assert_eq!(endpoint.poll_count(&transaction.transaction_id).unwrap(), 2);
        assert!(lifecycle.transaction().is_none());
        assert!(lifecycle.session().active_transaction().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_cancellation_is_discarded() {
        let endpoint = Arc::new(SlowEndpoint {
            delay: Duration::from_secs(1),
            calls: AtomicU32::new(0),
        });
        let mut lifecycle = TransactionLifecycle::new(endpoint.clone());

        lifecycle
            .start(definition(), InitiationProfile::Default)
            .await
            .unwrap();
        let (handle, mut token) = cancellation();

        // The first query starts at 2s and would resolve at 3s; cancel while
        // it is in flight.
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            handle.cancel();
        };

        let (outcome, _) = tokio::join!(lifecycle.poll_for_response(&mut token), canceller);
        assert_eq!(outcome.unwrap(), PollOutcome::Cancelled);
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
        assert!(lifecycle.transaction().is_none());

        // The state machine is reset; the stale response cannot be applied.
        assert!(matches!(
            lifecycle.conclude_with(WalletResponse::default()),
            Err(LifecycleError::InvalidState { .. })
        ));
        assert!(lifecycle.take_conclusion().is_none());
    }

    #[tokio::test]
    async fn same_device_flow_concludes_without_polling() {
        let endpoint = MemoryEndpoint::new();
        let mut lifecycle = TransactionLifecycle::new(Arc::new(endpoint.clone()));

        let transaction = lifecycle
            .start(definition(), InitiationProfile::Cbor)
            .await
            .unwrap();
        lifecycle.conclude_with(response()).unwrap();

        let concluded = lifecycle.take_conclusion().unwrap();
        assert_eq!(concluded.transaction_id, transaction.transaction_id);
        assert_eq!(endpoint.poll_count(&transaction.transaction_id).unwrap(), 0);
    }

    #[tokio::test]
    async fn starting_again_resets_prior_state() {
        let endpoint = MemoryEndpoint::new();
        let mut lifecycle = TransactionLifecycle::new(Arc::new(endpoint.clone()));

        let first = lifecycle
            .start(definition(), InitiationProfile::Default)
            .await
            .unwrap();
        lifecycle.conclude_with(response()).unwrap();

        let second = lifecycle
            .start(definition(), InitiationProfile::Default)
            .await
            .unwrap();
        assert_ne!(first.transaction_id, second.transaction_id);
        // The unconsumed conclusion of the first transaction is gone.
        assert!(lifecycle.take_conclusion().is_none());
        assert!(matches!(
            lifecycle.transaction(),
            Some(Transaction::Initialized { .. })
        ));
    }

    #[tokio::test]
    async fn poll_requires_an_initialized_transaction() {
        let mut lifecycle = TransactionLifecycle::new(Arc::new(MemoryEndpoint::new()));
        let (_handle, mut token) = cancellation();

        assert!(matches!(
            lifecycle.poll_for_response(&mut token).await,
            Err(LifecycleError::InvalidState { .. })
        ));
    }
}
