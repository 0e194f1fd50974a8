//! Payment settlement for completed inference responses.
//!
//! A response that has been received is never thrown away because its payment
//! failed. [`SettlementCoordinator::settle`] always returns a [`QueryResult`]
//! holding the content, and reports the payment outcome next to it:
//!
//! ```text
//! Pending -> AutoSettling -> Verified
//!                         -> AutoFailed -> FallbackSettling -> FallbackSettled
//!                                                           -> FallbackFailed
//!                                       -> (no fallback fee) Unsettled
//! ```
//!
//! Settlement runs at most once per `(provider, correlation id)` pair for the
//! lifetime of the coordinator, no matter how many times, or how concurrently,
//! the pair is settled. Duplicates receive the outcome of the first run.

use std::{fmt::Display, sync::Arc};

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::{
    account::AccountManager,
    broker::{PaymentBroker, SettleResponse},
    errors::Error,
    inference::Completion,
    types::{Amount, ProviderAddress},
};

/// How the payment for a query was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The broker verified the response and settled its fee.
    Verified,
    /// Automatic settlement failed and the fallback fee was settled manually.
    FallbackSettled { fee: Amount },
    /// No settlement succeeded. The payment needs operator attention.
    Unsettled(UnsettledPayment),
}

impl PaymentOutcome {
    pub fn is_settled(&self) -> bool {
        !matches!(self, PaymentOutcome::Unsettled(_))
    }

    pub fn as_unsettled(&self) -> Option<&UnsettledPayment> {
        match self {
            PaymentOutcome::Unsettled(u) => Some(u),
            _ => None,
        }
    }
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOutcome::Verified => write!(f, "verified"),
            PaymentOutcome::FallbackSettled { .. } => write!(f, "fallback_settled"),
            PaymentOutcome::Unsettled(_) => write!(f, "unsettled"),
        }
    }
}

/// Why a payment was left unsettled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsettledPayment {
    /// Failure of the automatic path.
    pub settlement_error: Error,
    /// Failure of the fallback path, if one was attempted.
    pub fallback_error: Option<Error>,
}

impl UnsettledPayment {
    /// The error to report first: the fallback failure when there was one.
    pub fn dominant_error(&self) -> &Error {
        self.fallback_error.as_ref().unwrap_or(&self.settlement_error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementKind {
    Automatic,
    Fallback,
}

/// Record of one settlement try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementAttempt {
    pub kind: SettlementKind,
    pub provider: ProviderAddress,
    /// Fee sent with a fallback settlement. `None` for the automatic path.
    pub fee: Option<Amount>,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

/// The answer to a query together with the outcome of paying for it.
///
/// Immutable once built by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    content: Option<String>,
    correlation_id: String,
    payment: PaymentOutcome,
    attempts: Vec<SettlementAttempt>,
}

impl QueryResult {
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn payment_outcome(&self) -> &PaymentOutcome {
        &self.payment
    }

    /// Settlement attempts in the order they were made.
    pub fn attempts(&self) -> &[SettlementAttempt] {
        &self.attempts
    }

    /// The dominant payment error, if the payment is unsettled.
    pub fn error(&self) -> Option<&Error> {
        self.payment.as_unsettled().map(UnsettledPayment::dominant_error)
    }

    pub fn into_content(self) -> Option<String> {
        self.content
    }
}

/// Settlement states. Terminal states carry everything needed for the result.
#[derive(Debug)]
enum SettlementState {
    Pending,
    AutoSettling,
    AutoFailed(Error),
    FallbackSettling { fee: Amount, settlement_error: Error },
    Done(PaymentOutcome),
}

type PairKey = (ProviderAddress, String);

/// Settles payment for completed responses, falling back to a manual fee
/// settlement when the automatic path fails.
///
/// Every `(provider, correlation id)` pair settled through the coordinator is
/// remembered together with its outcome, shared by all clones, until it is
/// released with [`SettlementCoordinator::forget`]. A long-lived coordinator
/// therefore grows by one entry per settled response.
#[derive(Debug)]
pub struct SettlementCoordinator<B> {
    broker: Arc<B>,
    account: AccountManager<B>,
    outcomes: Arc<DashMap<PairKey, Arc<OnceCell<PaymentOutcome>>>>,
}

impl<B> Clone for SettlementCoordinator<B> {
    fn clone(&self) -> Self {
        SettlementCoordinator {
            broker: Arc::clone(&self.broker),
            account: self.account.clone(),
            outcomes: Arc::clone(&self.outcomes),
        }
    }
}

impl<B: PaymentBroker> SettlementCoordinator<B> {
    pub fn new(broker: Arc<B>) -> Self {
        SettlementCoordinator {
            account: AccountManager::new(Arc::clone(&broker)),
            broker,
            outcomes: Arc::new(DashMap::new()),
        }
    }

    /// Whether settlement has already been dispatched for the pair.
    pub fn is_consumed(&self, provider: &ProviderAddress, correlation_id: &str) -> bool {
        self.outcomes.contains_key(&(*provider, correlation_id.to_string()))
    }

    /// The recorded outcome for the pair, once its settlement has finished.
    pub fn outcome_of(
        &self,
        provider: &ProviderAddress,
        correlation_id: &str,
    ) -> Option<PaymentOutcome> {
        self.outcomes
            .get(&(*provider, correlation_id.to_string()))
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of pairs currently remembered.
    pub fn tracked_pairs(&self) -> usize {
        self.outcomes.len()
    }

    /// Release a finished pair, returning its outcome.
    ///
    /// A pair still being settled is left in place. Once released, settling the
    /// same pair again dispatches a new automatic settlement, so only forget
    /// pairs whose responses can no longer be resubmitted.
    pub fn forget(
        &self,
        provider: &ProviderAddress,
        correlation_id: &str,
    ) -> Option<PaymentOutcome> {
        self.outcomes
            .remove_if(&(*provider, correlation_id.to_string()), |_, cell| cell.initialized())
            .and_then(|(_, cell)| cell.get().cloned())
    }

    /// Settle payment for a completed response.
    ///
    /// A fallback settlement is made only if automatic settlement fails and
    /// `fallback_fee` is present and non-zero. The completion's content and
    /// correlation id are returned unchanged whatever the payment outcome.
    ///
    /// The first call for a `(provider, correlation id)` pair runs the
    /// settlement. Concurrent and later calls for the same pair wait for it and
    /// report its outcome without contacting the broker; their
    /// [`QueryResult::attempts`] are empty.
    pub async fn settle(
        &self,
        provider: &ProviderAddress,
        completion: Completion,
        fallback_fee: Option<Amount>,
    ) -> QueryResult {
        let Completion {
            content,
            correlation_id,
        } = completion;
        let mut attempts = Vec::new();

        let payment = if correlation_id.is_empty() {
            self.run(provider, content.as_deref(), "", fallback_fee, &mut attempts).await
        } else {
            let cell = self
                .outcomes
                .entry((*provider, correlation_id.clone()))
                .or_default()
                .clone();

            let (text, id, recorded) = (content.as_deref(), correlation_id.as_str(), &mut attempts);
            let payment = cell
                .get_or_init(move || self.run(provider, text, id, fallback_fee, recorded))
                .await
                .clone();

            #[cfg(feature = "tracing")]
            {
                if attempts.is_empty() {
                    tracing::warn!(
                        "Reusing settlement outcome: provider='{}', correlation_id='{}', {}",
                        provider,
                        correlation_id,
                        payment
                    );
                }
            }

            payment
        };

        QueryResult {
            content,
            correlation_id,
            payment,
            attempts,
        }
    }

    async fn run(
        &self,
        provider: &ProviderAddress,
        content: Option<&str>,
        correlation_id: &str,
        fallback_fee: Option<Amount>,
        attempts: &mut Vec<SettlementAttempt>,
    ) -> PaymentOutcome {
        let mut state = SettlementState::Pending;

        let payment = loop {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Settlement state: provider='{}', correlation_id='{}', state={:?}",
                provider,
                correlation_id,
                state
            );

            state = match state {
                SettlementState::Pending => {
                    if correlation_id.is_empty() {
                        SettlementState::AutoFailed(Error::SettlementFailedError(
                            "response carries no correlation id to verify".to_string(),
                        ))
                    } else {
                        SettlementState::AutoSettling
                    }
                }
                SettlementState::AutoSettling => {
                    let result = self
                        .broker
                        .verify_and_settle(provider, content, correlation_id)
                        .await;

                    let error = match result {
                        Ok(SettleResponse::Settled(_confirmation)) => None,
                        Ok(SettleResponse::Rejected(rejected)) => Some(rejected.reason),
                        Err(err) => Some(err.to_string()),
                    };

                    attempts.push(SettlementAttempt {
                        kind: SettlementKind::Automatic,
                        provider: *provider,
                        fee: None,
                        succeeded: error.is_none(),
                        error_detail: error.clone(),
                    });

                    match error {
                        None => SettlementState::Done(PaymentOutcome::Verified),
                        Some(detail) => {
                            SettlementState::AutoFailed(Error::SettlementFailedError(detail))
                        }
                    }
                }
                SettlementState::AutoFailed(settlement_error) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        "Automatic settlement failed: provider='{}', correlation_id='{}': {}",
                        provider,
                        correlation_id,
                        settlement_error
                    );

                    match fallback_fee.filter(|fee| !fee.is_zero()) {
                        Some(fee) => SettlementState::FallbackSettling {
                            fee,
                            settlement_error,
                        },
                        None => SettlementState::Done(PaymentOutcome::Unsettled(UnsettledPayment {
                            settlement_error,
                            fallback_error: None,
                        })),
                    }
                }
                SettlementState::FallbackSettling {
                    fee,
                    settlement_error,
                } => {
                    let result = self.account.settle_fee_manually(provider, fee).await;

                    attempts.push(SettlementAttempt {
                        kind: SettlementKind::Fallback,
                        provider: *provider,
                        fee: Some(fee),
                        succeeded: result.is_ok(),
                        error_detail: result.as_ref().err().map(ToString::to_string),
                    });

                    match result {
                        Ok(_confirmation) => {
                            SettlementState::Done(PaymentOutcome::FallbackSettled { fee })
                        }
                        Err(fallback_error) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(
                                "Fallback settlement failed: provider='{}', fee='{}': {}",
                                provider,
                                fee,
                                fallback_error
                            );

                            SettlementState::Done(PaymentOutcome::Unsettled(UnsettledPayment {
                                settlement_error,
                                fallback_error: Some(fallback_error),
                            }))
                        }
                    }
                }
                SettlementState::Done(outcome) => break outcome,
            };
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Settlement finished: provider='{}', correlation_id='{}', outcome={}",
            provider,
            correlation_id,
            payment
        );

        payment
    }
}
