//! The payment broker interface.
//!
//! The broker owns the wallet and the ledger. It lists providers, issues
//! request headers, verifies responses against their payment obligations and
//! moves funds. compute-kit never signs or submits ledger transactions itself;
//! every such operation goes through a [`PaymentBroker`].

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Provider, ProviderAddress, Record, ServiceMetadata};

/// Outcome of asking the broker to verify and settle a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleResponse {
    Settled(Confirmation),
    Rejected(SettleRejected),
}

impl SettleResponse {
    pub fn is_settled(&self) -> bool {
        matches!(self, SettleResponse::Settled(_))
    }

    pub fn settled(confirmation: Confirmation) -> Self {
        SettleResponse::Settled(confirmation)
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        SettleResponse::Rejected(SettleRejected {
            reason: reason.into(),
        })
    }

    pub fn as_rejected(&self) -> Option<&SettleRejected> {
        match self {
            SettleResponse::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleRejected {
    pub reason: String,
}

/// Acknowledgement of a ledger operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    /// Transaction hash, when the broker reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

/// A point-in-time read of the ledger.
///
/// Snapshots are never cached; every balance read goes to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub balance: Amount,
    #[serde(default)]
    pub locked: Amount,
}

impl LedgerSnapshot {
    /// Funds not locked against outstanding provider obligations.
    pub fn available(&self) -> Amount {
        self.balance.saturating_sub(self.locked)
    }
}

/// Payment broker interface.
///
/// Every operation may fail with an opaque [`PaymentBroker::Error`] whose
/// `Display` is the human-readable detail surfaced to callers.
pub trait PaymentBroker: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn list_providers(&self) -> impl Future<Output = Result<Vec<Provider>, Self::Error>> + Send;

    fn service_metadata(
        &self,
        provider: &ProviderAddress,
    ) -> impl Future<Output = Result<ServiceMetadata, Self::Error>> + Send;

    /// Produce single-use headers bound to `content`.
    fn request_headers(
        &self,
        provider: &ProviderAddress,
        content: &str,
    ) -> impl Future<Output = Result<Record<String>, Self::Error>> + Send;

    /// Validate a response against its payment obligation and release the fee.
    fn verify_and_settle(
        &self,
        provider: &ProviderAddress,
        content: Option<&str>,
        correlation_id: &str,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;

    fn settle_fee_manually(
        &self,
        provider: &ProviderAddress,
        fee: Amount,
    ) -> impl Future<Output = Result<Confirmation, Self::Error>> + Send;

    fn deposit_fund(
        &self,
        amount: Amount,
    ) -> impl Future<Output = Result<Confirmation, Self::Error>> + Send;

    fn add_ledger(
        &self,
        amount: Amount,
    ) -> impl Future<Output = Result<Confirmation, Self::Error>> + Send;

    fn ledger(&self) -> impl Future<Output = Result<LedgerSnapshot, Self::Error>> + Send;
}
