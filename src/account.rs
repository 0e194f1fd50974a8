use std::sync::Arc;

use crate::{
    broker::{Confirmation, LedgerSnapshot, PaymentBroker},
    errors::{Error, Result},
    types::{Amount, ProviderAddress},
};

/// Funding and balance operations on the broker's ledger.
///
/// Amounts are validated before the broker is contacted.
#[derive(Debug)]
pub struct AccountManager<B> {
    broker: Arc<B>,
}

impl<B> Clone for AccountManager<B> {
    fn clone(&self) -> Self {
        AccountManager {
            broker: Arc::clone(&self.broker),
        }
    }
}

impl<B: PaymentBroker> AccountManager<B> {
    pub fn new(broker: Arc<B>) -> Self {
        AccountManager { broker }
    }

    pub async fn deposit(&self, amount: Amount) -> Result<Confirmation> {
        let amount = amount.require_positive()?;
        let confirmation = self
            .broker
            .deposit_fund(amount)
            .await
            .map_err(|err| Error::UpstreamUnavailableError(err.to_string()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Deposited {} into ledger", amount);

        Ok(confirmation)
    }

    pub async fn add_to_ledger(&self, amount: Amount) -> Result<Confirmation> {
        let amount = amount.require_positive()?;
        let confirmation = self
            .broker
            .add_ledger(amount)
            .await
            .map_err(|err| Error::UpstreamUnavailableError(err.to_string()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Added {} to ledger", amount);

        Ok(confirmation)
    }

    /// Read the ledger from the broker. Never served from a cache.
    pub async fn balance(&self) -> Result<LedgerSnapshot> {
        self.broker
            .ledger()
            .await
            .map_err(|err| Error::UpstreamUnavailableError(err.to_string()))
    }

    /// Settle an exact fee owed to `provider`.
    ///
    /// This is the fallback path of the settlement coordinator, and the recovery
    /// operation for an operator who knows the fee left unsettled by an earlier
    /// query.
    pub async fn settle_fee_manually(
        &self,
        provider: &ProviderAddress,
        fee: Amount,
    ) -> Result<Confirmation> {
        let fee = fee.require_positive()?;
        let confirmation = self
            .broker
            .settle_fee_manually(provider, fee)
            .await
            .map_err(|err| Error::FallbackSettlementFailedError(err.to_string()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Settled fee manually: provider='{}', fee='{}'", provider, fee);

        Ok(confirmation)
    }
}
