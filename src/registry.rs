use std::sync::Arc;

use crate::{
    broker::PaymentBroker,
    errors::{Error, Result},
    types::{Provider, ProviderAddress},
};

/// Read-only view of the providers currently offered through the broker.
///
/// Holds no state of its own; every call is a fresh broker listing.
#[derive(Debug)]
pub struct ServiceRegistry<B> {
    broker: Arc<B>,
}

impl<B> Clone for ServiceRegistry<B> {
    fn clone(&self) -> Self {
        ServiceRegistry {
            broker: Arc::clone(&self.broker),
        }
    }
}

impl<B: PaymentBroker> ServiceRegistry<B> {
    pub fn new(broker: Arc<B>) -> Self {
        ServiceRegistry { broker }
    }

    /// List every provider the broker knows about.
    pub async fn list_providers(&self) -> Result<Vec<Provider>> {
        self.broker
            .list_providers()
            .await
            .map_err(|err| Error::UpstreamUnavailableError(err.to_string()))
    }

    /// Look up a single provider in a fresh listing.
    pub async fn find(&self, address: &ProviderAddress) -> Result<Option<Provider>> {
        Ok(self
            .list_providers()
            .await?
            .into_iter()
            .find(|p| &p.address == address))
    }

    /// Providers offering the given service type, e.g. `chatbot`.
    pub async fn by_service_type(&self, service_type: &str) -> Result<Vec<Provider>> {
        Ok(self
            .list_providers()
            .await?
            .into_iter()
            .filter(|p| p.service_type.eq_ignore_ascii_case(service_type))
            .collect())
    }
}
