use std::sync::Arc;

use crate::{
    broker::PaymentBroker,
    errors::{Error, Result},
    types::{ProviderAddress, RequestHeaders, ServiceMetadata},
};

/// Resolves a provider's serving details and request headers for one query.
#[derive(Debug)]
pub struct ProviderResolver<B> {
    broker: Arc<B>,
}

impl<B> Clone for ProviderResolver<B> {
    fn clone(&self) -> Self {
        ProviderResolver {
            broker: Arc::clone(&self.broker),
        }
    }
}

impl<B: PaymentBroker> ProviderResolver<B> {
    pub fn new(broker: Arc<B>) -> Self {
        ProviderResolver { broker }
    }

    /// Resolve the current endpoint and model of the provider at `address`.
    ///
    /// The address is validated before the broker is contacted.
    pub async fn resolve_metadata(
        &self,
        address: &str,
    ) -> Result<(ProviderAddress, ServiceMetadata)> {
        let provider = ProviderAddress::parse(address)?;
        let metadata = self.metadata_for(&provider).await?;
        Ok((provider, metadata))
    }

    /// Resolve metadata for an already-validated provider address.
    pub async fn metadata_for(&self, provider: &ProviderAddress) -> Result<ServiceMetadata> {
        let metadata = self
            .broker
            .service_metadata(provider)
            .await
            .map_err(|err| Error::UpstreamUnavailableError(err.to_string()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Resolved provider {}: endpoint='{}', model='{}'",
            provider,
            metadata.endpoint,
            metadata.model
        );

        Ok(metadata)
    }

    /// Issue headers for a single request carrying exactly `prompt`.
    ///
    /// Each call may consume a request allowance on the broker, so call it once
    /// per logical query and hand the result to the inference call that sends
    /// the same prompt.
    pub async fn issue_headers(
        &self,
        provider: &ProviderAddress,
        prompt: &str,
    ) -> Result<RequestHeaders> {
        let headers = self
            .broker
            .request_headers(provider, prompt)
            .await
            .map_err(|err| Error::AuthenticationFailedError(err.to_string()))?;

        Ok(RequestHeaders::new(headers, prompt))
    }
}
