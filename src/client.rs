use std::sync::Arc;

use crate::{
    account::AccountManager,
    broker::PaymentBroker,
    errors::Result,
    inference::Inference,
    registry::ServiceRegistry,
    resolver::ProviderResolver,
    settlement::{QueryResult, SettlementCoordinator},
    types::Amount,
};

/// Entry point for querying providers and paying for their responses.
///
/// Every component shares the same broker handle; the settlement coordinator
/// (and so its duplicate-settlement guard) is shared by all clones.
///
/// ```no_run
/// # async fn run() -> compute_kit::errors::Result<()> {
/// use std::sync::Arc;
/// use compute_kit::{
///     broker_client::RemoteBrokerClient, client::ComputeClient, inference::InferenceClient,
/// };
/// use url_macro::url;
///
/// let broker = RemoteBrokerClient::from_url(url!("http://localhost:4000/"));
/// let client = ComputeClient::new(Arc::new(broker), InferenceClient::new());
///
/// let result = client
///     .query(
///         "0x3cb9b3bbfde8501f411bb69ad3dc07908ed0de20",
///         "Hello, AI!",
///         Some("0.01".parse()?),
///     )
///     .await?;
///
/// println!("{:?} ({})", result.content(), result.payment_outcome());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ComputeClient<B, I> {
    registry: ServiceRegistry<B>,
    resolver: ProviderResolver<B>,
    coordinator: SettlementCoordinator<B>,
    account: AccountManager<B>,
    inference: Arc<I>,
}

impl<B, I> Clone for ComputeClient<B, I> {
    fn clone(&self) -> Self {
        ComputeClient {
            registry: self.registry.clone(),
            resolver: self.resolver.clone(),
            coordinator: self.coordinator.clone(),
            account: self.account.clone(),
            inference: Arc::clone(&self.inference),
        }
    }
}

impl<B: PaymentBroker, I: Inference> ComputeClient<B, I> {
    pub fn new(broker: Arc<B>, inference: I) -> Self {
        ComputeClient {
            registry: ServiceRegistry::new(Arc::clone(&broker)),
            resolver: ProviderResolver::new(Arc::clone(&broker)),
            coordinator: SettlementCoordinator::new(Arc::clone(&broker)),
            account: AccountManager::new(broker),
            inference: Arc::new(inference),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry<B> {
        &self.registry
    }

    pub fn resolver(&self) -> &ProviderResolver<B> {
        &self.resolver
    }

    pub fn coordinator(&self) -> &SettlementCoordinator<B> {
        &self.coordinator
    }

    pub fn account(&self) -> &AccountManager<B> {
        &self.account
    }

    /// Send `prompt` to the provider at `provider` and settle payment for the answer.
    ///
    /// Errors before a response is received (invalid address, broker
    /// unavailable, authentication, transport) are returned as `Err` and no
    /// settlement is attempted. Once a response is received the call always
    /// succeeds, and the payment outcome is reported in the [`QueryResult`].
    pub async fn query(
        &self,
        provider: &str,
        prompt: &str,
        fallback_fee: Option<Amount>,
    ) -> Result<QueryResult> {
        let (provider, metadata) = self.resolver.resolve_metadata(provider).await?;
        let headers = self.resolver.issue_headers(&provider, prompt).await?;

        let completion = self
            .inference
            .complete(&metadata.endpoint, &metadata.model, prompt, headers)
            .await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Received completion: provider='{}', correlation_id='{}'",
            provider,
            completion.correlation_id
        );

        Ok(self
            .coordinator
            .settle(&provider, completion, fallback_fee)
            .await)
    }
}
