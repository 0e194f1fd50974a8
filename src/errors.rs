//! Error types for compute-kit operations.

/// Errors surfaced by the query-and-settlement workflow.
///
/// Every variant carries the human-readable detail of the failure. Collaborator
/// errors are flattened into their detail string so that results holding an
/// `Error` stay `Clone` and `Send`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The provider address is not a syntactically valid network address.
    #[error("Invalid provider address '{address}': {reason}")]
    InvalidAddressError { address: String, reason: String },

    /// An amount was zero, negative, or otherwise not a valid fee or deposit.
    #[error("Invalid amount: {0}")]
    InvalidAmountError(String),

    /// The broker could not serve a registry, metadata or ledger call.
    #[error("Broker unavailable: {0}")]
    UpstreamUnavailableError(String),

    /// The broker refused to issue request headers.
    #[error("Authentication failed: {0}")]
    AuthenticationFailedError(String),

    /// The inference call failed at the network or HTTP level.
    #[error("Inference transport error: {0}")]
    TransportError(String),

    /// Automatic verification and settlement of a response failed.
    #[error("Automatic settlement failed: {0}")]
    SettlementFailedError(String),

    /// Manual fee settlement failed; the payment needs operator intervention.
    #[error("Fallback settlement failed: {0}")]
    FallbackSettlementFailedError(String),
}

impl Error {
    pub(crate) fn invalid_address(address: impl Into<String>, reason: impl ToString) -> Self {
        Error::InvalidAddressError {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}

/// A specialized `Result` type for compute-kit operations.
pub type Result<T> = std::result::Result<T, Error>;
