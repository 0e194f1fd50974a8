//! HTTP transport for compute-kit, built on axum.
//!
//! The gateway only marshals JSON into [`ComputeClient`] calls and renders the
//! results; all protocol and failure handling lives in the core.
//!
//! | Route                      | Operation                                   |
//! |----------------------------|---------------------------------------------|
//! | `GET  /services/list`      | [`ServiceRegistry::list_providers`]         |
//! | `POST /services/query`     | [`ComputeClient::query`]                    |
//! | `POST /services/settle-fee`| [`AccountManager::settle_fee_manually`]     |
//! | `GET  /account/info`       | [`AccountManager::balance`]                 |
//! | `POST /account/deposit`    | [`AccountManager::deposit`]                 |
//! | `POST /account/add-ledger` | [`AccountManager::add_to_ledger`]           |
//!
//! [`ServiceRegistry::list_providers`]: crate::registry::ServiceRegistry::list_providers
//! [`AccountManager::settle_fee_manually`]: crate::account::AccountManager::settle_fee_manually
//! [`AccountManager::balance`]: crate::account::AccountManager::balance
//! [`AccountManager::deposit`]: crate::account::AccountManager::deposit
//! [`AccountManager::add_to_ledger`]: crate::account::AccountManager::add_to_ledger

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    broker::{Confirmation, PaymentBroker},
    client::ComputeClient,
    errors::{Error, Result},
    inference::Inference,
    settlement::{PaymentOutcome, QueryResult},
    types::{Amount, Provider, ProviderAddress},
};

/// Shared state of the gateway routes.
#[derive(Debug)]
pub struct GatewayState<B, I> {
    pub client: ComputeClient<B, I>,
    /// Used when a query request carries no fallback fee.
    pub default_fallback_fee: Option<Amount>,
}

impl<B, I> Clone for GatewayState<B, I> {
    fn clone(&self) -> Self {
        GatewayState {
            client: self.client.clone(),
            default_fallback_fee: self.default_fallback_fee,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub provider_address: String,
    pub query: String,
    #[serde(default)]
    pub fallback_fee: Option<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub content: Option<String>,
    pub correlation_id: String,
    /// One of `verified`, `fallback_settled` or `unsettled`.
    pub payment_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_fee: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_error: Option<String>,
}

impl From<QueryResult> for QueryResponse {
    fn from(result: QueryResult) -> Self {
        let payment_status = result.payment_outcome().to_string();
        let (settled_fee, settlement_error, fallback_error) = match result.payment_outcome() {
            PaymentOutcome::Verified => (None, None, None),
            PaymentOutcome::FallbackSettled { fee } => (Some(*fee), None, None),
            PaymentOutcome::Unsettled(unsettled) => (
                None,
                Some(unsettled.settlement_error.to_string()),
                unsettled.fallback_error.as_ref().map(ToString::to_string),
            ),
        };

        QueryResponse {
            correlation_id: result.correlation_id().to_string(),
            content: result.into_content(),
            payment_status,
            settled_fee,
            settlement_error,
            fallback_error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleFeeRequest {
    pub provider_address: String,
    pub fee: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub balance: Amount,
    pub locked: Amount,
    pub available: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl Error {
    /// HTTP status the gateway answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidAddressError { .. } | Error::InvalidAmountError(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::AuthenticationFailedError(_) => StatusCode::UNAUTHORIZED,
            Error::UpstreamUnavailableError(_) | Error::TransportError(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::SettlementFailedError(_) | Error::FallbackSettlementFailedError(_) => {
                StatusCode::PAYMENT_REQUIRED
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAddressError { .. } => "invalid_address",
            Error::InvalidAmountError(_) => "invalid_amount",
            Error::UpstreamUnavailableError(_) => "upstream_unavailable",
            Error::AuthenticationFailedError(_) => "authentication_failed",
            Error::TransportError(_) => "transport_error",
            Error::SettlementFailedError(_) => "settlement_failed",
            Error::FallbackSettlementFailedError(_) => "fallback_settlement_failed",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        #[cfg(feature = "tracing")]
        tracing::warn!("Request failed: {self}");

        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Build the gateway router over a [`ComputeClient`].
pub fn router<B, I>(client: ComputeClient<B, I>, default_fallback_fee: Option<Amount>) -> Router
where
    B: PaymentBroker + 'static,
    I: Inference + 'static,
{
    Router::new()
        .route("/services/list", get(list_services::<B, I>))
        .route("/services/query", post(query::<B, I>))
        .route("/services/settle-fee", post(settle_fee::<B, I>))
        .route("/account/info", get(account_info::<B, I>))
        .route("/account/deposit", post(deposit::<B, I>))
        .route("/account/add-ledger", post(add_ledger::<B, I>))
        .with_state(GatewayState {
            client,
            default_fallback_fee,
        })
}

async fn list_services<B: PaymentBroker, I: Inference>(
    State(state): State<GatewayState<B, I>>,
) -> Result<Json<Vec<Provider>>> {
    Ok(Json(state.client.registry().list_providers().await?))
}

async fn query<B: PaymentBroker, I: Inference>(
    State(state): State<GatewayState<B, I>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let fallback_fee = request.fallback_fee.or(state.default_fallback_fee);
    let result = state
        .client
        .query(&request.provider_address, &request.query, fallback_fee)
        .await?;
    Ok(Json(result.into()))
}

async fn settle_fee<B: PaymentBroker, I: Inference>(
    State(state): State<GatewayState<B, I>>,
    Json(request): Json<SettleFeeRequest>,
) -> Result<Json<Confirmation>> {
    let provider = ProviderAddress::parse(&request.provider_address)?;
    let confirmation = state
        .client
        .account()
        .settle_fee_manually(&provider, request.fee)
        .await?;
    Ok(Json(confirmation))
}

async fn account_info<B: PaymentBroker, I: Inference>(
    State(state): State<GatewayState<B, I>>,
) -> Result<Json<AccountInfo>> {
    let ledger = state.client.account().balance().await?;
    Ok(Json(AccountInfo {
        balance: ledger.balance,
        locked: ledger.locked,
        available: ledger.available(),
    }))
}

async fn deposit<B: PaymentBroker, I: Inference>(
    State(state): State<GatewayState<B, I>>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<Confirmation>> {
    Ok(Json(state.client.account().deposit(request.amount).await?))
}

async fn add_ledger<B: PaymentBroker, I: Inference>(
    State(state): State<GatewayState<B, I>>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<Confirmation>> {
    Ok(Json(
        state.client.account().add_to_ledger(request.amount).await?,
    ))
}
