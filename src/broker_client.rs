use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use crate::{
    broker::{Confirmation, LedgerSnapshot, PaymentBroker, SettleResponse},
    types::{Amount, Provider, ProviderAddress, Record, ServiceMetadata},
};

/// A remote payment broker that communicates over HTTP.
///
/// The broker service holds the wallet and talks to the ledger contracts; this
/// client only forwards requests to it as JSON.
///
/// Endpoint paths are joined onto `base_url`, so it should end with a `/`.
#[derive(Debug, Clone)]
pub struct RemoteBrokerClient {
    pub base_url: Url,
    pub client: reqwest::Client,
    pub headers: HeaderMap,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteBrokerClientError {
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("HTTP request error: {0}")]
    HttpRequestError(#[from] reqwest::Error),
    #[error("Serialization/Deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    /// The broker answered with a non-success status. The body is kept verbatim
    /// since it may carry details an operator needs, such as an owed fee.
    #[error("Broker rejected request with {status}: {detail}")]
    BrokerRejected { status: StatusCode, detail: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadersRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadersResponse {
    pub headers: Record<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

impl From<VerifyResponse> for SettleResponse {
    fn from(response: VerifyResponse) -> Self {
        if response.valid {
            SettleResponse::settled(Confirmation {
                transaction: response.transaction,
            })
        } else {
            SettleResponse::rejected(
                response
                    .reason
                    .unwrap_or_else(|| "response failed verification".to_string()),
            )
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRequest {
    pub fee: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    pub amount: Amount,
}

impl RemoteBrokerClient {
    pub fn from_url(base_url: Url) -> Self {
        RemoteBrokerClient {
            base_url,
            client: reqwest::Client::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Attach a header to every broker request, e.g. an API key for the broker service.
    pub fn header(mut self, key: &HeaderName, value: &HeaderValue) -> Self {
        self.headers.insert(key, value.to_owned());
        self
    }

    fn provider_url(
        &self,
        provider: &ProviderAddress,
        action: &str,
    ) -> Result<Url, url::ParseError> {
        self.base_url.join(&format!("services/{provider}/{action}"))
    }

    async fn read<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RemoteBrokerClientError> {
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(RemoteBrokerClientError::BrokerRejected {
                status,
                detail: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteBrokerClientError> {
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await?;
        Self::read(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, RemoteBrokerClientError> {
        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }
}

impl PaymentBroker for RemoteBrokerClient {
    type Error = RemoteBrokerClientError;

    async fn list_providers(&self) -> Result<Vec<Provider>, Self::Error> {
        self.get(self.base_url.join("services")?).await
    }

    async fn service_metadata(
        &self,
        provider: &ProviderAddress,
    ) -> Result<ServiceMetadata, Self::Error> {
        self.get(self.provider_url(provider, "metadata")?).await
    }

    async fn request_headers(
        &self,
        provider: &ProviderAddress,
        content: &str,
    ) -> Result<Record<String>, Self::Error> {
        let response: HeadersResponse = self
            .post(
                self.provider_url(provider, "headers")?,
                &HeadersRequest {
                    content: content.to_string(),
                },
            )
            .await?;
        Ok(response.headers)
    }

    async fn verify_and_settle(
        &self,
        provider: &ProviderAddress,
        content: Option<&str>,
        correlation_id: &str,
    ) -> Result<SettleResponse, Self::Error> {
        let response: VerifyResponse = self
            .post(
                self.provider_url(provider, "verify")?,
                &VerifyRequest {
                    content: content.map(str::to_string),
                    chat_id: correlation_id.to_string(),
                },
            )
            .await?;
        Ok(response.into())
    }

    async fn settle_fee_manually(
        &self,
        provider: &ProviderAddress,
        fee: Amount,
    ) -> Result<Confirmation, Self::Error> {
        self.post(self.provider_url(provider, "settle-fee")?, &FeeRequest { fee })
            .await
    }

    async fn deposit_fund(&self, amount: Amount) -> Result<Confirmation, Self::Error> {
        self.post(self.base_url.join("account/deposit")?, &AmountRequest { amount })
            .await
    }

    async fn add_ledger(&self, amount: Amount) -> Result<Confirmation, Self::Error> {
        self.post(self.base_url.join("account/add-ledger")?, &AmountRequest { amount })
            .await
    }

    async fn ledger(&self) -> Result<LedgerSnapshot, Self::Error> {
        self.get(self.base_url.join("account/ledger")?).await
    }
}
