#![allow(dead_code)]

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use compute_kit::{
    broker::{Confirmation, LedgerSnapshot, PaymentBroker, SettleResponse},
    errors::{Error, Result},
    inference::{Completion, Inference},
    types::{Amount, Provider, ProviderAddress, Record, RequestHeaders, ServiceMetadata},
};
use url::Url;

/// The provider used throughout the scenarios.
pub const PROVIDER: &str = "0x0000000000000000000000000000000000000aaa";
pub const OTHER_PROVIDER: &str = "0x0000000000000000000000000000000000000bbb";

pub fn provider() -> ProviderAddress {
    PROVIDER.parse().unwrap()
}

pub fn completion(content: &str, correlation_id: &str) -> Completion {
    Completion {
        content: Some(content.to_string()),
        correlation_id: correlation_id.to_string(),
    }
}

pub fn fee(s: &str) -> Amount {
    s.parse().unwrap()
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

/// How the mock answers `verify_and_settle`.
#[derive(Debug, Clone)]
pub enum AutoSettle {
    Settle,
    Reject(String),
    Fail(String),
}

#[derive(Debug, Default)]
pub struct Calls {
    pub list_providers: AtomicUsize,
    pub service_metadata: AtomicUsize,
    pub request_headers: AtomicUsize,
    pub verify_and_settle: AtomicUsize,
    pub settle_fee_manually: AtomicUsize,
    pub deposit_fund: AtomicUsize,
    pub add_ledger: AtomicUsize,
    pub ledger: AtomicUsize,
}

impl Calls {
    pub fn total(&self) -> usize {
        [
            &self.list_providers,
            &self.service_metadata,
            &self.request_headers,
            &self.verify_and_settle,
            &self.settle_fee_manually,
            &self.deposit_fund,
            &self.add_ledger,
            &self.ledger,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Scripted in-process broker recording every call it receives.
#[derive(Debug)]
pub struct MockBroker {
    pub calls: Calls,
    pub providers: Vec<Provider>,
    pub metadata: Option<ServiceMetadata>,
    pub unavailable: Option<String>,
    pub headers_error: Option<String>,
    pub auto_settle: AutoSettle,
    /// Holds `verify_and_settle` open so duplicates arrive while it is in flight.
    pub settle_delay: Option<Duration>,
    pub fallback_error: Option<String>,
    pub ledger: LedgerSnapshot,
    pub header_prompts: Mutex<Vec<String>>,
    pub settled_fees: Mutex<Vec<Amount>>,
    pub verified: Mutex<Vec<(Option<String>, String)>>,
}

impl Default for MockBroker {
    fn default() -> Self {
        MockBroker {
            calls: Calls::default(),
            providers: vec![Provider {
                address: provider(),
                model: "llama-3.3-70b-instruct".to_string(),
                endpoint: Url::parse("http://provider.test/v1/proxy").unwrap(),
                service_type: "chatbot".to_string(),
                input_price: None,
                output_price: None,
                verifiability: Some("TeeML".to_string()),
            }],
            metadata: Some(ServiceMetadata {
                endpoint: Url::parse("http://provider.test/v1/proxy").unwrap(),
                model: "llama-3.3-70b-instruct".to_string(),
            }),
            unavailable: None,
            headers_error: None,
            auto_settle: AutoSettle::Settle,
            settle_delay: None,
            fallback_error: None,
            ledger: LedgerSnapshot {
                balance: Amount::from_tokens(10),
                locked: Amount::from_tokens(2),
            },
            header_prompts: Mutex::new(Vec::new()),
            settled_fees: Mutex::new(Vec::new()),
            verified: Mutex::new(Vec::new()),
        }
    }
}

impl MockBroker {
    pub fn new() -> Self {
        MockBroker::default()
    }

    pub fn with_auto_settle(mut self, auto_settle: AutoSettle) -> Self {
        self.auto_settle = auto_settle;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    pub fn with_fallback_error(mut self, error: &str) -> Self {
        self.fallback_error = Some(error.to_string());
        self
    }

    pub fn with_headers_error(mut self, error: &str) -> Self {
        self.headers_error = Some(error.to_string());
        self
    }

    pub fn unavailable(mut self, error: &str) -> Self {
        self.unavailable = Some(error.to_string());
        self
    }

    fn check_available(&self) -> std::result::Result<(), MockError> {
        match &self.unavailable {
            Some(err) => Err(MockError(err.clone())),
            None => Ok(()),
        }
    }
}

impl PaymentBroker for MockBroker {
    type Error = MockError;

    async fn list_providers(&self) -> std::result::Result<Vec<Provider>, MockError> {
        self.calls.list_providers.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.providers.clone())
    }

    async fn service_metadata(
        &self,
        _provider: &ProviderAddress,
    ) -> std::result::Result<ServiceMetadata, MockError> {
        self.calls.service_metadata.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.metadata
            .clone()
            .ok_or_else(|| MockError("provider not found".to_string()))
    }

    async fn request_headers(
        &self,
        _provider: &ProviderAddress,
        content: &str,
    ) -> std::result::Result<Record<String>, MockError> {
        self.calls.request_headers.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.headers_error {
            return Err(MockError(err.clone()));
        }
        self.header_prompts
            .lock()
            .unwrap()
            .push(content.to_string());

        let mut headers = Record::new();
        headers.insert("Address".to_string(), "0xuser".to_string());
        headers.insert("Request-Hash".to_string(), format!("hash-of-{}", content.len()));
        Ok(headers)
    }

    async fn verify_and_settle(
        &self,
        _provider: &ProviderAddress,
        content: Option<&str>,
        correlation_id: &str,
    ) -> std::result::Result<SettleResponse, MockError> {
        self.calls.verify_and_settle.fetch_add(1, Ordering::SeqCst);
        self.verified
            .lock()
            .unwrap()
            .push((content.map(str::to_string), correlation_id.to_string()));

        if let Some(delay) = self.settle_delay {
            tokio::time::sleep(delay).await;
        }

        match &self.auto_settle {
            AutoSettle::Settle => Ok(SettleResponse::settled(Confirmation {
                transaction: Some("0xsettled".to_string()),
            })),
            AutoSettle::Reject(reason) => Ok(SettleResponse::rejected(reason.clone())),
            AutoSettle::Fail(err) => Err(MockError(err.clone())),
        }
    }

    async fn settle_fee_manually(
        &self,
        _provider: &ProviderAddress,
        fee: Amount,
    ) -> std::result::Result<Confirmation, MockError> {
        self.calls.settle_fee_manually.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fallback_error {
            return Err(MockError(err.clone()));
        }
        self.settled_fees.lock().unwrap().push(fee);
        Ok(Confirmation {
            transaction: Some("0xfee".to_string()),
        })
    }

    async fn deposit_fund(&self, _amount: Amount) -> std::result::Result<Confirmation, MockError> {
        self.calls.deposit_fund.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(Confirmation::default())
    }

    async fn add_ledger(&self, _amount: Amount) -> std::result::Result<Confirmation, MockError> {
        self.calls.add_ledger.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(Confirmation::default())
    }

    async fn ledger(&self) -> std::result::Result<LedgerSnapshot, MockError> {
        self.calls.ledger.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.ledger)
    }
}

/// A request seen by [`MockInference`].
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub endpoint: Url,
    pub model: String,
    pub prompt: String,
    pub headers: Record<String>,
}

/// Scripted inference endpoint.
#[derive(Debug)]
pub struct MockInference {
    pub response: Result<Completion>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<SeenRequest>>,
}

impl MockInference {
    pub fn answering(content: &str, correlation_id: &str) -> Self {
        MockInference {
            response: Ok(completion(content, correlation_id)),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(detail: &str) -> Self {
        MockInference {
            response: Err(Error::TransportError(detail.to_string())),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Inference for MockInference {
    async fn complete(
        &self,
        endpoint: &Url,
        model: &str,
        prompt: &str,
        headers: RequestHeaders,
    ) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(headers.is_bound_to(prompt), "headers reused for another prompt");
        self.seen.lock().unwrap().push(SeenRequest {
            endpoint: endpoint.clone(),
            model: model.to_string(),
            prompt: prompt.to_string(),
            headers: headers.into_inner(),
        });
        self.response.clone()
    }
}
