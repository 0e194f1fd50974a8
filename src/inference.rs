//! OpenAI-compatible chat completion against a provider endpoint.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{errors::Result, types::RequestHeaders};

/// A completed inference response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Text of the first choice. `None` if the provider returned no content.
    pub content: Option<String>,
    /// Provider-assigned response identifier, needed to settle payment.
    pub correlation_id: String,
}

/// Sends a single prompt to a provider and returns its completion.
///
/// Implementations must not retry; failures surface as
/// [`Error::TransportError`](crate::errors::Error::TransportError) and retry
/// policy is left to the caller.
pub trait Inference: Send + Sync {
    fn complete(
        &self,
        endpoint: &Url,
        model: &str,
        prompt: &str,
        headers: RequestHeaders,
    ) -> impl Future<Output = Result<Completion>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatCompletionRequest {
    /// A request carrying exactly one user message.
    pub fn user_prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        ChatCompletionRequest {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl From<ChatCompletionResponse> for Completion {
    fn from(response: ChatCompletionResponse) -> Self {
        Completion {
            content: response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content),
            correlation_id: response.id,
        }
    }
}

/// The chat completion URL for a provider endpoint.
///
/// Appends `chat/completions` unless the endpoint already points at it.
pub fn completions_url(endpoint: &Url) -> Url {
    let path = endpoint.path().trim_end_matches('/');
    if path.ends_with("/chat/completions") {
        return endpoint.clone();
    }
    let mut url = endpoint.clone();
    url.set_path(&format!("{path}/chat/completions"));
    url
}

#[cfg(feature = "http-client")]
pub use client::InferenceClient;

#[cfg(feature = "http-client")]
mod client {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
    use url::Url;

    use super::{
        ChatCompletionRequest, ChatCompletionResponse, Completion, Inference, completions_url,
    };
    use crate::{
        errors::{Error, Result},
        types::RequestHeaders,
    };

    /// HTTP inference client.
    #[derive(Debug, Clone, Default)]
    pub struct InferenceClient {
        pub client: reqwest::Client,
    }

    impl InferenceClient {
        pub fn new() -> Self {
            InferenceClient::default()
        }

        /// A client whose requests fail with a transport error after `timeout`.
        pub fn with_timeout(timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| {
                    Error::TransportError(format!("Failed to build HTTP client: {err}"))
                })?;
            Ok(InferenceClient { client })
        }
    }

    fn header_map(headers: RequestHeaders) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in headers.into_inner() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                Error::AuthenticationFailedError(format!(
                    "Broker issued invalid header name '{name}': {err}"
                ))
            })?;
            let value = HeaderValue::from_str(&value).map_err(|err| {
                Error::AuthenticationFailedError(format!(
                    "Broker issued invalid value for header '{}': {err}",
                    name.as_str()
                ))
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    impl Inference for InferenceClient {
        async fn complete(
            &self,
            endpoint: &Url,
            model: &str,
            prompt: &str,
            headers: RequestHeaders,
        ) -> Result<Completion> {
            if !headers.is_bound_to(prompt) {
                return Err(Error::AuthenticationFailedError(
                    "request headers were issued for a different prompt".to_string(),
                ));
            }
            let headers = header_map(headers)?;
            let url = completions_url(endpoint);

            #[cfg(feature = "tracing")]
            tracing::debug!("Sending chat completion: url='{}', model='{}'", url, model);

            let response = self
                .client
                .post(url)
                .headers(headers)
                .json(&ChatCompletionRequest::user_prompt(model, prompt))
                .send()
                .await
                .map_err(|err| Error::TransportError(format!("Request failed: {err}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::TransportError(format!(
                    "Provider responded with {status}: {body}"
                )));
            }

            let completion = response
                .json::<ChatCompletionResponse>()
                .await
                .map_err(|err| Error::TransportError(format!("Malformed completion: {err}")))?;

            Ok(completion.into())
        }
    }
}
