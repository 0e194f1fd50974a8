use super::Record;

/// Broker-issued authentication headers for exactly one inference request.
///
/// Headers are bound to the prompt text they were issued for and are redeemed by
/// value: [`RequestHeaders`] is intentionally neither `Clone` nor `Copy`, so a set of
/// headers can be attached to at most one request.
#[derive(Debug, PartialEq, Eq)]
pub struct RequestHeaders {
    headers: Record<String>,
    prompt: String,
}

impl RequestHeaders {
    pub fn new(headers: Record<String>, prompt: impl Into<String>) -> Self {
        RequestHeaders {
            headers,
            prompt: prompt.into(),
        }
    }

    /// Whether these headers were issued for `prompt`.
    pub fn is_bound_to(&self, prompt: &str) -> bool {
        self.prompt == prompt
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Consume the headers, yielding the raw name/value pairs.
    pub fn into_inner(self) -> Record<String> {
        self.headers
    }
}
