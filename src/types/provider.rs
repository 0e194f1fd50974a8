use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{errors::Error, types::Amount};

/// On-chain address of an inference provider.
///
/// Parsing accepts a `0x`-prefixed, 20-byte hex address; anything else is an
/// [`Error::InvalidAddressError`]. Shorthand such as `0xAAA` is rejected, so
/// tests spell provider addresses out in full (`0x…0aaa`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderAddress(pub alloy_primitives::Address);

impl ProviderAddress {
    pub fn parse(s: &str) -> Result<Self, Error> {
        s.parse()
    }
}

impl From<alloy_primitives::Address> for ProviderAddress {
    fn from(addr: alloy_primitives::Address) -> Self {
        ProviderAddress(addr)
    }
}

impl FromStr for ProviderAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !trimmed.starts_with("0x") && !trimmed.starts_with("0X") {
            return Err(Error::invalid_address(s, "missing 0x prefix"));
        }
        alloy_primitives::Address::from_str(trimmed)
            .map(ProviderAddress)
            .map_err(|err| Error::invalid_address(s, err))
    }
}

impl Display for ProviderAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for ProviderAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProviderAddress({})", self.0)
    }
}

impl Serialize for ProviderAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProviderAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ProviderAddress::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A provider as listed by the broker's service registry.
///
/// This is a snapshot; it is never cached, every query re-resolves the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub address: ProviderAddress,
    pub model: String,
    pub endpoint: Url,
    pub service_type: String,
    /// Price per input token, if the registry reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_price: Option<Amount>,
    /// Price per output token, if the registry reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_price: Option<Amount>,
    /// Verification scheme the provider advertises, e.g. `TeeML`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifiability: Option<String>,
}

/// Where and how to reach a provider for a single query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub endpoint: Url,
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_address() {
        let addr = ProviderAddress::parse("0x3cb9b3bbfde8501f411bb69ad3dc07908ed0de20").unwrap();
        assert_eq!(
            addr.to_string().to_lowercase(),
            "0x3cb9b3bbfde8501f411bb69ad3dc07908ed0de20"
        );
    }

    #[test]
    fn test_short_address_must_be_spelled_out() {
        assert!(ProviderAddress::parse("0xAAA").is_err());

        let full = ProviderAddress::parse("0x0000000000000000000000000000000000000aaa").unwrap();
        assert_eq!(
            full,
            ProviderAddress::parse("0x0000000000000000000000000000000000000AAA").unwrap()
        );
    }

    #[test]
    fn test_reject_malformed_provider_address() {
        for input in [
            "",
            "0xAAA",
            "3cb9b3bbfde8501f411bb69ad3dc07908ed0de20",
            "0xzzb9b3bbfde8501f411bb69ad3dc07908ed0de20",
            "provider-1",
        ] {
            let err = ProviderAddress::parse(input).unwrap_err();
            assert!(
                matches!(err, Error::InvalidAddressError { .. }),
                "{input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_provider_deserializes_from_registry_json() {
        let provider: Provider = serde_json::from_value(serde_json::json!({
            "address": "0x3cb9b3bbfde8501f411bb69ad3dc07908ed0de20",
            "model": "llama-3.3-70b-instruct",
            "endpoint": "https://provider.example.com/v1/proxy",
            "serviceType": "chatbot",
            "inputPrice": "0.000001",
        }))
        .unwrap();

        assert_eq!(provider.service_type, "chatbot");
        assert_eq!(provider.input_price, Some("0.000001".parse::<Amount>().unwrap()));
        assert_eq!(provider.output_price, None);
    }
}
