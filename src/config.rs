use std::time::Duration;

use bon::Builder;
use url::Url;

use crate::types::Amount;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("`{0}` is not set")]
    MissingVar(&'static str),
    #[error("`{name}` is invalid: {reason}")]
    InvalidVar { name: &'static str, reason: String },
}

fn invalid(name: &'static str) -> impl Fn(String) -> ConfigError {
    move |reason| ConfigError::InvalidVar { name, reason }
}

/// Runtime configuration for a compute-kit deployment.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct ComputeConfig {
    /// Base URL of the payment broker service.
    pub broker_url: Url,
    /// Time allowed for a single inference call, response body included.
    #[builder(default = Duration::from_secs(60))]
    pub inference_timeout: Duration,
    /// Fallback fee used when a query does not supply one.
    pub default_fallback_fee: Option<Amount>,
    /// Port the HTTP gateway listens on.
    #[builder(default = 3000)]
    pub listen_port: u16,
}

impl ComputeConfig {
    /// Load configuration from the process environment.
    ///
    /// - `BROKER_URL` (required)
    /// - `INFERENCE_TIMEOUT_SECS` (default 60)
    /// - `FALLBACK_FEE` (optional, decimal)
    /// - `PORT` (default 3000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let broker_url = lookup("BROKER_URL").ok_or(ConfigError::MissingVar("BROKER_URL"))?;
        let broker_url = Url::parse(&broker_url)
            .map_err(|err| err.to_string())
            .map_err(invalid("BROKER_URL"))?;

        let inference_timeout = match lookup("INFERENCE_TIMEOUT_SECS") {
            Some(secs) => secs
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|err: std::num::ParseIntError| err.to_string())
                .map_err(invalid("INFERENCE_TIMEOUT_SECS"))?,
            None => Duration::from_secs(60),
        };

        let default_fallback_fee = lookup("FALLBACK_FEE")
            .filter(|fee| !fee.trim().is_empty())
            .map(|fee| fee.parse::<Amount>())
            .transpose()
            .map_err(|err| err.to_string())
            .map_err(invalid("FALLBACK_FEE"))?;

        let listen_port = match lookup("PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|err: std::num::ParseIntError| err.to_string())
                .map_err(invalid("PORT"))?,
            None => 3000,
        };

        Ok(ComputeConfig {
            broker_url,
            inference_timeout,
            default_fallback_fee,
            listen_port,
        })
    }
}
