//! # Compute Kit
//!
//! Compute Kit lets a client discover inference providers on a decentralized
//! compute network, send them a prompt, and settle payment for the answer
//! through a payment broker.
//!
//! Compute Kit is **not a broker**. Wallet signing and ledger transactions
//! stay behind the [`broker::PaymentBroker`] trait. What this crate owns is the
//! orchestration around it:
//!
//! 1. **Resolve**: look up the provider's endpoint and model ([`resolver`]).
//! 2. **Authenticate**: obtain single-use request headers bound to the prompt.
//! 3. **Dispatch**: send an OpenAI-compatible chat completion ([`inference`]).
//! 4. **Settle**: verify the response and release its fee, falling back to a
//!    manual fee settlement when that fails ([`settlement`]).
//!
//! A response that was received is always returned, whatever happened to its
//! payment. [`settlement::QueryResult`] reports the content next to a
//! [`settlement::PaymentOutcome`] of `Verified`, `FallbackSettled` or
//! `Unsettled`.
//!
//! ## Core Components Overview
//!
//! - **[`broker`]**: The payment broker interface and its response types.
//! - **[`registry`]**: Listing the providers offered through the broker.
//! - **[`resolver`]**: Per-query provider metadata and request headers.
//! - **[`inference`]**: Chat completion against a provider endpoint.
//! - **[`settlement`]**: The settlement state machine and query results.
//! - **[`account`]**: Deposits, ledger funding, balance and manual fee settlement.
//! - **[`client`]**: [`client::ComputeClient`], tying the components together.
//! - **[`types`]**: Provider addresses, amounts and request headers.
//!
//! ## Integrations
//!
//! - **[`broker_client`]** (feature `http-client`): a [`broker::PaymentBroker`]
//!   that talks JSON over HTTP to a broker service.
//! - **[`gateway`]** (feature `axum`): an HTTP transport exposing the workflow.
//!
//! ## Bring Your Own Broker
//!
//! Any type implementing [`broker::PaymentBroker`] can back the workflow, which
//! is also how the workflow is tested against in-process mocks:
//!
//! ```no_run
//! use std::sync::Arc;
//! use compute_kit::{client::ComputeClient, inference::InferenceClient};
//! # use compute_kit::broker_client::RemoteBrokerClient;
//! # fn my_broker() -> RemoteBrokerClient { unimplemented!() }
//!
//! let client = ComputeClient::new(Arc::new(my_broker()), InferenceClient::new());
//! ```

pub mod account;
pub mod broker;
pub mod client;
pub mod config;
pub mod errors;
pub mod inference;
pub mod registry;
pub mod resolver;
pub mod settlement;
pub mod types;

#[cfg(feature = "http-client")]
pub mod broker_client;

#[cfg(feature = "axum")]
pub mod gateway;
