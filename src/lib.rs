//! Async client for the Onionoo API, which publishes metadata about Tor
//! relays and bridges.
//!
//! ```no_run
//! use onionoo_client::{Client, ClientConfig, Flag, QueryOptions};
//!
//! # async fn run() -> onionoo_client::Result<()> {
//! let client = Client::new(ClientConfig {
//!     enable_cache: true,
//!     ..ClientConfig::default()
//! })?;
//! let options = QueryOptions::new()
//!     .with_flag(Flag::Exit)
//!     .with_fields(["fingerprint", "exit_policy_summary"])
//!     .with_limit(10);
//! let response = client.get_details(&options).await?;
//! for relay in response.relays.iter().filter_map(|r| r.as_partial_details()) {
//!     println!("{:?}", relay.fingerprint);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod documents;
pub mod error;
pub mod exit_policy;
pub mod fetcher;
pub mod history;
pub mod models;
pub mod params;
pub mod timestamp;

pub use cache::{Cache, KeyValue, RequestContext, RequestKey};
pub use client::{Client, Outcome};
pub use codec::{Category, Shape};
pub use config::ClientConfig;
pub use documents::{
    BridgeBandwidth, BridgeClients, BridgeDetails, BridgeDocument, BridgeSummary, BridgeUptime,
    PartialBridgeDetails, PartialRelayDetails, RelayBandwidth, RelayDetails, RelayDocument,
    RelaySummary, RelayUptime, RelayWeights,
};
pub use error::{OnionooError, Result};
pub use exit_policy::ExitPolicy;
pub use fetcher::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
pub use history::{GraphHistory, IntervaledHistory};
pub use models::{Envelope, Flag, NodeType, RawResponse, Response};
pub use params::{DayRange, QueryOptions};
