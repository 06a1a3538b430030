//! Data models for Onionoo response envelopes and shared enumerations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::documents::{BridgeDocument, RelayDocument};
use crate::timestamp;

/// Relay flags assigned by the directory authorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Flag {
    Exit,
    Guard,
    Fast,
    Stable,
    V2Dir,
    HSDir,
    Running,
    Valid,
    Authority,
    BadExit,
    NoEdConsensus,
    StaleDesc,
    Sybil,
    MiddleOnly,
}

impl Flag {
    /// Wire spelling used in query parameters and documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Exit => "Exit",
            Flag::Guard => "Guard",
            Flag::Fast => "Fast",
            Flag::Stable => "Stable",
            Flag::V2Dir => "V2Dir",
            Flag::HSDir => "HSDir",
            Flag::Running => "Running",
            Flag::Valid => "Valid",
            Flag::Authority => "Authority",
            Flag::BadExit => "BadExit",
            Flag::NoEdConsensus => "NoEdConsensus",
            Flag::StaleDesc => "StaleDesc",
            Flag::Sybil => "Sybil",
            Flag::MiddleOnly => "MiddleOnly",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restricts a query to one kind of node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Relay,
    Bridge,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Relay => "relay",
            NodeType::Bridge => "bridge",
        }
    }
}

/// Metadata shared by every response, regardless of document category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Onionoo protocol version string.
    pub version: String,
    /// UTC date when the next major protocol version is scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_major_version_scheduled: Option<NaiveDate>,
    /// Git revision of the Onionoo software that wrote the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_revision: Option<String>,
    /// When the last known relay network status consensus started being valid.
    #[serde(with = "timestamp")]
    pub relays_published: DateTime<Utc>,
    #[serde(default)]
    pub relays_skipped: u64,
    #[serde(default)]
    pub relays_truncated: u64,
    /// When the last known bridge network status was published.
    #[serde(with = "timestamp")]
    pub bridges_published: DateTime<Utc>,
    #[serde(default)]
    pub bridges_skipped: u64,
    #[serde(default)]
    pub bridges_truncated: u64,
}

/// A response as delivered by the transport: envelope plus untyped documents.
///
/// This is the form kept in the cache, so the same entry can be decoded
/// again for any request shape that maps onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub relays: Vec<Value>,
    #[serde(default)]
    pub bridges: Vec<Value>,
}

/// A decoded response. The envelope is copied verbatim from the raw form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub relays: Vec<RelayDocument>,
    pub bridges: Vec<BridgeDocument>,
}
