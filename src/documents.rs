//! Relay and bridge documents, one type per document category.
//!
//! Details documents come in two shapes. The complete shape is used when
//! every field was requested and has its identifying fields as required
//! attributes; the partial shape is used when the caller asked for an
//! explicit field subset and makes every attribute optional.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::exit_policy::ExitPolicy;
use crate::history::IntervaledHistory;
use crate::models::Flag;
use crate::timestamp;

/// A document that can be built from one element of a response's
/// `relays` or `bridges` array.
pub trait Document: Sized {
    fn decode(raw: &Value) -> Result<Self, serde_json::Error>;
}

impl<T: DeserializeOwned> Document for T {
    fn decode(raw: &Value) -> Result<Self, serde_json::Error> {
        T::deserialize(raw)
    }
}

// ---------------------------------------------------------------------------
// summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaySummary {
    #[serde(rename = "n")]
    pub nickname: String,
    #[serde(rename = "f")]
    pub fingerprint: String,
    #[serde(rename = "a")]
    pub addresses: Vec<String>,
    #[serde(rename = "r")]
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSummary {
    #[serde(rename = "n")]
    pub nickname: String,
    #[serde(rename = "h")]
    pub hashed_fingerprint: String,
    #[serde(rename = "r")]
    pub running: bool,
}

// ---------------------------------------------------------------------------
// details
// ---------------------------------------------------------------------------

/// Attributes of a relay details document that the API may omit even when
/// all fields were requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayDetailsExtra {
    pub exit_addresses: Option<Vec<String>>,
    pub dir_address: Option<String>,
    pub hibernating: Option<bool>,
    pub flags: Option<Vec<Flag>>,
    pub country: Option<String>,
    pub country_name: Option<String>,
    pub region_name: Option<String>,
    pub city_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "as")]
    pub as_number: Option<String>,
    pub as_name: Option<String>,
    pub verified_host_names: Option<Vec<String>>,
    pub unverified_host_names: Option<Vec<String>>,
    #[serde(default, with = "timestamp::option")]
    pub last_restarted: Option<DateTime<Utc>>,
    pub bandwidth_rate: Option<u64>,
    pub bandwidth_burst: Option<u64>,
    pub observed_bandwidth: Option<u64>,
    pub advertised_bandwidth: Option<u64>,
    pub exit_policy: Option<Vec<String>>,
    pub exit_policy_summary: Option<ExitPolicy>,
    pub exit_policy_v6_summary: Option<ExitPolicy>,
    pub contact: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub recommended_version: Option<bool>,
    pub version_status: Option<String>,
    pub effective_family: Option<Vec<String>>,
    pub alleged_family: Option<Vec<String>>,
    pub indirect_family: Option<Vec<String>>,
    pub consensus_weight_fraction: Option<f64>,
    pub guard_probability: Option<f64>,
    pub middle_probability: Option<f64>,
    pub exit_probability: Option<f64>,
    pub measured: Option<bool>,
    pub unreachable_or_addresses: Option<Vec<String>>,
}

/// Relay details document, all fields requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayDetails {
    pub nickname: String,
    pub fingerprint: String,
    pub or_addresses: Vec<String>,
    #[serde(with = "timestamp")]
    pub last_seen: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub last_changed_address_or_port: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub first_seen: DateTime<Utc>,
    pub running: bool,
    pub consensus_weight: u64,
    #[serde(flatten)]
    pub extra: RelayDetailsExtra,
}

/// Relay details document restricted to a requested field subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialRelayDetails {
    pub nickname: Option<String>,
    pub fingerprint: Option<String>,
    pub or_addresses: Option<Vec<String>>,
    #[serde(default, with = "timestamp::option")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub last_changed_address_or_port: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub first_seen: Option<DateTime<Utc>>,
    pub running: Option<bool>,
    pub consensus_weight: Option<u64>,
    #[serde(flatten)]
    pub extra: RelayDetailsExtra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeDetailsExtra {
    pub flags: Option<Vec<Flag>>,
    #[serde(default, with = "timestamp::option")]
    pub last_restarted: Option<DateTime<Utc>>,
    pub advertised_bandwidth: Option<u64>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub recommended_version: Option<bool>,
    pub version_status: Option<String>,
    pub transports: Option<Vec<String>>,
    pub bridgedb_distributor: Option<String>,
}

/// Bridge details document, all fields requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeDetails {
    pub nickname: String,
    pub hashed_fingerprint: String,
    pub or_addresses: Vec<String>,
    #[serde(with = "timestamp")]
    pub last_seen: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub first_seen: DateTime<Utc>,
    pub running: bool,
    #[serde(flatten)]
    pub extra: BridgeDetailsExtra,
}

/// Bridge details document restricted to a requested field subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialBridgeDetails {
    pub nickname: Option<String>,
    pub hashed_fingerprint: Option<String>,
    pub or_addresses: Option<Vec<String>>,
    #[serde(default, with = "timestamp::option")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub first_seen: Option<DateTime<Utc>>,
    pub running: Option<bool>,
    #[serde(flatten)]
    pub extra: BridgeDetailsExtra,
}

// ---------------------------------------------------------------------------
// histories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayBandwidth {
    pub fingerprint: String,
    #[serde(default)]
    pub write_history: Option<IntervaledHistory>,
    #[serde(default)]
    pub read_history: Option<IntervaledHistory>,
}

/// Bridge bandwidth document. `fingerprint` is the hashed fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeBandwidth {
    pub fingerprint: String,
    #[serde(default)]
    pub write_history: Option<IntervaledHistory>,
    #[serde(default)]
    pub read_history: Option<IntervaledHistory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayWeights {
    pub fingerprint: String,
    #[serde(default)]
    pub consensus_weight_fraction: Option<IntervaledHistory>,
    #[serde(default)]
    pub guard_probability: Option<IntervaledHistory>,
    #[serde(default)]
    pub middle_probability: Option<IntervaledHistory>,
    #[serde(default)]
    pub exit_probability: Option<IntervaledHistory>,
    #[serde(default)]
    pub consensus_weight: Option<IntervaledHistory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeClients {
    pub fingerprint: String,
    #[serde(default)]
    pub average_clients: Option<IntervaledHistory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayUptime {
    pub fingerprint: String,
    #[serde(default)]
    pub uptime: Option<IntervaledHistory>,
    /// Per-flag uptime histories.
    #[serde(default)]
    pub flags: Option<BTreeMap<Flag, IntervaledHistory>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeUptime {
    pub fingerprint: String,
    #[serde(default)]
    pub uptime: Option<IntervaledHistory>,
}

// ---------------------------------------------------------------------------
// sum types
// ---------------------------------------------------------------------------

/// Any decoded relay document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelayDocument {
    Summary(RelaySummary),
    Details(Box<RelayDetails>),
    PartialDetails(Box<PartialRelayDetails>),
    Bandwidth(RelayBandwidth),
    Weights(RelayWeights),
    Uptime(RelayUptime),
    /// No relay document exists for the requested category.
    Undecoded(Value),
}

/// Any decoded bridge document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BridgeDocument {
    Summary(BridgeSummary),
    Details(Box<BridgeDetails>),
    PartialDetails(Box<PartialBridgeDetails>),
    Bandwidth(BridgeBandwidth),
    Clients(BridgeClients),
    Uptime(BridgeUptime),
    /// No bridge document exists for the requested category.
    Undecoded(Value),
}

macro_rules! accessor {
    ($enum:ident, $fn:ident, $variant:ident, $ty:ty) => {
        impl $enum {
            pub fn $fn(&self) -> Option<&$ty> {
                match self {
                    $enum::$variant(doc) => {
                        let doc: &$ty = doc;
                        Some(doc)
                    }
                    _ => None,
                }
            }
        }
    };
}

accessor!(RelayDocument, as_summary, Summary, RelaySummary);
accessor!(RelayDocument, as_details, Details, RelayDetails);
accessor!(RelayDocument, as_partial_details, PartialDetails, PartialRelayDetails);
accessor!(RelayDocument, as_bandwidth, Bandwidth, RelayBandwidth);
accessor!(RelayDocument, as_weights, Weights, RelayWeights);
accessor!(RelayDocument, as_uptime, Uptime, RelayUptime);
accessor!(BridgeDocument, as_summary, Summary, BridgeSummary);
accessor!(BridgeDocument, as_details, Details, BridgeDetails);
accessor!(BridgeDocument, as_partial_details, PartialDetails, PartialBridgeDetails);
accessor!(BridgeDocument, as_bandwidth, Bandwidth, BridgeBandwidth);
accessor!(BridgeDocument, as_clients, Clients, BridgeClients);
accessor!(BridgeDocument, as_uptime, Uptime, BridgeUptime);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn relay_details_json() -> Value {
        json!({
            "nickname": "moria1",
            "fingerprint": "9695DFC35FFEB861329B9F1AB04C46397020CE31",
            "or_addresses": ["128.31.0.34:9101"],
            "last_seen": "2020-05-17 09:00:00",
            "last_changed_address_or_port": "2019-12-01 00:00:00",
            "first_seen": "2011-08-18 12:00:00",
            "running": true,
            "consensus_weight": 20,
            "flags": ["Authority", "Running", "V2Dir", "Valid"],
            "as": "AS3",
            "last_restarted": "2020-05-10 04:12:40",
            "exit_policy_summary": {"reject": ["1-65535"]},
            "guard_probability": 0.0,
            "measured": true
        })
    }

    #[test]
    fn test_relay_summary_short_keys() {
        let summary = RelaySummary::decode(&json!({
            "n": "moria1",
            "f": "9695DFC35FFEB861329B9F1AB04C46397020CE31",
            "a": ["128.31.0.34"],
            "r": true
        }))
        .unwrap();
        assert_eq!(summary.nickname, "moria1");
        assert_eq!(summary.addresses, vec!["128.31.0.34"]);
        assert!(summary.running);
    }

    #[test]
    fn test_bridge_summary_uses_hashed_fingerprint() {
        let summary = BridgeSummary::decode(&json!({
            "n": "Unnamed",
            "h": "0000B5ADE0BCDBDD5A2FC3EF01BF7A2E4DF4FBB5",
            "r": false
        }))
        .unwrap();
        assert_eq!(summary.hashed_fingerprint, "0000B5ADE0BCDBDD5A2FC3EF01BF7A2E4DF4FBB5");
        assert!(!summary.running);
    }

    #[test]
    fn test_relay_details_complete() {
        let details = RelayDetails::decode(&relay_details_json()).unwrap();
        assert_eq!(details.consensus_weight, 20);
        assert_eq!(details.extra.as_number.as_deref(), Some("AS3"));
        assert_eq!(details.extra.flags.as_ref().map(Vec::len), Some(4));
        assert!(details.extra.last_restarted.is_some());
        let policy = details.extra.exit_policy_summary.unwrap();
        assert!(policy.accept.is_empty());
        assert_eq!(policy.reject.len(), 65534);
        assert_eq!(details.extra.exit_policy_v6_summary, None);
    }

    #[test]
    fn test_relay_details_missing_required_field_fails() {
        let mut raw = relay_details_json();
        raw.as_object_mut().unwrap().remove("first_seen");
        assert!(RelayDetails::decode(&raw).is_err());
    }

    #[test]
    fn test_partial_relay_details_leaves_absent_fields_unset() {
        let partial = PartialRelayDetails::decode(&json!({
            "fingerprint": "9695DFC35FFEB861329B9F1AB04C46397020CE31",
            "running": true
        }))
        .unwrap();
        assert_eq!(
            partial.fingerprint.as_deref(),
            Some("9695DFC35FFEB861329B9F1AB04C46397020CE31")
        );
        assert_eq!(partial.running, Some(true));
        assert_eq!(partial.nickname, None);
        assert_eq!(partial.first_seen, None);
        assert_eq!(partial.extra, RelayDetailsExtra::default());
    }

    #[test]
    fn test_partial_bridge_details_decodes_last_restarted() {
        let partial = PartialBridgeDetails::decode(&json!({
            "hashed_fingerprint": "0000B5ADE0BCDBDD5A2FC3EF01BF7A2E4DF4FBB5",
            "last_restarted": "2020-05-10 04:12:40"
        }))
        .unwrap();
        assert!(partial.extra.last_restarted.is_some());
        assert_eq!(partial.last_seen, None);
    }

    #[test]
    fn test_relay_uptime_maps_flag_keys() {
        let history = json!({
            "1_week": {
                "first": "2020-05-10 10:00:00",
                "last": "2020-05-17 08:00:00",
                "interval": 3600,
                "factor": 0.001001001001001001,
                "count": 2,
                "values": [999, 999]
            }
        });
        let uptime = RelayUptime::decode(&json!({
            "fingerprint": "9695DFC35FFEB861329B9F1AB04C46397020CE31",
            "uptime": history,
            "flags": {"Running": history, "Guard": history}
        }))
        .unwrap();
        let flags = uptime.flags.unwrap();
        assert!(flags.contains_key(&Flag::Running));
        assert!(flags.contains_key(&Flag::Guard));
        assert_eq!(flags[&Flag::Guard]["1_week"].interval, 3600);
    }

    #[test]
    fn test_relay_uptime_unknown_flag_fails() {
        let result = RelayUptime::decode(&json!({
            "fingerprint": "9695DFC35FFEB861329B9F1AB04C46397020CE31",
            "flags": {"Wizard": {}}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_bandwidth_without_histories() {
        let bandwidth = RelayBandwidth::decode(&json!({
            "fingerprint": "9695DFC35FFEB861329B9F1AB04C46397020CE31"
        }))
        .unwrap();
        assert_eq!(bandwidth.read_history, None);
        assert_eq!(bandwidth.write_history, None);
    }

    #[test]
    fn test_accessors_match_variant() {
        let doc = RelayDocument::Undecoded(json!({}));
        assert!(doc.as_summary().is_none());
        let doc = BridgeDocument::Clients(BridgeClients {
            fingerprint: "ABCD".into(),
            average_clients: None,
        });
        assert_eq!(doc.as_clients().map(|c| c.fingerprint.as_str()), Some("ABCD"));
        assert!(doc.as_uptime().is_none());
    }
}
