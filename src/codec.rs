//! Picks the document variant for a response and decodes it.
//!
//! Selection is a single table keyed on (category, shape). Each element of
//! the raw `relays` and `bridges` arrays is decoded independently and in
//! order; the first failure aborts decoding with the offending fragment.

use serde_json::Value;

use crate::documents::{
    BridgeBandwidth, BridgeClients, BridgeDetails, BridgeDocument, BridgeSummary, BridgeUptime,
    Document, PartialBridgeDetails, PartialRelayDetails, RelayBandwidth, RelayDetails,
    RelayDocument, RelaySummary, RelayUptime, RelayWeights,
};
use crate::error::{OnionooError, Result, Side};
use crate::models::{RawResponse, Response};

/// Onionoo document categories, one per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Summary,
    Details,
    Bandwidth,
    Weights,
    Clients,
    Uptime,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Summary,
        Category::Details,
        Category::Bandwidth,
        Category::Weights,
        Category::Clients,
        Category::Uptime,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Summary => "summary",
            Category::Details => "details",
            Category::Bandwidth => "bandwidth",
            Category::Weights => "weights",
            Category::Clients => "clients",
            Category::Uptime => "uptime",
        }
    }

    /// Endpoint path appended to the base URL.
    pub fn path(self) -> &'static str {
        match self {
            Category::Summary => "/summary",
            Category::Details => "/details",
            Category::Bandwidth => "/bandwidth",
            Category::Weights => "/weights",
            Category::Clients => "/clients",
            Category::Uptime => "/uptime",
        }
    }
}

/// Whether the request asked for every field or an explicit subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Complete,
    Partial,
}

impl Shape {
    pub fn from_fields(fields: Option<&[String]>) -> Self {
        match fields {
            Some(_) => Shape::Partial,
            None => Shape::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayVariant {
    Summary,
    Details,
    PartialDetails,
    Bandwidth,
    Weights,
    Uptime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeVariant {
    Summary,
    Details,
    PartialDetails,
    Bandwidth,
    Clients,
    Uptime,
}

/// Variant table. `None` means the category has no document on that side.
pub fn select(category: Category, shape: Shape) -> (Option<RelayVariant>, Option<BridgeVariant>) {
    use Category as C;
    match (category, shape) {
        (C::Summary, _) => (Some(RelayVariant::Summary), Some(BridgeVariant::Summary)),
        (C::Details, Shape::Complete) => (Some(RelayVariant::Details), Some(BridgeVariant::Details)),
        (C::Details, Shape::Partial) => (
            Some(RelayVariant::PartialDetails),
            Some(BridgeVariant::PartialDetails),
        ),
        (C::Bandwidth, _) => (Some(RelayVariant::Bandwidth), Some(BridgeVariant::Bandwidth)),
        (C::Weights, _) => (Some(RelayVariant::Weights), None),
        (C::Clients, _) => (None, Some(BridgeVariant::Clients)),
        (C::Uptime, _) => (Some(RelayVariant::Uptime), Some(BridgeVariant::Uptime)),
    }
}

impl RelayVariant {
    pub fn decode(self, raw: &Value) -> std::result::Result<RelayDocument, serde_json::Error> {
        Ok(match self {
            RelayVariant::Summary => RelayDocument::Summary(RelaySummary::decode(raw)?),
            RelayVariant::Details => RelayDocument::Details(Box::new(RelayDetails::decode(raw)?)),
            RelayVariant::PartialDetails => {
                RelayDocument::PartialDetails(Box::new(PartialRelayDetails::decode(raw)?))
            }
            RelayVariant::Bandwidth => RelayDocument::Bandwidth(RelayBandwidth::decode(raw)?),
            RelayVariant::Weights => RelayDocument::Weights(RelayWeights::decode(raw)?),
            RelayVariant::Uptime => RelayDocument::Uptime(RelayUptime::decode(raw)?),
        })
    }
}

impl BridgeVariant {
    pub fn decode(self, raw: &Value) -> std::result::Result<BridgeDocument, serde_json::Error> {
        Ok(match self {
            BridgeVariant::Summary => BridgeDocument::Summary(BridgeSummary::decode(raw)?),
            BridgeVariant::Details => BridgeDocument::Details(Box::new(BridgeDetails::decode(raw)?)),
            BridgeVariant::PartialDetails => {
                BridgeDocument::PartialDetails(Box::new(PartialBridgeDetails::decode(raw)?))
            }
            BridgeVariant::Bandwidth => BridgeDocument::Bandwidth(BridgeBandwidth::decode(raw)?),
            BridgeVariant::Clients => BridgeDocument::Clients(BridgeClients::decode(raw)?),
            BridgeVariant::Uptime => BridgeDocument::Uptime(BridgeUptime::decode(raw)?),
        })
    }
}

fn decode_side<V: Copy, D>(
    side: Side,
    raw: &[Value],
    variant: Option<V>,
    decode: fn(V, &Value) -> std::result::Result<D, serde_json::Error>,
    undecoded: fn(Value) -> D,
) -> Result<Vec<D>> {
    let Some(variant) = variant else {
        return Ok(raw.iter().cloned().map(undecoded).collect());
    };
    raw.iter()
        .enumerate()
        .map(|(index, element)| {
            decode(variant, element).map_err(|e| OnionooError::decode(side, index, element, e))
        })
        .collect()
}

/// Decodes a raw response into typed documents for `category` and `shape`.
pub fn decode_response(raw: &RawResponse, category: Category, shape: Shape) -> Result<Response> {
    let (relay, bridge) = select(category, shape);
    let relays = decode_side(
        Side::Relay,
        &raw.relays,
        relay,
        RelayVariant::decode,
        RelayDocument::Undecoded,
    )?;
    let bridges = decode_side(
        Side::Bridge,
        &raw.bridges,
        bridge,
        BridgeVariant::decode,
        BridgeDocument::Undecoded,
    )?;
    Ok(Response {
        envelope: raw.envelope.clone(),
        relays,
        bridges,
    })
}
