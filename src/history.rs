//! Normalised time-series histories carried by the bandwidth, weights,
//! clients and uptime documents.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::timestamp;

/// One history graph, e.g. the "1_month" read history of a relay.
///
/// `values` arrive normalised to the range 0..=999 (or null where no data
/// was available). Multiply by `factor` to obtain the original values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphHistory {
    #[serde(with = "timestamp")]
    pub first: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub last: DateTime<Utc>,
    /// Seconds between two data points.
    pub interval: u64,
    pub factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    pub values: Vec<Option<f64>>,
}

impl GraphHistory {
    /// Multiplies every value by `factor`, in place.
    ///
    /// Not idempotent: calling this twice scales the values twice. Use
    /// [`GraphHistory::denormalised`] when the original must stay intact.
    pub fn denormalise(&mut self) {
        let factor = self.factor;
        for value in self.values.iter_mut().flatten() {
            *value *= factor;
        }
    }

    /// Denormalised copy of the values.
    pub fn denormalised(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|value| value.map(|v| v * self.factor))
            .collect()
    }

    /// Timestamps of the data points: `first`, `first + interval`, ... up to `last`.
    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        let step = Duration::seconds(self.interval as i64);
        std::iter::successors(Some(self.first), move |current| {
            if step.is_zero() {
                return None;
            }
            Some(*current + step)
        })
        .take_while(move |ts| *ts <= self.last)
    }
}

/// Histories keyed by their period label ("1_week", "1_month", ...).
pub type IntervaledHistory = BTreeMap<String, GraphHistory>;
