//! Exit policy summaries.
//!
//! The API compresses a policy summary into `{"accept": [...]}` or
//! `{"reject": [...]}` where each entry is a single port ("80") or a port
//! range ("1000-1002"). Ranges are expanded half-open, so "1000-1002" yields
//! ports 1000 and 1001.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Expanded exit policy summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExitPolicy {
    pub accept: BTreeSet<u16>,
    pub reject: BTreeSet<u16>,
}

#[derive(Deserialize)]
struct RawExitPolicy {
    #[serde(default)]
    accept: Vec<String>,
    #[serde(default)]
    reject: Vec<String>,
}

impl ExitPolicy {
    /// Expands compact policy entries into a set of ports.
    pub fn expand<S: AsRef<str>>(entries: &[S]) -> Result<BTreeSet<u16>, String> {
        let mut ports = BTreeSet::new();
        for entry in entries {
            let entry = entry.as_ref();
            let chunks = entry
                .split('-')
                .filter(|chunk| !chunk.is_empty())
                .map(|chunk| {
                    chunk
                        .parse::<u16>()
                        .map_err(|e| format!("invalid port {chunk:?} in {entry:?}: {e}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            match chunks.as_slice() {
                [port] => {
                    ports.insert(*port);
                }
                [low, high] => ports.extend(*low..*high),
                _ => return Err(format!("malformed port range {entry:?}")),
            }
        }
        Ok(ports)
    }

    pub fn accepts(&self, port: u16) -> bool {
        self.accept.contains(&port)
    }

    pub fn rejects(&self, port: u16) -> bool {
        self.reject.contains(&port)
    }

    pub fn is_empty(&self) -> bool {
        self.accept.is_empty() && self.reject.is_empty()
    }
}

impl<'de> Deserialize<'de> for ExitPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawExitPolicy::deserialize(deserializer)?;
        Ok(ExitPolicy {
            accept: Self::expand(&raw.accept).map_err(serde::de::Error::custom)?,
            reject: Self::expand(&raw.reject).map_err(serde::de::Error::custom)?,
        })
    }
}
