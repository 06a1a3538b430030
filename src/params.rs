//! Typed query options and their per-endpoint restrictions.

use itertools::Itertools;
use std::fmt;
use std::str::FromStr;

use crate::codec::Category;
use crate::error::{OnionooError, Result};
use crate::models::{Flag, NodeType};

/// Every query parameter the API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryParam {
    Type,
    Running,
    Lookup,
    Country,
    As,
    AsName,
    Flag,
    FirstSeenDays,
    LastSeenDays,
    Contact,
    Family,
    Version,
    Os,
    HostName,
    RecommendedVersion,
    Fields,
    Order,
    Offset,
    Limit,
}

impl QueryParam {
    /// Query-string name of the parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryParam::Type => "type",
            QueryParam::Running => "running",
            QueryParam::Lookup => "lookup",
            QueryParam::Country => "country",
            QueryParam::As => "as",
            QueryParam::AsName => "as_name",
            QueryParam::Flag => "flag",
            QueryParam::FirstSeenDays => "first_seen_days",
            QueryParam::LastSeenDays => "last_seen_days",
            QueryParam::Contact => "contact",
            QueryParam::Family => "family",
            QueryParam::Version => "version",
            QueryParam::Os => "os",
            QueryParam::HostName => "host_name",
            QueryParam::RecommendedVersion => "recommended_version",
            QueryParam::Fields => "fields",
            QueryParam::Order => "order",
            QueryParam::Offset => "offset",
            QueryParam::Limit => "limit",
        }
    }
}

/// Options rejected outright by each endpoint.
pub fn disallowed(category: Category) -> &'static [QueryParam] {
    use QueryParam as P;
    match category {
        Category::Details => &[],
        Category::Summary | Category::Bandwidth | Category::Weights | Category::Uptime => &[P::Fields],
        Category::Clients => &[
            P::Fields,
            P::HostName,
            P::Country,
            P::Family,
            P::Flag,
            P::Contact,
        ],
    }
}

/// Range of days for `first_seen_days` / `last_seen_days`.
///
/// Renders as "x-y", "x-" (open ended), "-y" (from zero) or "x" (exactly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    from: Option<u32>,
    to: Option<u32>,
}

impl DayRange {
    pub fn new(from: Option<u32>, to: Option<u32>) -> Result<Self> {
        match (from, to) {
            (None, None) => Err(invalid("day range", "at least one bound is required")),
            (Some(x), Some(y)) if x > y => Err(invalid(
                "day range",
                format!("lower bound {x} is above upper bound {y}"),
            )),
            _ => Ok(Self { from, to }),
        }
    }

    pub fn exactly(days: u32) -> Self {
        Self {
            from: Some(days),
            to: Some(days),
        }
    }

    pub fn at_least(days: u32) -> Self {
        Self {
            from: Some(days),
            to: None,
        }
    }

    pub fn at_most(days: u32) -> Self {
        Self {
            from: None,
            to: Some(days),
        }
    }
}

impl fmt::Display for DayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.from, self.to) {
            (Some(x), Some(y)) if x == y => write!(f, "{x}"),
            (Some(x), Some(y)) => write!(f, "{x}-{y}"),
            (Some(x), None) => write!(f, "{x}-"),
            (None, Some(y)) => write!(f, "-{y}"),
            (None, None) => Ok(()),
        }
    }
}

impl FromStr for DayRange {
    type Err = OnionooError;

    fn from_str(s: &str) -> Result<Self> {
        let bound = |part: &str| -> Result<Option<u32>> {
            if part.is_empty() {
                return Ok(None);
            }
            part.parse::<u32>()
                .map(Some)
                .map_err(|e| invalid("day range", format!("{s:?}: {e}")))
        };
        match s.split_once('-') {
            Some((from, to)) => DayRange::new(bound(from)?, bound(to)?),
            None => bound(s)?
                .map(DayRange::exactly)
                .ok_or_else(|| invalid("day range", "empty range")),
        }
    }
}

/// Filter, ordering and pagination options for a request.
///
/// Unset options are not sent. Which options an endpoint accepts is
/// checked when the options are encoded for that endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub node_type: Option<NodeType>,
    pub running: Option<bool>,
    /// Fingerprint of a relay or hashed fingerprint of a bridge.
    pub lookup: Option<String>,
    /// Two-letter country code, or "xz" for addresses missing from GeoIP.
    pub country: Option<String>,
    /// AS numbers, with or without the "AS" prefix.
    pub as_numbers: Option<Vec<String>>,
    pub as_name: Option<String>,
    pub flag: Option<Flag>,
    pub first_seen_days: Option<DayRange>,
    pub last_seen_days: Option<DayRange>,
    pub contact: Option<String>,
    pub family: Option<String>,
    /// Version list or range, e.g. "0.4.2,0.4.3" or "0.4.1..0.4.3".
    pub version: Option<String>,
    pub os: Option<String>,
    pub host_name: Option<String>,
    pub recommended_version: Option<bool>,
    /// Explicit field subset. Details endpoint only.
    pub fields: Option<Vec<String>>,
    /// Ordering fields, prefix with "-" for descending order.
    pub order: Option<Vec<String>>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn with_running(mut self, running: bool) -> Self {
        self.running = Some(running);
        self
    }

    pub fn with_lookup(mut self, fingerprint: impl Into<String>) -> Self {
        self.lookup = Some(fingerprint.into());
        self
    }

    pub fn with_country(mut self, code: impl Into<String>) -> Self {
        self.country = Some(code.into());
        self
    }

    pub fn with_as_numbers<I, S>(mut self, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.as_numbers = Some(numbers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_as_name(mut self, name: impl Into<String>) -> Self {
        self.as_name = Some(name.into());
        self
    }

    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flag = Some(flag);
        self
    }

    pub fn with_first_seen_days(mut self, range: DayRange) -> Self {
        self.first_seen_days = Some(range);
        self
    }

    pub fn with_last_seen_days(mut self, range: DayRange) -> Self {
        self.last_seen_days = Some(range);
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_family(mut self, fingerprint: impl Into<String>) -> Self {
        self.family = Some(fingerprint.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }

    pub fn with_recommended_version(mut self, recommended: bool) -> Self {
        self.recommended_version = Some(recommended);
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parameters that are set, in wire order.
    pub fn present(&self) -> Vec<QueryParam> {
        use QueryParam as P;
        [
            (P::Type, self.node_type.is_some()),
            (P::Running, self.running.is_some()),
            (P::Lookup, self.lookup.is_some()),
            (P::Country, self.country.is_some()),
            (P::As, self.as_numbers.is_some()),
            (P::AsName, self.as_name.is_some()),
            (P::Flag, self.flag.is_some()),
            (P::FirstSeenDays, self.first_seen_days.is_some()),
            (P::LastSeenDays, self.last_seen_days.is_some()),
            (P::Contact, self.contact.is_some()),
            (P::Family, self.family.is_some()),
            (P::Version, self.version.is_some()),
            (P::Os, self.os.is_some()),
            (P::HostName, self.host_name.is_some()),
            (P::RecommendedVersion, self.recommended_version.is_some()),
            (P::Fields, self.fields.is_some()),
            (P::Order, self.order.is_some()),
            (P::Offset, self.offset.is_some()),
            (P::Limit, self.limit.is_some()),
        ]
        .into_iter()
        .filter_map(|(param, set)| set.then_some(param))
        .collect()
    }

    fn validate(&self) -> Result<()> {
        if let Some(country) = &self.country {
            if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(invalid("country", format!("{country:?} is not a two-letter code")));
            }
        }
        for (name, fingerprint) in [("lookup", &self.lookup), ("family", &self.family)] {
            if let Some(fp) = fingerprint {
                if fp.len() != 40 || !fp.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid(name, format!("{fp:?} is not a 40 character hex fingerprint")));
                }
            }
        }
        for (name, list) in [
            ("as", &self.as_numbers),
            ("fields", &self.fields),
            ("order", &self.order),
        ] {
            if let Some(list) = list {
                if list.is_empty() || list.iter().any(|item| item.trim_start_matches('-').is_empty()) {
                    return Err(invalid(name, "list must not be empty or contain empty entries"));
                }
            }
        }
        Ok(())
    }

    /// Encodes the options as query parameters for `category`.
    ///
    /// Fails if an option the endpoint does not accept is set, or if an
    /// option value is malformed.
    pub fn to_params(&self, category: Category) -> Result<Vec<(String, String)>> {
        let denied = disallowed(category);
        let offending: Vec<&'static str> = self
            .present()
            .into_iter()
            .filter(|param| denied.contains(param))
            .map(QueryParam::as_str)
            .collect();
        if !offending.is_empty() {
            return Err(OnionooError::DisallowedOptions {
                endpoint: category.name(),
                options: offending,
            });
        }
        self.validate()?;

        let mut params = Vec::new();
        let mut push = |param: QueryParam, value: String| params.push((param.as_str().to_string(), value));

        if let Some(node_type) = self.node_type {
            push(QueryParam::Type, node_type.as_str().to_string());
        }
        if let Some(running) = self.running {
            push(QueryParam::Running, running.to_string());
        }
        if let Some(lookup) = &self.lookup {
            push(QueryParam::Lookup, lookup.clone());
        }
        if let Some(country) = &self.country {
            push(QueryParam::Country, country.to_ascii_lowercase());
        }
        if let Some(numbers) = &self.as_numbers {
            push(QueryParam::As, numbers.iter().join(","));
        }
        if let Some(as_name) = &self.as_name {
            push(QueryParam::AsName, as_name.clone());
        }
        if let Some(flag) = self.flag {
            push(QueryParam::Flag, flag.as_str().to_string());
        }
        if let Some(range) = self.first_seen_days {
            push(QueryParam::FirstSeenDays, range.to_string());
        }
        if let Some(range) = self.last_seen_days {
            push(QueryParam::LastSeenDays, range.to_string());
        }
        if let Some(contact) = &self.contact {
            push(QueryParam::Contact, contact.clone());
        }
        if let Some(family) = &self.family {
            push(QueryParam::Family, family.clone());
        }
        if let Some(version) = &self.version {
            push(QueryParam::Version, version.clone());
        }
        if let Some(os) = &self.os {
            push(QueryParam::Os, os.clone());
        }
        if let Some(host_name) = &self.host_name {
            push(QueryParam::HostName, host_name.clone());
        }
        if let Some(recommended) = self.recommended_version {
            push(QueryParam::RecommendedVersion, recommended.to_string());
        }
        if let Some(fields) = &self.fields {
            push(QueryParam::Fields, fields.iter().join(","));
        }
        if let Some(order) = &self.order {
            push(QueryParam::Order, order.iter().join(","));
        }
        if let Some(offset) = self.offset {
            push(QueryParam::Offset, offset.to_string());
        }
        if let Some(limit) = self.limit {
            push(QueryParam::Limit, limit.to_string());
        }
        Ok(params)
    }
}

fn invalid(option: &'static str, reason: impl Into<String>) -> OnionooError {
    OnionooError::InvalidOption {
        option,
        reason: reason.into(),
    }
}
