//! Error types for the Onionoo client.
//!
//! Every failure the client can surface maps onto one variant of
//! [`OnionooError`]. HTTP failures carry the status code and the raw
//! transport response so they can be diagnosed without a network capture,
//! and decode failures carry the offending JSON fragment.

use serde_json::Value;
use thiserror::Error;

use crate::fetcher::{HttpResponse, TransportError};

/// Shorthand result type used throughout the crate.
pub type Result<T> = std::result::Result<T, OnionooError>;

/// Which part of a response envelope failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Envelope,
    Relay,
    Bridge,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Envelope => f.write_str("envelope"),
            Side::Relay => f.write_str("relay"),
            Side::Bridge => f.write_str("bridge"),
        }
    }
}

/// Custom error type for Onionoo client operations.
#[derive(Debug, Error)]
pub enum OnionooError {
    /// 400: the request could not be processed because of bad syntax.
    #[error("bad request (400): {}", .response.body)]
    BadRequest { response: HttpResponse },

    /// 404: the requested resource could not be found.
    #[error("not found (404): {}", .response.body)]
    NotFound { response: HttpResponse },

    /// 500: unspecific server-side problem.
    #[error("internal server error (500): {}", .response.body)]
    InternalServerError { response: HttpResponse },

    /// 503: the server is down for maintenance or temporarily overloaded.
    #[error("service unavailable (503): {}", .response.body)]
    ServiceUnavailable { response: HttpResponse },

    /// Any other status the client has no dedicated handling for.
    #[error("request failed with status {status}: {}", .response.body)]
    Http { status: u16, response: HttpResponse },

    /// Every attempt timed out.
    #[error("maximum retries exceeded after {attempts} timed out attempts, bailing")]
    MaxRetriesExceeded { attempts: u32 },

    /// A document did not have the shape this client expects. Usually means the
    /// API moved to a protocol version the client does not understand.
    #[error("failed to decode {side} document at index {index}: {source}; fragment: {fragment}")]
    Decode {
        side: Side,
        index: usize,
        fragment: Value,
        #[source]
        source: serde_json::Error,
    },

    /// The transport failed for a reason other than a timeout.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Options not accepted by the endpoint were supplied.
    #[error("the following options are not allowed for {endpoint}: {}", .options.join(", "))]
    DisallowedOptions {
        endpoint: &'static str,
        options: Vec<&'static str>,
    },

    /// A typed option could not be constructed.
    #[error("invalid option {option}: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },

    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl OnionooError {
    /// Builds a structural decode error for the element at `index` on `side`.
    pub(crate) fn decode(side: Side, index: usize, fragment: &Value, source: serde_json::Error) -> Self {
        OnionooError::Decode {
            side,
            index,
            fragment: fragment.clone(),
            source,
        }
    }

    /// Status code of the HTTP response behind this error, if there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            OnionooError::BadRequest { response }
            | OnionooError::NotFound { response }
            | OnionooError::InternalServerError { response }
            | OnionooError::ServiceUnavailable { response }
            | OnionooError::Http { response, .. } => Some(response.status),
            _ => None,
        }
    }
}
