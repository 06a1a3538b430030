//! The Onionoo client: builds endpoint requests, retries timed-out
//! attempts, maps status codes to outcomes and ties the cache and the
//! document codec together.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{Cache, Refetch, RequestContext};
use crate::codec::{decode_response, Category, Shape};
use crate::config::ClientConfig;
use crate::error::{OnionooError, Result, Side};
use crate::fetcher::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
use crate::models::{RawResponse, Response};
use crate::params::QueryOptions;

/// Result of a single successful round trip.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// 200 with a well-formed envelope.
    Fetched(Arc<RawResponse>),
    /// 304; the response carries no body.
    NotModified(HttpResponse),
}

/// Maps a transport response onto an [`Outcome`] or an error.
pub fn dispatch(response: HttpResponse) -> Result<Outcome> {
    match response.status {
        200 => {
            let raw = RawResponse::deserialize(&response.body)
                .map_err(|e| OnionooError::decode(Side::Envelope, 0, &response.body, e))?;
            Ok(Outcome::Fetched(Arc::new(raw)))
        }
        304 => Ok(Outcome::NotModified(response)),
        400 => Err(OnionooError::BadRequest { response }),
        404 => Err(OnionooError::NotFound { response }),
        500 => Err(OnionooError::InternalServerError { response }),
        503 => Err(OnionooError::ServiceUnavailable { response }),
        status => Err(OnionooError::Http { status, response }),
    }
}

/// Client for the Onionoo API.
///
/// The transport defaults to reqwest; any [`Transport`] can be plugged in
/// with [`Client::with_transport`].
#[derive(Debug)]
pub struct Client<T = ReqwestTransport> {
    config: ClientConfig,
    transport: T,
    cache: Cache,
}

impl Client<ReqwestTransport> {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Self::with_transport(config, transport)
    }

    /// Client configured from `ONIONOO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let cache = Cache::new(config.enable_cache, config.cache_ttl);
        Ok(Self {
            config,
            transport,
            cache,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Full URL of the endpoint serving `category`.
    pub fn endpoint_url(&self, category: Category) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), category.path())
    }

    /// Summary documents. `fields` is not accepted.
    pub async fn get_summary(&self, options: &QueryOptions) -> Result<Response> {
        self.get(Category::Summary, options).await
    }

    /// Details documents. With `fields` set, partial documents are returned
    /// that only carry the requested attributes.
    pub async fn get_details(&self, options: &QueryOptions) -> Result<Response> {
        self.get(Category::Details, options).await
    }

    /// Bandwidth documents. `fields` is not accepted.
    pub async fn get_bandwidth(&self, options: &QueryOptions) -> Result<Response> {
        self.get(Category::Bandwidth, options).await
    }

    /// Weights documents. Relays only; bridges are left undecoded.
    pub async fn get_weights(&self, options: &QueryOptions) -> Result<Response> {
        self.get(Category::Weights, options).await
    }

    /// Clients documents. Bridges only; relays are left undecoded.
    pub async fn get_clients(&self, options: &QueryOptions) -> Result<Response> {
        self.get(Category::Clients, options).await
    }

    /// Uptime documents. `fields` is not accepted.
    pub async fn get_uptime(&self, options: &QueryOptions) -> Result<Response> {
        self.get(Category::Uptime, options).await
    }

    /// Fetches and decodes `category` documents.
    pub async fn get(&self, category: Category, options: &QueryOptions) -> Result<Response> {
        let params = options.to_params(category)?;
        let request = HttpRequest::get(self.endpoint_url(category), params);

        let raw = match self.fetch(&request, RequestContext::default()).await? {
            Outcome::Fetched(raw) => raw,
            // only conditional requests can legitimately yield 304
            Outcome::NotModified(response) => {
                return Err(OnionooError::Http {
                    status: response.status,
                    response,
                })
            }
        };
        decode_response(&raw, category, Shape::from_fields(options.fields.as_deref()))
    }

    /// Issues `request`, consulting the cache first.
    ///
    /// Timed-out attempts are retried up to `max_retries` times; every other
    /// failure is returned immediately. Successful responses are stored in
    /// the cache before being returned.
    pub async fn fetch(&self, request: &HttpRequest, ctx: RequestContext) -> Result<Outcome> {
        if let Some(raw) = self.cache.lookup(request, ctx, self).await? {
            return Ok(Outcome::Fetched(raw));
        }

        let timeout = self.config.timeout;
        for attempt in 1..=self.config.max_retries {
            debug!(url = %request.url, attempt, "issuing request");
            let issued = tokio::time::timeout(timeout, self.transport.issue(request, timeout)).await;
            let response = match issued {
                Ok(Ok(response)) => response,
                Ok(Err(TransportError::Timeout)) | Err(_) => {
                    warn!(
                        url = %request.url,
                        attempt,
                        max_retries = self.config.max_retries,
                        "request timed out"
                    );
                    continue;
                }
                Ok(Err(e)) => return Err(e.into()),
            };

            let outcome = dispatch(response)?;
            if let Outcome::Fetched(raw) = &outcome {
                self.cache.update(request.cache_key(), raw.clone()).await;
            }
            return Ok(outcome);
        }

        Err(OnionooError::MaxRetriesExceeded {
            attempts: self.config.max_retries,
        })
    }
}

#[async_trait]
impl<T: Transport> Refetch for Client<T> {
    async fn refetch(&self, request: &HttpRequest, ctx: RequestContext) -> Result<Outcome> {
        self.fetch(request, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_ok_builds_envelope() {
        let outcome = dispatch(HttpResponse::new(
            200,
            json!({
                "version": "8.0",
                "relays_published": "2020-05-17 09:00:00",
                "bridges_published": "2020-05-17 08:41:32",
                "relays": [],
                "bridges": []
            }),
        ))
        .unwrap();
        assert!(matches!(outcome, Outcome::Fetched(raw) if raw.envelope.version == "8.0"));
    }

    #[test]
    fn test_dispatch_malformed_envelope_is_structural_error() {
        let err = dispatch(HttpResponse::new(200, json!({"version": 8}))).unwrap_err();
        assert!(matches!(err, OnionooError::Decode { side: Side::Envelope, .. }));
    }

    #[test]
    fn test_dispatch_status_mapping() {
        let status_of = |status| dispatch(HttpResponse::new(status, json!("oops")));
        assert!(matches!(status_of(304), Ok(Outcome::NotModified(_))));
        assert!(matches!(status_of(400), Err(OnionooError::BadRequest { .. })));
        assert!(matches!(status_of(404), Err(OnionooError::NotFound { .. })));
        assert!(matches!(status_of(500), Err(OnionooError::InternalServerError { .. })));
        assert!(matches!(status_of(503), Err(OnionooError::ServiceUnavailable { .. })));
        assert!(matches!(status_of(418), Err(OnionooError::Http { status: 418, .. })));
    }

    #[test]
    fn test_endpoint_url_joins_base_and_path() {
        let config = ClientConfig {
            base_url: "http://localhost:8080/".into(),
            ..ClientConfig::default()
        };
        let client = Client::new(config).unwrap();
        assert_eq!(client.endpoint_url(Category::Weights), "http://localhost:8080/weights");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ClientConfig {
            max_retries: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(Client::new(config), Err(OnionooError::Config(_))));
    }
}
