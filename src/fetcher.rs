use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{KeyValue, RequestKey};

/// A fully-parameterised request, ready to be handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: HeaderMap,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            params,
            headers: HeaderMap::new(),
        }
    }

    /// Cache key for this request. Headers are not part of the key, so a
    /// conditional repeat of a request maps onto the same entry.
    pub fn cache_key(&self) -> RequestKey {
        let params = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), KeyValue::Scalar(v.clone())));
        RequestKey::new(
            self.method.as_str(),
            &self.url,
            Vec::<String>::new(),
            [("params".to_string(), KeyValue::mapping(params))],
        )
    }
}

/// Status code plus body as returned by the transport.
///
/// An empty body decodes to `null`; a body that is not JSON is kept as a
/// JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("the request has timed out")]
    Timeout,

    #[error("there was an issue with the REST request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("provided url is malformed: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(err)
        }
    }
}

/// Issues HTTP requests on behalf of the client.
///
/// Implementations must report a timed-out attempt as
/// [`TransportError::Timeout`]; it is the only failure the client retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn issue(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a `reqwest::Client`. Gzip decoding is handled
/// by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(TransportError::Request)?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn issue(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let url = reqwest::Url::parse_with_params(&request.url, &request.params)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", request.url)))?;
        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let body = parse_body(status, &bytes)?;
        Ok(HttpResponse::new(status.as_u16(), body))
    }
}

fn parse_body(status: StatusCode, bytes: &[u8]) -> Result<Value, TransportError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(e) if status.is_success() => Err(TransportError::Body(e.to_string())),
        Err(_) => Ok(Value::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}
