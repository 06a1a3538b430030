//! Response cache with conditional revalidation.
//!
//! Entries are keyed by a canonical [`RequestKey`] and hold the raw
//! response together with its retrieval time. A fresh entry is served as is.
//! A stale entry is revalidated by repeating the request with an
//! `If-Modified-Since` header; if the server answers "not modified" the
//! request is repeated once more without the header to obtain a body.
//!
//! Revalidation sub-requests run with a [`RequestContext`] marking them as
//! such, so they bypass the cache instead of recursing into it. The marker
//! travels with the request, so concurrent revalidations of different keys
//! do not interfere.
//!
//! Entries are never evicted, only overwritten by the next successful fetch
//! for the same key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderValue, IF_MODIFIED_SINCE};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::client::Outcome;
use crate::error::{OnionooError, Result};
use crate::fetcher::{HttpRequest, HttpResponse};
use crate::models::RawResponse;
use crate::timestamp;

/// A keyword value inside a [`RequestKey`]. Mappings are stored as
/// key-sorted pairs so equal content yields equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Scalar(String),
    Mapping(Vec<(String, KeyValue)>),
}

impl KeyValue {
    pub fn mapping<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, KeyValue)>,
    {
        KeyValue::Mapping(canonical(pairs))
    }
}

fn canonical<I>(pairs: I) -> Vec<(String, KeyValue)>
where
    I: IntoIterator<Item = (String, KeyValue)>,
{
    let mut pairs: Vec<_> = pairs.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

/// Canonical, order-independent identity of a request:
/// verb, URL, positional arguments and keyword arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    verb: String,
    url: String,
    positional: Vec<String>,
    keyword: Vec<(String, KeyValue)>,
}

impl RequestKey {
    pub fn new<P, K>(verb: &str, url: &str, positional: P, keyword: K) -> Self
    where
        P: IntoIterator<Item = String>,
        K: IntoIterator<Item = (String, KeyValue)>,
    {
        Self {
            verb: verb.to_ascii_uppercase(),
            url: url.to_string(),
            positional: positional.into_iter().collect(),
            keyword: canonical(keyword),
        }
    }
}

/// Execution context threaded through a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    revalidating: bool,
}

impl RequestContext {
    /// Context for requests issued while revalidating a stale entry.
    pub fn revalidation() -> Self {
        Self { revalidating: true }
    }

    pub fn is_revalidating(&self) -> bool {
        self.revalidating
    }
}

/// Something able to (re)issue a request; the cache calls back into it to
/// revalidate stale entries.
#[async_trait]
pub trait Refetch: Send + Sync {
    async fn refetch(&self, request: &HttpRequest, ctx: RequestContext) -> Result<Outcome>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<RawResponse>,
    retrieved_at: DateTime<Utc>,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct Cache {
    enabled: bool,
    ttl: Duration,
    entries: RwLock<HashMap<RequestKey, CacheEntry>>,
}

impl Cache {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self {
            enabled,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Looks `request` up.
    ///
    /// Returns `None` when caching is disabled, when called from within a
    /// revalidation, or when there is no entry. A fresh entry is returned
    /// directly; a stale one is revalidated through `fetcher` first. Fetch
    /// failures during revalidation are propagated unchanged.
    pub async fn lookup<F>(
        &self,
        request: &HttpRequest,
        ctx: RequestContext,
        fetcher: &F,
    ) -> Result<Option<Arc<RawResponse>>>
    where
        F: Refetch + ?Sized,
    {
        if !self.enabled || ctx.is_revalidating() {
            return Ok(None);
        }

        let key = request.cache_key();
        let entry = match self.entries.read().await.get(&key) {
            Some(entry) => entry.clone(),
            None => {
                debug!(url = %request.url, "cache miss");
                return Ok(None);
            }
        };

        if Instant::now() < entry.expires_at {
            debug!(url = %request.url, "cache hit");
            return Ok(Some(entry.value));
        }

        debug!(url = %request.url, retrieved_at = %entry.retrieved_at, "cache entry stale, revalidating");
        self.revalidate(key, request, entry.retrieved_at, fetcher)
            .await
            .map(Some)
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub async fn update(&self, key: RequestKey, value: Arc<RawResponse>) {
        if !self.enabled {
            return;
        }
        let entry = CacheEntry {
            value,
            retrieved_at: Utc::now(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    async fn revalidate<F>(
        &self,
        key: RequestKey,
        request: &HttpRequest,
        retrieved_at: DateTime<Utc>,
        fetcher: &F,
    ) -> Result<Arc<RawResponse>>
    where
        F: Refetch + ?Sized,
    {
        let ctx = RequestContext::revalidation();
        let mut conditional = request.clone();
        let since = HeaderValue::from_str(&timestamp::encode_utc(&retrieved_at))
            .map_err(|e| OnionooError::InvalidOption {
                option: "If-Modified-Since",
                reason: e.to_string(),
            })?;
        conditional.headers.insert(IF_MODIFIED_SINCE, since);

        let value = match fetcher.refetch(&conditional, ctx).await? {
            Outcome::Fetched(value) => value,
            Outcome::NotModified(_) => {
                debug!(url = %request.url, "not modified, repeating unconditionally");
                match fetcher.refetch(request, ctx).await? {
                    Outcome::Fetched(value) => value,
                    Outcome::NotModified(response) => return Err(unexpected_not_modified(response)),
                }
            }
        };

        self.update(key, value.clone()).await;
        Ok(value)
    }
}

fn unexpected_not_modified(response: HttpResponse) -> OnionooError {
    OnionooError::Http {
        status: response.status,
        response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const TTL: Duration = Duration::from_secs(3600);

    fn raw(version: &str) -> Arc<RawResponse> {
        Arc::new(
            serde_json::from_value(json!({
                "version": version,
                "relays_published": "2020-05-17 09:00:00",
                "bridges_published": "2020-05-17 08:41:32",
                "relays": [],
                "bridges": []
            }))
            .unwrap(),
        )
    }

    fn request() -> HttpRequest {
        HttpRequest::get(
            "https://onionoo.torproject.org/details",
            vec![("limit".into(), "1".into())],
        )
    }

    fn not_modified() -> Outcome {
        Outcome::NotModified(HttpResponse::new(304, serde_json::Value::Null))
    }

    /// Replays scripted outcomes and checks that the cache is bypassed
    /// while a revalidation is in flight.
    struct ScriptedFetcher {
        cache: Cache,
        outcomes: Mutex<VecDeque<Result<Outcome>>>,
        seen: Mutex<Vec<HttpRequest>>,
        nested_hits: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(outcomes: Vec<Result<Outcome>>) -> Self {
            Self {
                cache: Cache::new(true, TTL),
                outcomes: Mutex::new(outcomes.into()),
                seen: Mutex::new(Vec::new()),
                nested_hits: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Refetch for ScriptedFetcher {
        async fn refetch(&self, request: &HttpRequest, ctx: RequestContext) -> Result<Outcome> {
            if self.cache.lookup(request, ctx, self).await?.is_some() {
                self.nested_hits.fetch_add(1, Ordering::SeqCst);
            }
            self.seen.lock().unwrap().push(request.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected refetch")
        }
    }

    #[test]
    fn test_key_ignores_keyword_order() {
        let a = RequestKey::new(
            "GET",
            "https://example.org",
            Vec::<String>::new(),
            [
                ("fields".to_string(), KeyValue::Scalar("a,b".into())),
                ("offset".to_string(), KeyValue::Scalar("1".into())),
            ],
        );
        let b = RequestKey::new(
            "get",
            "https://example.org",
            Vec::<String>::new(),
            [
                ("offset".to_string(), KeyValue::Scalar("1".into())),
                ("fields".to_string(), KeyValue::Scalar("a,b".into())),
            ],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_flattens_nested_mappings_canonically() {
        let nested = |order: &[(&str, &str)]| {
            RequestKey::new(
                "GET",
                "https://example.org",
                Vec::<String>::new(),
                [(
                    "params".to_string(),
                    KeyValue::mapping(
                        order
                            .iter()
                            .map(|(k, v)| (k.to_string(), KeyValue::Scalar(v.to_string()))),
                    ),
                )],
            )
        };
        assert_eq!(
            nested(&[("limit", "1"), ("type", "relay")]),
            nested(&[("type", "relay"), ("limit", "1")])
        );
        assert_ne!(nested(&[("limit", "1")]), nested(&[("limit", "2")]));
    }

    #[test]
    fn test_key_distinguishes_positional_arguments() {
        let a = RequestKey::new("GET", "u", vec!["x".to_string()], Vec::<(String, KeyValue)>::new());
        let b = RequestKey::new("GET", "u", vec!["y".to_string()], Vec::<(String, KeyValue)>::new());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_disabled_cache_never_stores() {
        let cache = Cache::new(false, TTL);
        let fetcher = ScriptedFetcher::new(vec![]);
        cache.update(request().cache_key(), raw("8.0")).await;
        assert!(cache.is_empty().await);
        assert!(cache.lookup(&request(), RequestContext::default(), &fetcher).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_absent_entry_is_none() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let hit = fetcher
            .cache
            .lookup(&request(), RequestContext::default(), &fetcher)
            .await
            .unwrap();
        assert!(hit.is_none());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_served_without_fetch() {
        let fetcher = ScriptedFetcher::new(vec![]);
        fetcher.cache.update(request().cache_key(), raw("8.0")).await;
        tokio::time::advance(TTL - Duration::from_secs(1)).await;

        let hit = fetcher
            .cache
            .lookup(&request(), RequestContext::default(), &fetcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.envelope.version, "8.0");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_not_modified_refetches_unconditionally() {
        let fetcher = ScriptedFetcher::new(vec![Ok(not_modified()), Ok(Outcome::Fetched(raw("9.0")))]);
        fetcher.cache.update(request().cache_key(), raw("8.0")).await;
        tokio::time::advance(TTL).await;

        let value = fetcher
            .cache
            .lookup(&request(), RequestContext::default(), &fetcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value.envelope.version, "9.0");
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(fetcher.nested_hits.load(Ordering::SeqCst), 0);

        let seen = fetcher.seen.lock().unwrap().clone();
        let since = seen[0].headers.get(IF_MODIFIED_SINCE).unwrap().to_str().unwrap();
        assert!(timestamp::decode_utc(since).is_ok());
        assert!(seen[1].headers.get(IF_MODIFIED_SINCE).is_none());

        // the refreshed entry is fresh again
        let again = fetcher
            .cache
            .lookup(&request(), RequestContext::default(), &fetcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.envelope.version, "9.0");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_modified_payload_replaces_entry() {
        let fetcher = ScriptedFetcher::new(vec![Ok(Outcome::Fetched(raw("9.1")))]);
        fetcher.cache.update(request().cache_key(), raw("8.0")).await;
        tokio::time::advance(TTL + Duration::from_secs(5)).await;

        let value = fetcher
            .cache
            .lookup(&request(), RequestContext::default(), &fetcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value.envelope.version, "9.1");
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(fetcher.cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_revalidating_context_bypasses_cache() {
        let fetcher = ScriptedFetcher::new(vec![]);
        fetcher.cache.update(request().cache_key(), raw("8.0")).await;
        let hit = fetcher
            .cache
            .lookup(&request(), RequestContext::revalidation(), &fetcher)
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_revalidation_failure_propagates() {
        let fetcher = ScriptedFetcher::new(vec![Err(OnionooError::ServiceUnavailable {
            response: HttpResponse::new(503, json!("down")),
        })]);
        fetcher.cache.update(request().cache_key(), raw("8.0")).await;
        tokio::time::advance(TTL).await;

        let err = fetcher
            .cache
            .lookup(&request(), RequestContext::default(), &fetcher)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
    }
}
