//! HTTP transport for the club website REST API.
//!
//! Wraps `reqwest` with bearer-token auth, a hard timeout race, in-flight
//! request deduplication, and a short-lived GET response cache. Every call
//! settles into a `Result<Value, ApiError>`; expected failures are returned,
//! never thrown, and there are no automatic retries (uncontrolled retry
//! amplification is the documented failure mode this layer exists to avoid).

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s tolerates a slow shared-hosting backend while still failing fast
/// enough for the caller to fall back to cache.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Lifetime of the in-memory GET response cache in seconds.
/// Long enough to absorb a burst of identical reads, short enough that an
/// explicit refresh a minute later reaches the network. Zero disables it.
pub const DEFAULT_RESPONSE_CACHE_SECS: u64 = 30;

type CallResult = Result<Value, ApiError>;
type InflightFuture = Shared<BoxFuture<'static, CallResult>>;

/// In-flight ticket key: method + URL + body fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RequestKey {
    method: String,
    url: String,
    body_fingerprint: u64,
}

impl RequestKey {
    fn new(method: &Method, url: &str, body: Option<&Value>) -> Self {
        let mut hasher = DefaultHasher::new();
        if let Some(body) = body {
            body.to_string().hash(&mut hasher);
        }
        Self {
            method: method.as_str().to_string(),
            url: url.to_string(),
            body_fingerprint: hasher.finish(),
        }
    }
}

/// Transport client. Clone is cheap - the connection pool, token slot,
/// ticket map, and response cache are all shared behind `Arc`.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    response_cache_ttl: Duration,
    token: Arc<RwLock<Option<String>>>,
    inflight: Arc<Mutex<HashMap<RequestKey, InflightFuture>>>,
    response_cache: Arc<Mutex<HashMap<String, (Instant, Value)>>>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        response_cache_ttl: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            timeout,
            response_cache_ttl,
            token: Arc::new(RwLock::new(None)),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            response_cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    // ===== Token slot =====

    pub fn set_token(&self, token: String) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    pub fn clear_token(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Snapshot of the current bearer token.
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    // ===== Requests =====

    pub async fn get(&self, path: &str) -> CallResult {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> CallResult {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> CallResult {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> CallResult {
        self.request(Method::DELETE, path, None).await
    }

    /// Perform one logical request. Identical concurrent calls share a
    /// single in-flight ticket; GETs may be answered from the short-lived
    /// response cache without touching the network at all.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> CallResult {
        let url = self.url(path);

        if method == Method::GET && !self.response_cache_ttl.is_zero() {
            if let Some(value) = self.cached_response(&url) {
                debug!(%url, "Serving GET from response cache");
                return Ok(value);
            }
        }

        let key = RequestKey::new(&method, &url, body);

        let fut = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = inflight.get(&key) {
                debug!(method = %method, %url, "Joining in-flight request");
                existing.clone()
            } else {
                let fut = self.make_inflight(method, url, body.cloned(), key.clone());
                inflight.insert(key, fut.clone());
                fut
            }
        };

        fut.await
    }

    /// Drop any cached GET response for this path. Called after mutations so
    /// the next read observes the write.
    pub fn invalidate_response(&self, path: &str) {
        let url = self.url(path);
        self.response_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&url);
    }

    /// Build the shared future that performs one network call. The ticket is
    /// removed inside the future itself, so it disappears exactly when the
    /// call settles, whatever the outcome.
    fn make_inflight(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
        key: RequestKey,
    ) -> InflightFuture {
        let http = self.http.clone();
        let token_slot = Arc::clone(&self.token);
        let inflight = Arc::clone(&self.inflight);
        let response_cache = Arc::clone(&self.response_cache);
        let cache_response = method == Method::GET && !self.response_cache_ttl.is_zero();
        let timeout = self.timeout;

        async move {
            let result = Self::perform(http, token_slot, timeout, method, &url, body).await;

            if cache_response {
                if let Ok(ref value) = result {
                    response_cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(url.clone(), (Instant::now(), value.clone()));
                }
            }

            inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
            result
        }
        .boxed()
        .shared()
    }

    async fn perform(
        http: Client,
        token_slot: Arc<RwLock<Option<String>>>,
        timeout: Duration,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> CallResult {
        let token = token_slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut request = http.request(method.clone(), url);
        if let Some(ref token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(ref body) = body {
            request = request.json(body);
        }

        debug!(method = %method, %url, "Sending request");

        // Timeout race: when the timer wins, the request future is dropped,
        // so a late response can never reach the caches.
        let response = match tokio::time::timeout(timeout, request.send()).await {
            Err(_) => {
                warn!(%url, timeout_secs = timeout.as_secs(), "Request timed out");
                return Err(ApiError::Timeout);
            }
            Ok(Err(e)) => return Err(ApiError::from(e)),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Err(ApiError::from(e)),
        };

        if !status.is_success() {
            let error = ApiError::from_status(status, &text);
            if error == ApiError::AuthInvalid {
                warn!(%url, "Server declared token invalid, clearing stored token");
                *token_slot.write().unwrap_or_else(PoisonError::into_inner) = None;
            }
            return Err(error);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("bad JSON: {}", e)))?;

        Self::unwrap_envelope(value)
    }

    /// Decode the `{success, data, error}` envelope. A body with a `data`
    /// field unwraps to that field; a body reporting `success: false` is an
    /// API failure; anything else is the payload itself. Both branches are
    /// deliberate, not truthiness fallthrough.
    fn unwrap_envelope(body: Value) -> CallResult {
        let Some(object) = body.as_object() else {
            return Ok(body);
        };

        if object.get("success").and_then(Value::as_bool) == Some(false) {
            let message = object
                .get("error")
                .or_else(|| object.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            return Err(ApiError::Api(message));
        }

        if let Some(data) = object.get("data") {
            return Ok(data.clone());
        }

        Ok(body)
    }

    fn cached_response(&self, url: &str) -> Option<Value> {
        let mut cache = self
            .response_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match cache.get(url) {
            Some((at, value)) if at.elapsed() < self.response_cache_ttl => Some(value.clone()),
            Some(_) => {
                cache.remove(url);
                None
            }
            None => None,
        }
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
