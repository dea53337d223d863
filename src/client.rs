//! The long-lived client façade.
//!
//! One `ClubClient` per process owns the transport, the durable cache with
//! its in-memory mirror, the per-resource rate limiter, and the refresh
//! event channel. Reads prefer the network but transparently fall back to
//! the last cached copy on any failure - callers cannot distinguish fresh
//! from stale data, by contract. Synchronous getters never perform I/O;
//! that invariant is what keeps a render path from ever triggering a fetch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{AuthSession, SessionData};
use crate::cache::{CacheEntry, CacheStore};
use crate::config::Config;
use crate::models::Resource;
use crate::sync::{RateLimitStatus, RateLimiter};

/// Capacity of the refresh event channel. Seven resources plus batch
/// markers fit comfortably; a slow subscriber sees `Lagged`, not a stall.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Refresh notifications delivered to subscribers. This channel replaces
/// any direct coupling to a presentation layer: render code subscribes and
/// re-reads the sync getters when something changes.
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// A resource was fetched and its cache entry overwritten.
    Updated(Resource),
    /// A fetch failed; the cached entry, if any, was left untouched.
    Failed {
        resource: Resource,
        error: ApiError,
    },
    /// A `refresh_all` batch finished, with per-resource success.
    BatchCompleted(HashMap<Resource, bool>),
    /// A `refresh_all` call found another batch in flight and did nothing.
    BatchSkipped,
}

/// Result of [`ClubClient::refresh_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed(HashMap<Resource, bool>),
    /// Another batch was already running; no requests were issued.
    Skipped,
}

/// Cache state for one resource as reported by `cache_status`.
#[derive(Debug, Clone)]
pub struct ResourceCacheStatus {
    pub cached_at: DateTime<Utc>,
    pub age: String,
    pub stale: bool,
}

pub struct ClubClient {
    api: ApiClient,
    store: CacheStore,
    memory: RwLock<HashMap<Resource, CacheEntry>>,
    limiter: RateLimiter,
    session: Mutex<AuthSession>,
    refresh_in_progress: AtomicBool,
    events: broadcast::Sender<RefreshEvent>,
    auto_refresh: Mutex<Option<JoinHandle<()>>>,
    auto_refresh_interval: Duration,
}

impl ClubClient {
    /// Construct the client: open the durable cache, mirror it into memory,
    /// and restore any persisted session. Performs no network I/O and never
    /// starts the refresh timer.
    pub fn new(config: Config) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        let store = CacheStore::new(cache_dir.clone())?;

        let mut session = AuthSession::new(cache_dir);
        if let Err(e) = session.load() {
            warn!(error = %e, "Failed to load session, starting unauthenticated");
        }

        let api = ApiClient::new(
            &config.base_url,
            config.request_timeout(),
            config.response_cache_ttl(),
        )?;
        if let Some(token) = session.token() {
            debug!("Restored token from saved session");
            api.set_token(token.to_string());
        }

        // Mirror the durable cache so the sync getters never touch the
        // filesystem.
        let mut memory = HashMap::new();
        for resource in Resource::ALL {
            if let Some(entry) = store.load(resource.key()) {
                memory.insert(resource, entry);
            }
        }
        debug!(entries = memory.len(), "Cache mirror loaded");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            api,
            store,
            memory: RwLock::new(memory),
            limiter: RateLimiter::new(config.resource_cooldown()),
            session: Mutex::new(session),
            refresh_in_progress: AtomicBool::new(false),
            events,
            auto_refresh: Mutex::new(None),
            auto_refresh_interval: config.auto_refresh_interval(),
        })
    }

    /// Subscribe to refresh notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RefreshEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch one resource, respecting its cooldown. On any transport failure
    /// the last cached copy is returned instead; `Err` means there was
    /// nothing cached to fall back to.
    pub async fn load(&self, resource: Resource) -> Result<Value, ApiError> {
        if !self.limiter.try_acquire(resource) {
            debug!(%resource, "Cooldown active, serving cache");
            return match self.get(resource) {
                Some(value) => Ok(value),
                None => Err(ApiError::RateLimited),
            };
        }

        match self.fetch_and_store(resource).await {
            Ok(value) => Ok(value),
            Err(error) => match self.get(resource) {
                Some(value) => {
                    debug!(%resource, %error, "Fetch failed, falling back to cache");
                    Ok(value)
                }
                None => Err(error),
            },
        }
    }

    /// Synchronous cache read. Never performs I/O of any kind.
    pub fn get(&self, resource: Resource) -> Option<Value> {
        self.memory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&resource)
            .map(|entry| entry.data.clone())
    }

    pub async fn load_members(&self) -> Result<Value, ApiError> {
        self.load(Resource::Members).await
    }

    pub fn get_members(&self) -> Option<Value> {
        self.get(Resource::Members)
    }

    pub async fn load_events(&self) -> Result<Value, ApiError> {
        self.load(Resource::Events).await
    }

    pub fn get_events(&self) -> Option<Value> {
        self.get(Resource::Events)
    }

    pub async fn load_projects(&self) -> Result<Value, ApiError> {
        self.load(Resource::Projects).await
    }

    pub fn get_projects(&self) -> Option<Value> {
        self.get(Resource::Projects)
    }

    pub async fn load_gallery(&self) -> Result<Value, ApiError> {
        self.load(Resource::Gallery).await
    }

    pub fn get_gallery(&self) -> Option<Value> {
        self.get(Resource::Gallery)
    }

    pub async fn load_announcements(&self) -> Result<Value, ApiError> {
        self.load(Resource::Announcements).await
    }

    pub fn get_announcements(&self) -> Option<Value> {
        self.get(Resource::Announcements)
    }

    pub async fn load_admins(&self) -> Result<Value, ApiError> {
        self.load(Resource::Admins).await
    }

    pub fn get_admins(&self) -> Option<Value> {
        self.get(Resource::Admins)
    }

    pub async fn load_site_config(&self) -> Result<Value, ApiError> {
        self.load(Resource::Config).await
    }

    pub fn get_site_config(&self) -> Option<Value> {
        self.get(Resource::Config)
    }

    /// Fetch one resource and overwrite its cache entry on success. Shared
    /// by `load` and `refresh_all`; emits a refresh event either way. A
    /// failure leaves the existing entry untouched.
    async fn fetch_and_store(&self, resource: Resource) -> Result<Value, ApiError> {
        match self.api.get(resource.endpoint()).await {
            Ok(value) => {
                self.store_entry(resource, value.clone());
                self.emit(RefreshEvent::Updated(resource));
                Ok(value)
            }
            Err(error) => {
                if error == ApiError::AuthInvalid {
                    self.purge_session();
                }
                self.emit(RefreshEvent::Failed {
                    resource,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    fn store_entry(&self, resource: Resource, value: Value) {
        if !self.store.save(resource.key(), &value) {
            warn!(%resource, "Durable cache write failed, keeping in-memory copy only");
        }
        self.memory
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource, CacheEntry::new(value));
    }

    // =========================================================================
    // Bulk refresh
    // =========================================================================

    /// Refresh every resource concurrently, settle-all: one resource
    /// failing cancels nothing else. Single-flight: if a batch is already
    /// running, the call reports `Skipped` without issuing any requests.
    pub async fn refresh_all(&self) -> RefreshOutcome {
        if self
            .refresh_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("refresh_all already in flight, skipping");
            self.emit(RefreshEvent::BatchSkipped);
            return RefreshOutcome::Skipped;
        }

        info!("Starting full refresh");

        let fetches = Resource::ALL.map(|resource| async move {
            self.limiter.record_attempt(resource);
            (resource, self.fetch_and_store(resource).await.is_ok())
        });
        let refreshed: HashMap<Resource, bool> = join_all(fetches).await.into_iter().collect();

        let succeeded = refreshed.values().filter(|ok| **ok).count();
        info!(succeeded, total = refreshed.len(), "Full refresh complete");

        self.refresh_in_progress.store(false, Ordering::SeqCst);
        self.emit(RefreshEvent::BatchCompleted(refreshed.clone()));
        RefreshOutcome::Completed(refreshed)
    }

    /// Start the periodic refresh timer. Deliberately never started by the
    /// constructor: automatic refresh compounding with UI-driven loads is
    /// how earlier generations of this layer overloaded the backend.
    pub fn start_auto_refresh(self: &Arc<Self>) {
        let mut guard = self
            .auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            debug!("Auto-refresh already running");
            return;
        }

        let interval = self.auto_refresh_interval;
        let client = Arc::downgrade(self);
        info!(interval_secs = interval.as_secs(), "Auto-refresh started");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so starting the
            // timer is not itself a refresh.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(client) = client.upgrade() else {
                    break;
                };
                client.refresh_all().await;
            }
        });
        *guard = Some(handle);
    }

    pub fn stop_auto_refresh(&self) {
        if let Some(handle) = self
            .auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            info!("Auto-refresh stopped");
        }
    }

    // =========================================================================
    // Status & cache management
    // =========================================================================

    pub fn cache_status(&self) -> HashMap<Resource, Option<ResourceCacheStatus>> {
        let memory = self.memory.read().unwrap_or_else(PoisonError::into_inner);
        Resource::ALL
            .iter()
            .map(|&resource| {
                let status = memory.get(&resource).map(|entry| ResourceCacheStatus {
                    cached_at: entry.cached_at,
                    age: entry.age_display(),
                    stale: entry.is_stale(),
                });
                (resource, status)
            })
            .collect()
    }

    pub fn rate_limit_status(&self) -> HashMap<Resource, RateLimitStatus> {
        self.limiter.status_all()
    }

    /// Clear one resource entry, or every tracked entry.
    pub fn clear_cache(&self, resource: Option<Resource>) {
        match resource {
            Some(resource) => {
                self.store.remove(resource.key());
                self.memory
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&resource);
            }
            None => {
                self.store.clear();
                self.memory
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear();
            }
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let body = json!({ "username": username, "password": password });
        let data = self.api.post("/api/auth/login", &body).await?;
        let token = data
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::InvalidResponse("login response missing token".to_string()))?;

        self.api.set_token(token.to_string());

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        session.update(SessionData {
            token: token.to_string(),
            username: username.to_string(),
            created_at: Utc::now(),
        });
        if let Err(e) = session.save() {
            warn!(error = %e, "Failed to persist session");
        }
        info!(username, "Logged in");
        Ok(())
    }

    /// Clear the token, the durable session, and every cached entry.
    pub fn logout(&self) {
        self.api.clear_token();
        self.purge_session();
        self.clear_cache(None);
        info!("Logged out");
    }

    fn purge_session(&self) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = session.clear() {
            warn!(error = %e, "Failed to clear session file");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.token().is_some()
    }

    /// Snapshot of the current bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.api.token()
    }

    // =========================================================================
    // Mutations
    // =========================================================================
    //
    // Precondition violations (not authenticated, missing required field)
    // are caller bugs: they come back as errors from the call site and
    // never fall back to cache.

    pub async fn create(&self, resource: Resource, body: Value) -> Result<Value, ApiError> {
        self.ensure_authenticated()?;
        Self::ensure_required_fields(resource, &body)?;

        let result = self.api.post(resource.endpoint(), &body).await?;
        self.api.invalidate_response(resource.endpoint());
        Ok(result)
    }

    pub async fn update(&self, resource: Resource, id: &str, body: Value) -> Result<Value, ApiError> {
        self.ensure_authenticated()?;
        if !body.is_object() {
            return Err(ApiError::InvalidBody("expected a JSON object"));
        }

        let path = format!("{}/{}", resource.endpoint(), id);
        let result = self.api.put(&path, &body).await?;
        self.api.invalidate_response(resource.endpoint());
        Ok(result)
    }

    pub async fn delete_item(&self, resource: Resource, id: &str) -> Result<Value, ApiError> {
        self.ensure_authenticated()?;

        let path = format!("{}/{}", resource.endpoint(), id);
        let result = self.api.delete(&path).await?;
        self.api.invalidate_response(resource.endpoint());
        Ok(result)
    }

    fn ensure_authenticated(&self) -> Result<(), ApiError> {
        if self.api.token().is_some() {
            Ok(())
        } else {
            Err(ApiError::NotAuthenticated)
        }
    }

    fn ensure_required_fields(resource: Resource, body: &Value) -> Result<(), ApiError> {
        let Some(object) = body.as_object() else {
            return Err(ApiError::InvalidBody("expected a JSON object"));
        };
        for field in resource.required_fields() {
            match object.get(*field) {
                Some(value) if !value.is_null() => {}
                _ => return Err(ApiError::MissingField(field)),
            }
        }
        Ok(())
    }
}

impl Drop for ClubClient {
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}
