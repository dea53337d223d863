//! Cached data-access client for the club website REST API.
//!
//! `clubcache` sits between a frontend and the backend and enforces the
//! discipline the backend needs to survive: one in-flight request per
//! logical call, a per-resource cooldown, a single-flight bulk refresh,
//! and a durable last-known-good cache that reads fall back to whenever
//! the network lets them down. Payloads are opaque JSON throughout.
//!
//! Typical use:
//!
//! ```no_run
//! use clubcache::{ClubClient, Config};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = ClubClient::new(Config::load()?)?;
//! client.refresh_all().await;
//! if let Some(members) = client.get_members() {
//!     println!("{members}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod models;
pub mod sync;

pub use api::{ApiClient, ApiError};
pub use cache::{CacheEntry, CacheStore};
pub use client::{ClubClient, RefreshEvent, RefreshOutcome, ResourceCacheStatus};
pub use config::Config;
pub use models::Resource;
pub use sync::{RateLimitStatus, RateLimiter};
