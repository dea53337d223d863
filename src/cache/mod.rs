//! Durable mirror of the last-known-good value for each resource.

pub mod store;

pub use store::{CacheEntry, CacheStore};
