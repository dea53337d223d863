//! Per-resource transport cooldown.
//!
//! The limiter records the last *attempt* per resource, successful or not:
//! the cooldown exists to protect the backend from request volume, and a
//! failing endpoint hammered on retry is exactly the volume it guards
//! against.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::models::Resource;

/// Minimum interval between transport attempts for one resource.
pub const DEFAULT_COOLDOWN_SECS: u64 = 5;

/// Cooldown state for one resource as reported by `rate_limit_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    /// Time until the next attempt is permitted; zero when allowed.
    pub retry_in: Duration,
}

pub struct RateLimiter {
    cooldown: Duration,
    last_attempt: Mutex<HashMap<Resource, Instant>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_attempt: Mutex::new(HashMap::new()),
        }
    }

    /// True iff a transport attempt for this resource is currently permitted.
    pub fn can_call(&self, resource: Resource) -> bool {
        if self.cooldown.is_zero() {
            return true;
        }
        let map = self
            .last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match map.get(&resource) {
            Some(last) => last.elapsed() >= self.cooldown,
            None => true,
        }
    }

    /// Record an attempt if one is permitted, returning whether it was.
    pub fn try_acquire(&self, resource: Resource) -> bool {
        if self.cooldown.is_zero() {
            return true;
        }
        let mut map = self
            .last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match map.get(&resource) {
            Some(last) if now.duration_since(*last) < self.cooldown => false,
            _ => {
                map.insert(resource, now);
                true
            }
        }
    }

    /// Record an attempt unconditionally (the bulk-refresh path, which is
    /// not gated but still counts against subsequent single loads).
    pub fn record_attempt(&self, resource: Resource) {
        if self.cooldown.is_zero() {
            return;
        }
        self.last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource, Instant::now());
    }

    pub fn status(&self, resource: Resource) -> RateLimitStatus {
        if self.cooldown.is_zero() {
            return RateLimitStatus {
                allowed: true,
                retry_in: Duration::ZERO,
            };
        }
        let map = self
            .last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match map.get(&resource) {
            Some(last) => {
                let elapsed = last.elapsed();
                RateLimitStatus {
                    allowed: elapsed >= self.cooldown,
                    retry_in: self.cooldown.saturating_sub(elapsed),
                }
            }
            None => RateLimitStatus {
                allowed: true,
                retry_in: Duration::ZERO,
            },
        }
    }

    pub fn status_all(&self) -> HashMap<Resource, RateLimitStatus> {
        Resource::ALL
            .iter()
            .map(|&resource| (resource, self.status(resource)))
            .collect()
    }
}
