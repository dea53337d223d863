//! Rate limiting for transport attempts.
//!
//! Bulk-refresh orchestration (single-flight `refresh_all`, the optional
//! periodic timer) lives on [`crate::client::ClubClient`], which owns the
//! in-progress flag alongside the event channel.

pub mod rate_limit;

pub use rate_limit::{RateLimitStatus, RateLimiter};
