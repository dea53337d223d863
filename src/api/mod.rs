//! REST transport for the club website backend.
//!
//! `ApiClient` performs the actual HTTP calls; `ApiError` is the structured
//! classification every call settles into. Bearer-token auth, the timeout
//! race, request deduplication, and the short-lived GET response cache all
//! live here - nothing above this module talks to the network.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
