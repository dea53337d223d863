//! Session persistence for the bearer token.

pub mod session;

pub use session::{AuthSession, SessionData};
