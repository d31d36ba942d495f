//! # session-store
//!
//! Per-user session persistence: an expiring key/value store abstraction
//! with an in-memory implementation, the [`UserSession`] record, and the
//! [`SessionStore`] adapter that applies the default time-to-live.

mod error;
mod session;
mod store;

pub use error::StoreError;
pub use session::{SessionStore, UserSession, DEFAULT_SESSION_TTL};
pub use store::{InMemoryStore, KeyValueStore};
