//! # scenario
//!
//! The conversation definition and its executor: schema validation of raw
//! definitions, the immutable scenario tree with path-based addressing, the
//! capability table resolved through `<% name %>` deferred calls, and
//! per-turn field rendering (reply, menu, goto, ttl, presence, hooks).

pub mod api;
pub mod error;
pub mod node;
pub mod path;
pub mod tree;
pub mod validator;
pub mod wrapper;

pub use api::{Api, Capability, TurnContext};
pub use error::ScenarioError;
pub use node::{ScenarioNode, FALLBACK_PATTERN};
pub use tree::Scenario;
pub use validator::Validator;
pub use wrapper::ScenarioWrapper;
