//! # scenario-bot
//!
//! The orchestrator: wires the dispatch queue to the scenario executor and
//! the session store, and owns per-user locking, the update buffer, and the
//! poll offset cursor.

mod bot;

pub use bot::ScenarioBot;
