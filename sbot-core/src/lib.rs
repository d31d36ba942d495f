//! # sbot-core
//!
//! Core types and traits for the scenario bot engine: the [`Transport`] trait,
//! update and message types, presence signals, and tracing initialization.
//! Transport-agnostic; used by the scenario engine, the dispatcher, and the
//! Telegram adapter.

pub mod error;
pub mod logger;
pub mod transport;
pub mod types;

pub use error::TransportError;
pub use logger::init_tracing;
pub use transport::Transport;
pub use types::{Chat, IncomingMessage, Menu, PresenceSignal, Update, User};
