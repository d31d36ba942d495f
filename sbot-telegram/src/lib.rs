//! # sbot-telegram
//!
//! Telegram implementation of [`sbot_core::Transport`]: long-poll updates
//! via getUpdates, replies with reply keyboards, presence signals via
//! sendChatAction. Handles only Telegram connectivity; no scenario or
//! session logic.

mod config;
mod transport;

pub use config::TelegramConfig;
pub use transport::TelegramTransport;
