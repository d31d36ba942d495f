//! Transport abstraction for the remote messaging endpoint.
//!
//! The engine consumes only this trait; concrete implementations (e.g. the
//! Telegram adapter) live in their own crate. Mock implementations drive the
//! integration tests.

use crate::error::TransportError;
use crate::types::{Menu, PresenceSignal, Update};
use async_trait::async_trait;

/// Remote messaging endpoint: long-poll inbound updates, send outbound
/// messages and presence signals.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Long-polls for updates after `offset`, returning at most `limit`
    /// items. Suspends up to `timeout_secs` waiting for new work.
    async fn fetch_updates(
        &self,
        offset: i64,
        limit: u8,
        timeout_secs: u32,
    ) -> Result<Vec<Update>, TransportError>;

    /// Sends `text` to a chat. `menu` rows become a reply keyboard; `None`
    /// clears any previously shown keyboard.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        menu: Option<&Menu>,
    ) -> Result<(), TransportError>;

    /// Broadcasts a presence signal to a chat.
    async fn send_presence(
        &self,
        chat_id: i64,
        signal: PresenceSignal,
    ) -> Result<(), TransportError>;
}
