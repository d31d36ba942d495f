//! Mock [`Transport`] for integration tests.
//!
//! Serves scripted update batches to the poller (then suspends forever, like
//! a long poll with no traffic) and records every outbound call so tests can
//! assert on replies, menus, and presence signals without a network.

use async_trait::async_trait;
use sbot_core::{
    Chat, IncomingMessage, Menu, PresenceSignal, Transport, TransportError, Update, User,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One recorded `send_message(chat_id, text, menu)` call.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub menu: Option<Menu>,
}

/// Mock transport: scripted update batches in, recorded calls out.
pub struct MockTransport {
    batches: Mutex<VecDeque<Vec<Update>>>,
    /// Offsets the poller fetched with, in order.
    pub fetch_offsets: Mutex<Vec<i64>>,
    sent_tx: mpsc::UnboundedSender<SentMessage>,
    presence_tx: mpsc::UnboundedSender<PresenceSignal>,
}

impl MockTransport {
    /// Creates a transport serving `batches` in order, plus the receivers
    /// for recorded messages and presence signals.
    pub fn with_receivers(
        batches: Vec<Vec<Update>>,
    ) -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<SentMessage>,
        mpsc::UnboundedReceiver<PresenceSignal>,
    ) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (presence_tx, presence_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            batches: Mutex::new(batches.into_iter().collect()),
            fetch_offsets: Mutex::new(Vec::new()),
            sent_tx,
            presence_tx,
        });
        (transport, sent_rx, presence_rx)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_updates(
        &self,
        offset: i64,
        _limit: u8,
        _timeout_secs: u32,
    ) -> Result<Vec<Update>, TransportError> {
        self.fetch_offsets.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => Ok(batch),
            None => {
                // no more scripted traffic: behave like an endless long poll
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        menu: Option<&Menu>,
    ) -> Result<(), TransportError> {
        let _ = self.sent_tx.send(SentMessage {
            chat_id,
            text: text.to_string(),
            menu: menu.cloned(),
        });
        Ok(())
    }

    async fn send_presence(
        &self,
        _chat_id: i64,
        signal: PresenceSignal,
    ) -> Result<(), TransportError> {
        let _ = self.presence_tx.send(signal);
        Ok(())
    }
}

/// Message from `user_id` in a same-id private chat.
pub fn message(user_id: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        from: User {
            id: user_id,
            username: None,
            first_name: Some(format!("user{user_id}")),
            last_name: None,
        },
        chat: Chat {
            id: user_id,
            chat_type: "private".to_string(),
        },
        text: text.to_string(),
    }
}

/// Update wrapping [`message`].
#[allow(dead_code)] // only the dispatch tests script raw updates
pub fn update(update_id: i64, user_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(message(user_id, text)),
    }
}
