//! teloxide-backed [`Transport`] implementation.

use async_trait::async_trait;
use sbot_core::{
    Chat, IncomingMessage, Menu, PresenceSignal, Transport, TransportError, Update, User,
};
use teloxide::payloads::{GetUpdatesSetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, ChatId, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup, UpdateKind,
};

use crate::config::TelegramConfig;

/// Telegram Bot API transport over teloxide.
pub struct TelegramTransport {
    bot: teloxide::Bot,
}

impl TelegramTransport {
    /// Creates a transport using the given bot token.
    pub fn new(token: String) -> Self {
        Self {
            bot: teloxide::Bot::new(token),
        }
    }

    /// Creates a transport from config, honoring a custom API URL.
    pub fn from_config(config: &TelegramConfig) -> anyhow::Result<Self> {
        let mut bot = teloxide::Bot::new(config.bot_token.clone());
        if let Some(url) = &config.api_url {
            let url = reqwest::Url::parse(url)
                .map_err(|e| anyhow::anyhow!("invalid TELEGRAM_API_URL: {e}"))?;
            bot = bot.set_api_url(url);
        }
        Ok(Self { bot })
    }
}

/// Converts a teloxide update into the engine's [`Update`]. Updates that are
/// not plain text messages keep their id (for the offset cursor) and drop
/// the payload.
fn to_core_update(update: teloxide::types::Update) -> Update {
    let update_id = update.id.0 as i64;
    let message = match &update.kind {
        UpdateKind::Message(message) => to_core_message(message),
        _ => None,
    };
    Update { update_id, message }
}

fn to_core_message(message: &teloxide::types::Message) -> Option<IncomingMessage> {
    let from = message.from.as_ref()?;
    Some(IncomingMessage {
        from: User {
            id: from.id.0 as i64,
            username: from.username.clone(),
            first_name: Some(from.first_name.clone()),
            last_name: from.last_name.clone(),
        },
        chat: Chat {
            id: message.chat.id.0,
            chat_type: format!("{:?}", message.chat.kind),
        },
        text: message.text().unwrap_or("").to_string(),
    })
}

fn to_chat_action(signal: PresenceSignal) -> ChatAction {
    match signal {
        PresenceSignal::Typing => ChatAction::Typing,
        PresenceSignal::UploadPhoto => ChatAction::UploadPhoto,
        PresenceSignal::RecordVideo => ChatAction::RecordVideo,
        PresenceSignal::UploadVideo => ChatAction::UploadVideo,
        PresenceSignal::RecordAudio => ChatAction::RecordVoice,
        PresenceSignal::UploadAudio => ChatAction::UploadVoice,
        PresenceSignal::UploadDocument => ChatAction::UploadDocument,
        PresenceSignal::FindLocation => ChatAction::FindLocation,
    }
}

fn to_reply_markup(menu: Option<&Menu>) -> ReplyMarkup {
    match menu {
        Some(rows) => {
            let keyboard = rows.iter().map(|row| {
                row.iter()
                    .map(|label| KeyboardButton::new(label.clone()))
                    .collect::<Vec<_>>()
            });
            ReplyMarkup::Keyboard(KeyboardMarkup::new(keyboard))
        }
        None => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn fetch_updates(
        &self,
        offset: i64,
        limit: u8,
        timeout_secs: u32,
    ) -> Result<Vec<Update>, TransportError> {
        let updates = self
            .bot
            .get_updates()
            .offset(offset as i32)
            .limit(limit)
            .timeout(timeout_secs)
            .await
            .map_err(|e| TransportError::Poll(e.to_string()))?;
        Ok(updates.into_iter().map(to_core_update).collect())
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        menu: Option<&Menu>,
    ) -> Result<(), TransportError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .reply_markup(to_reply_markup(menu))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        Ok(())
    }

    async fn send_presence(
        &self,
        chat_id: i64,
        signal: PresenceSignal,
    ) -> Result<(), TransportError> {
        self.bot
            .send_chat_action(ChatId(chat_id), to_chat_action(signal))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        Ok(())
    }
}
