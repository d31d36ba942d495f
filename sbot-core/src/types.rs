//! Core types: user, chat, inbound updates, menu rows, presence signals.

use serde::{Deserialize, Serialize};

/// User identity (id, username, names).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Chat (group or private) identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub chat_type: String,
}

/// One inbound message: sender, chat, free text. Non-text messages carry an
/// empty string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub from: User,
    pub chat: Chat,
    pub text: String,
}

/// One item from the transport's update feed. `update_id` is the monotonic
/// cursor used to compute the next poll offset; updates without a usable
/// message still advance it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

/// Reply keyboard rows sent along with an outbound message.
pub type Menu = Vec<Vec<String>>;

/// Status signal broadcast to a chat while a reply is being prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceSignal {
    Typing,
    UploadPhoto,
    RecordVideo,
    UploadVideo,
    RecordAudio,
    UploadAudio,
    UploadDocument,
    FindLocation,
}

impl PresenceSignal {
    /// Wire name of the signal.
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceSignal::Typing => "typing",
            PresenceSignal::UploadPhoto => "upload_photo",
            PresenceSignal::RecordVideo => "record_video",
            PresenceSignal::UploadVideo => "upload_video",
            PresenceSignal::RecordAudio => "record_audio",
            PresenceSignal::UploadAudio => "upload_audio",
            PresenceSignal::UploadDocument => "upload_document",
            PresenceSignal::FindLocation => "find_location",
        }
    }
}
