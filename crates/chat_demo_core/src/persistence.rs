//! crates/chat_demo_core/src/persistence.rs
//!
//! Serialized shapes of the persisted store snapshots.
//!
//! Each namespace holds a JSON envelope `{"state": ..., "version": 0}`. Timestamps
//! are stored as RFC 3339 strings and decoded back into instants explicitly, so a
//! reload never hands string dates to the domain.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Conversation, Identity, Message, Origin};
use crate::ports::{PortError, PortResult};

pub const SESSION_NAMESPACE: &str = "auth-storage";
pub const CONVERSATION_NAMESPACE: &str = "chat-storage";
pub const APPEARANCE_NAMESPACE: &str = "theme-storage";

const SNAPSHOT_VERSION: u32 = 0;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    state: T,
    #[serde(default)]
    version: u32,
}

/// Wraps a snapshot in the versioned envelope and renders it as JSON text.
pub fn encode<T: Serialize>(state: &T) -> PortResult<String> {
    let envelope = Envelope {
        state,
        version: SNAPSHOT_VERSION,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parses JSON text produced by [`encode`].
pub fn decode<T: DeserializeOwned>(payload: &str) -> PortResult<T> {
    let envelope: Envelope<T> = serde_json::from_str(payload)?;
    if envelope.version != SNAPSHOT_VERSION {
        return Err(PortError::Serialization(format!(
            "unsupported snapshot version {}",
            envelope.version
        )));
    }
    Ok(envelope.state)
}

fn encode_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn decode_instant(raw: &str) -> PortResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PortError::Serialization(format!("bad timestamp '{}': {}", raw, e)))
}

//=========================================================================================
// Session Snapshot
//=========================================================================================

#[derive(Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    pub user: Option<IdentityRecord>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    id: Uuid,
    phone: String,
    country_code: String,
    is_authenticated: bool,
}

impl IdentityRecord {
    pub fn from_domain(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            phone: identity.phone.clone(),
            country_code: identity.dial_code.clone(),
            is_authenticated: identity.authenticated,
        }
    }

    /// Only authenticated identities are ever persisted; anything else is rejected.
    pub fn to_domain(self) -> PortResult<Identity> {
        if !self.is_authenticated {
            return Err(PortError::Serialization(
                "stored identity is not authenticated".to_string(),
            ));
        }
        Ok(Identity {
            id: self.id,
            phone: self.phone,
            dial_code: self.country_code,
            authenticated: true,
        })
    }
}

//=========================================================================================
// Conversation Snapshot
//=========================================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub chatrooms: Vec<ConversationRecord>,
    pub current_chatroom_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    id: Uuid,
    title: String,
    messages: Vec<MessageRecord>,
    created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_message: Option<MessageRecord>,
}

impl ConversationRecord {
    pub fn from_domain(room: &Conversation) -> Self {
        Self {
            id: room.id,
            title: room.title.clone(),
            messages: room.messages.iter().map(MessageRecord::from_domain).collect(),
            created_at: encode_instant(&room.created_at),
            last_message: room.last_message.as_ref().map(MessageRecord::from_domain),
        }
    }

    pub fn to_domain(self) -> PortResult<Conversation> {
        let messages = self
            .messages
            .into_iter()
            .map(MessageRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        // The cache is rebuilt from the tail so a stale stored copy cannot break the invariant.
        let last_message = match messages.last() {
            Some(tail) => Some(tail.clone()),
            None => self.last_message.map(MessageRecord::to_domain).transpose()?,
        };
        Ok(Conversation {
            id: self.id,
            title: self.title,
            messages,
            created_at: decode_instant(&self.created_at)?,
            last_message,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    id: Uuid,
    content: String,
    is_user: bool,
    timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

impl MessageRecord {
    pub fn from_domain(message: &Message) -> Self {
        Self {
            id: message.id,
            content: message.content.clone(),
            is_user: message.origin.is_user(),
            timestamp: encode_instant(&message.timestamp),
            image: message.image.clone(),
        }
    }

    pub fn to_domain(self) -> PortResult<Message> {
        Ok(Message {
            id: self.id,
            content: self.content,
            origin: if self.is_user {
                Origin::User
            } else {
                Origin::Assistant
            },
            timestamp: decode_instant(&self.timestamp)?,
            image: self.image,
        })
    }
}

//=========================================================================================
// Appearance Snapshot
//=========================================================================================

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceSnapshot {
    pub is_dark: bool,
}
