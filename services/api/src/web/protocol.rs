//! services/api/src/web/protocol.rs
//!
//! Defines the JSON bodies exchanged between the browser client and the API server.

use chat_demo_core::domain::{
    Conversation, ConversationSummary, Country, Identity, Message, Origin,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Requests Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SendCodeRequest {
    pub phone: String,
    pub dial_code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub phone: String,
    pub dial_code: String,
    pub code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    pub title: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SelectConversationRequest {
    pub id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Replaces the stored search filter before listing.
    pub q: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct PostMessageRequest {
    pub content: String,
    /// Embedded image as a data URL.
    #[serde(default)]
    pub image: Option<String>,
}

//=========================================================================================
// Responses Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct SendCodeResponse {
    pub sent: bool,
}

#[derive(Serialize, ToSchema)]
pub struct IdentityResponse {
    pub id: Uuid,
    pub phone: String,
    pub dial_code: String,
    pub authenticated: bool,
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            phone: identity.phone,
            dial_code: identity.dial_code,
            authenticated: identity.authenticated,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OriginBody {
    User,
    Assistant,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub content: String,
    pub origin: OriginBody,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            content: message.content,
            origin: match message.origin {
                Origin::User => OriginBody::User,
                Origin::Assistant => OriginBody::Assistant,
            },
            timestamp: message.timestamp,
            image: message.image,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<MessageResponse>,
    pub last_message: Option<MessageResponse>,
}

impl From<Conversation> for ConversationResponse {
    fn from(room: Conversation) -> Self {
        Self {
            id: room.id,
            title: room.title,
            created_at: room.created_at,
            messages: room.messages.into_iter().map(MessageResponse::from).collect(),
            last_message: room.last_message.map(MessageResponse::from),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ConversationSummaryResponse {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: usize,
}

impl From<ConversationSummary> for ConversationSummaryResponse {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            created_at: summary.created_at,
            last_message: summary.last_message,
            last_message_at: summary.last_message_at,
            message_count: summary.message_count,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ConversationListResponse {
    pub current_id: Option<Uuid>,
    pub search_filter: String,
    pub conversations: Vec<ConversationSummaryResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct PostMessageResponse {
    pub message: MessageResponse,
    /// Identifier of the scheduled assistant reply, if one was scheduled.
    pub reply_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct OlderMessagesResponse {
    pub loaded: usize,
}

#[derive(Serialize, ToSchema)]
pub struct CountryResponse {
    pub name: String,
    pub flag: String,
    pub code: String,
    pub dial_code: String,
}

impl From<Country> for CountryResponse {
    fn from(country: Country) -> Self {
        Self {
            dial_code: country.dial_code(),
            name: country.name,
            flag: country.flag,
            code: country.code,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    /// An assistant reply is pending.
    pub composing: bool,
    /// A code request or verification is in flight.
    pub busy: bool,
}

#[derive(Serialize, ToSchema)]
pub struct AppearanceResponse {
    pub dark: bool,
}
