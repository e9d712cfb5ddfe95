//! crates/chat_demo_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generates a fresh opaque identifier.
pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

/// The authenticated user held by the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub phone: String,
    pub dial_code: String,
    pub authenticated: bool,
}

impl Identity {
    /// Builds the identity materialized by a successful OTP verification.
    pub fn verified(phone: &str, dial_code: &str) -> Self {
        Self {
            id: generate_id(),
            phone: phone.to_string(),
            dial_code: dial_code.to_string(),
            authenticated: true,
        }
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Assistant,
}

impl Origin {
    pub fn is_user(self) -> bool {
        matches!(self, Origin::User)
    }
}

/// One turn in a conversation. Never edited once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub origin: Origin,
    pub timestamp: DateTime<Utc>,
    /// Embedded image payload (a data URL), if the user attached one.
    pub image: Option<String>,
}

/// The caller-supplied part of a message; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub origin: Origin,
    pub image: Option<String>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            origin: Origin::User,
            image: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            origin: Origin::Assistant,
            image: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    /// Stamps the message with a fresh id and the given instant.
    pub fn into_message(self, timestamp: DateTime<Utc>) -> Message {
        Message {
            id: generate_id(),
            content: self.content,
            origin: self.origin,
            timestamp,
            image: self.image,
        }
    }
}

/// A named, ordered thread of messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<Message>,
}

impl Conversation {
    pub fn new(title: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            title: title.to_string(),
            messages: Vec::new(),
            created_at,
            last_message: None,
        }
    }

    /// Appends a message and keeps the last-message cache in step with the tail.
    pub fn push(&mut self, message: Message) {
        self.last_message = Some(message.clone());
        self.messages.push(message);
    }

    /// Prepends older history. The tail is unchanged, so the cache is too.
    pub fn prepend(&mut self, mut older: Vec<Message>) {
        older.append(&mut self.messages);
        self.messages = older;
        if self.last_message.is_none() {
            self.last_message = self.messages.last().cloned();
        }
    }

    pub fn title_matches(&self, query: &str) -> bool {
        self.title.to_lowercase().contains(&query.to_lowercase())
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            last_message: self.last_message.as_ref().map(|m| m.content.clone()),
            last_message_at: self.last_message.as_ref().map(|m| m.timestamp),
            message_count: self.messages.len(),
        }
    }
}

/// Read-side projection used by conversation lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: usize,
}

/// Country metadata offered in the dial-code picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Country {
    pub name: String,
    pub flag: String,
    /// ISO 3166-1 alpha-2 code.
    pub code: String,
    pub dial_root: String,
    pub dial_suffixes: Vec<String>,
}

impl Country {
    /// Root plus the first suffix, e.g. `+4` and `4` give `+44`.
    pub fn dial_code(&self) -> String {
        let suffix = self.dial_suffixes.first().map(String::as_str).unwrap_or("");
        format!("{}{}", self.dial_root, suffix)
    }

    pub fn has_dial_code(&self) -> bool {
        !self.dial_root.is_empty() && !self.dial_suffixes.is_empty()
    }
}
