//! crates/chat_demo_core/src/conversation.rs
//!
//! The conversation store: the ordered set of conversations, the current pointer,
//! the search filter, and the simulated assistant that answers every user turn
//! after a randomized delay.
//!
//! Each user message schedules exactly one reply task. Replies are independent of
//! each other: posting twice quickly schedules two timers. Every reply can be
//! cancelled through its [`ReplyHandle`]; deleting a conversation cancels the
//! replies aimed at it, and a reply that still fires for a vanished conversation
//! is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{generate_id, Conversation, Message, NewMessage, Origin};
use crate::persistence::{self, ConversationRecord, ConversationSnapshot, CONVERSATION_NAMESPACE};
use crate::ports::{PortResult, StateStorage};

/// Responses the simulated assistant picks from.
pub const CANNED_REPLIES: [&str; 8] = [
    "I'm Gemini, your AI assistant. How can I help you today?",
    "That's an interesting question! Let me think about that...",
    "I understand what you're asking. Here's my perspective on this topic:",
    "Great question! Based on what you've shared, I'd suggest:",
    "I'm here to help! Could you provide a bit more context so I can give you a better answer?",
    "That's a complex topic. Let me break it down for you:",
    "I appreciate you sharing that with me. Here's what I think:",
    "Thanks for the question! This is something I encounter often, and here's my take:",
];

pub const DEFAULT_TITLE: &str = "General Chat";

/// Size of the synthetic batch returned by [`ConversationStore::load_older_messages`].
pub const OLDER_BATCH_SIZE: usize = 10;

/// Bounds of the randomized assistant reply delay.
#[derive(Debug, Clone)]
pub struct ReplyConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(3000),
        }
    }
}

impl ReplyConfig {
    fn sample_delay(&self, rng: &mut impl Rng) -> Duration {
        let low = self.min_delay.min(self.max_delay).as_millis() as u64;
        let high = self.min_delay.max(self.max_delay).as_millis() as u64;
        Duration::from_millis(rng.gen_range(low..=high))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Conversation title must not be empty")]
    EmptyTitle,
    #[error("The last remaining conversation cannot be deleted")]
    LastConversation,
    #[error("Conversation {0} not found")]
    NotFound(Uuid),
}

/// Cancellation handle for one scheduled assistant reply.
#[derive(Debug, Clone)]
pub struct ReplyHandle {
    id: Uuid,
    conversation_id: Uuid,
    token: CancellationToken,
}

impl ReplyHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    /// Stops the reply from being delivered if it has not fired yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Result of [`ConversationStore::post_message`].
#[derive(Debug)]
pub struct Posted {
    pub message: Message,
    /// Present only for user-authored messages.
    pub reply: Option<ReplyHandle>,
}

struct PendingReply {
    conversation_id: Uuid,
    token: CancellationToken,
}

struct ChatState {
    conversations: Vec<Conversation>,
    current: Option<Uuid>,
    search_filter: String,
    pending: HashMap<Uuid, PendingReply>,
}

impl ChatState {
    fn seeded() -> Self {
        let room = seed_conversation(Utc::now());
        Self {
            current: Some(room.id),
            conversations: vec![room],
            search_filter: String::new(),
            pending: HashMap::new(),
        }
    }

    fn find_mut(&mut self, id: Uuid) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|room| room.id == id)
    }

    fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            chatrooms: self
                .conversations
                .iter()
                .map(ConversationRecord::from_domain)
                .collect(),
            current_chatroom_id: self.current,
        }
    }
}

fn seed_conversation(now: DateTime<Utc>) -> Conversation {
    let mut room = Conversation::new(DEFAULT_TITLE, now - chrono::Duration::days(1));
    let history = [
        (
            "Hi there! I'm your AI assistant Gemini. How can I help you today?",
            Origin::Assistant,
            86_400_000,
        ),
        (
            "Hello! Can you help me with some coding questions?",
            Origin::User,
            86_340_000,
        ),
        (
            "Of course! I'd be happy to help you with coding questions. What specific programming topic or problem would you like assistance with?",
            Origin::Assistant,
            86_330_000,
        ),
    ];
    for (content, origin, ago_ms) in history {
        let message = NewMessage {
            content: content.to_string(),
            origin,
            image: None,
        };
        room.push(message.into_message(now - chrono::Duration::milliseconds(ago_ms)));
    }
    room
}

/// Holds every conversation. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConversationStore {
    state: Arc<Mutex<ChatState>>,
    storage: Arc<dyn StateStorage>,
    config: ReplyConfig,
}

impl ConversationStore {
    /// Creates the store, rehydrating persisted conversations or seeding the default one.
    pub async fn load(storage: Arc<dyn StateStorage>, config: ReplyConfig) -> Self {
        let state = match Self::rehydrate(storage.as_ref()).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                info!("No stored conversations, seeding '{}'", DEFAULT_TITLE);
                ChatState::seeded()
            }
            Err(e) => {
                warn!("Discarding unreadable conversation state: {}", e);
                ChatState::seeded()
            }
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            storage,
            config,
        }
    }

    async fn rehydrate(storage: &dyn StateStorage) -> PortResult<Option<ChatState>> {
        let Some(payload) = storage.load(CONVERSATION_NAMESPACE).await? else {
            return Ok(None);
        };
        let snapshot: ConversationSnapshot = persistence::decode(&payload)?;
        let conversations = snapshot
            .chatrooms
            .into_iter()
            .map(ConversationRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        if conversations.is_empty() {
            return Ok(None);
        }
        Ok(Some(ChatState {
            conversations,
            current: snapshot.current_chatroom_id,
            search_filter: String::new(),
            pending: HashMap::new(),
        }))
    }

    /// Writes the snapshot while the guard is held, so writes land in mutation order.
    async fn commit(&self, state: &MutexGuard<'_, ChatState>) {
        let result = match persistence::encode(&state.snapshot()) {
            Ok(payload) => self.storage.save(CONVERSATION_NAMESPACE, &payload).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!("Failed to persist conversations: {}", e);
        }
    }

    //-------------------------------------------------------------------------------------
    // Mutations
    //-------------------------------------------------------------------------------------

    /// Prepends a new empty conversation and makes it current.
    pub async fn create_conversation(&self, title: &str) -> Result<Conversation, ConversationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ConversationError::EmptyTitle);
        }

        let room = Conversation::new(title, Utc::now());
        let mut state = self.state.lock().await;
        state.conversations.insert(0, room.clone());
        state.current = Some(room.id);
        self.commit(&state).await;
        info!("Created conversation {} '{}'", room.id, room.title);
        Ok(room)
    }

    /// Removes a conversation unless it is the only one left.
    pub async fn delete_conversation(&self, id: Uuid) -> Result<(), ConversationError> {
        let mut state = self.state.lock().await;
        if state.conversations.len() <= 1 {
            return Err(ConversationError::LastConversation);
        }
        let index = state
            .conversations
            .iter()
            .position(|room| room.id == id)
            .ok_or(ConversationError::NotFound(id))?;

        state.conversations.remove(index);
        if state.current == Some(id) {
            state.current = state.conversations.first().map(|room| room.id);
        }

        let orphaned: Vec<Uuid> = state
            .pending
            .iter()
            .filter(|(_, reply)| reply.conversation_id == id)
            .map(|(reply_id, _)| *reply_id)
            .collect();
        for reply_id in orphaned {
            if let Some(reply) = state.pending.remove(&reply_id) {
                reply.token.cancel();
            }
        }

        self.commit(&state).await;
        info!("Deleted conversation {}", id);
        Ok(())
    }

    /// Moves the current pointer. The id is not checked.
    pub async fn select_conversation(&self, id: Uuid) {
        let mut state = self.state.lock().await;
        state.current = Some(id);
        self.commit(&state).await;
    }

    /// Appends a message; a user message also schedules one assistant reply.
    pub async fn post_message(
        &self,
        conversation_id: Uuid,
        new_message: NewMessage,
    ) -> Result<Posted, ConversationError> {
        let origin = new_message.origin;
        let message = new_message.into_message(Utc::now());

        let mut state = self.state.lock().await;
        state
            .find_mut(conversation_id)
            .ok_or(ConversationError::NotFound(conversation_id))?
            .push(message.clone());

        let reply = if origin.is_user() {
            let handle = ReplyHandle {
                id: generate_id(),
                conversation_id,
                token: CancellationToken::new(),
            };
            state.pending.insert(
                handle.id,
                PendingReply {
                    conversation_id,
                    token: handle.token.clone(),
                },
            );
            Some(handle)
        } else {
            None
        };

        self.commit(&state).await;
        drop(state);

        if let Some(handle) = &reply {
            self.schedule_reply(handle.clone());
        }
        Ok(Posted { message, reply })
    }

    fn schedule_reply(&self, handle: ReplyHandle) {
        let (delay, content) = {
            let mut rng = rand::thread_rng();
            let delay = self.config.sample_delay(&mut rng);
            let content = CANNED_REPLIES[rng.gen_range(0..CANNED_REPLIES.len())];
            (delay, content)
        };
        debug!(
            "Assistant reply {} for conversation {} due in {:?}",
            handle.id, handle.conversation_id, delay
        );

        let store = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = handle.token.cancelled() => {
                    store.state.lock().await.pending.remove(&handle.id);
                    debug!("Assistant reply {} cancelled", handle.id);
                }
                _ = tokio::time::sleep(delay) => {
                    store.deliver_reply(&handle, content).await;
                }
            }
        });
    }

    async fn deliver_reply(&self, handle: &ReplyHandle, content: &str) {
        let mut state = self.state.lock().await;
        if state.pending.remove(&handle.id).is_none() || handle.is_cancelled() {
            return;
        }
        let Some(room) = state.find_mut(handle.conversation_id) else {
            debug!(
                "Dropping assistant reply {}: conversation {} no longer exists",
                handle.id, handle.conversation_id
            );
            return;
        };
        room.push(NewMessage::assistant(content).into_message(Utc::now()));
        self.commit(&state).await;
    }

    /// Cancels every outstanding assistant reply.
    pub async fn cancel_pending_replies(&self) {
        let mut state = self.state.lock().await;
        let count = state.pending.len();
        for (_, reply) in state.pending.drain() {
            reply.token.cancel();
        }
        if count > 0 {
            info!("Cancelled {} pending assistant replies", count);
        }
    }

    /// Stores the raw search query; filtering happens on read.
    pub async fn set_search_filter(&self, query: &str) {
        self.state.lock().await.search_filter = query.to_string();
    }

    /// Prepends a synthetic batch of older history.
    ///
    /// Stands in for a real paginated fetch. The batch is oldest-first and ends
    /// before the conversation's earliest message, so repeated loads keep the
    /// whole thread in creation-time order.
    pub async fn load_older_messages(&self, conversation_id: Uuid) -> Result<usize, ConversationError> {
        let mut state = self.state.lock().await;
        let room = state
            .find_mut(conversation_id)
            .ok_or(ConversationError::NotFound(conversation_id))?;

        let mut newest = Utc::now() - chrono::Duration::days(2);
        if let Some(first) = room.messages.first() {
            newest = newest.min(first.timestamp - chrono::Duration::hours(1));
        }
        let older: Vec<Message> = {
            let mut rng = rand::thread_rng();
            (0..OLDER_BATCH_SIZE)
                .map(|i| {
                    let origin = if rng.gen_bool(0.5) {
                        Origin::User
                    } else {
                        Origin::Assistant
                    };
                    let message = NewMessage {
                        content: format!("This is an older message #{}", i + 1),
                        origin,
                        image: None,
                    };
                    let hours_before = (OLDER_BATCH_SIZE - 1 - i) as i64;
                    message.into_message(newest - chrono::Duration::hours(hours_before))
                })
                .collect()
        };

        room.prepend(older);
        self.commit(&state).await;
        Ok(OLDER_BATCH_SIZE)
    }

    //-------------------------------------------------------------------------------------
    // Reads
    //-------------------------------------------------------------------------------------

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().await.conversations.clone()
    }

    pub async fn conversation(&self, id: Uuid) -> Option<Conversation> {
        let state = self.state.lock().await;
        state.conversations.iter().find(|room| room.id == id).cloned()
    }

    pub async fn current_conversation_id(&self) -> Option<Uuid> {
        self.state.lock().await.current
    }

    pub async fn current_conversation(&self) -> Option<Conversation> {
        let state = self.state.lock().await;
        let current = state.current?;
        state.conversations.iter().find(|room| room.id == current).cloned()
    }

    pub async fn search_filter(&self) -> String {
        self.state.lock().await.search_filter.clone()
    }

    /// Conversations whose title contains the search filter, ignoring case.
    pub async fn visible_conversations(&self) -> Vec<Conversation> {
        let state = self.state.lock().await;
        state
            .conversations
            .iter()
            .filter(|room| room.title_matches(&state.search_filter))
            .cloned()
            .collect()
    }

    /// True while at least one assistant reply is pending.
    pub async fn is_composing(&self) -> bool {
        !self.state.lock().await.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MemoryStorage;

    async fn store_with(storage: Arc<MemoryStorage>) -> ConversationStore {
        ConversationStore::load(storage, ReplyConfig::default()).await
    }

    async fn fresh_store() -> ConversationStore {
        store_with(Arc::new(MemoryStorage::new())).await
    }

    async fn count(store: &ConversationStore, id: Uuid) -> usize {
        store.conversation(id).await.unwrap().messages.len()
    }

    /// Past the longest possible reply delay.
    async fn let_replies_fire() {
        tokio::time::sleep(Duration::from_millis(3100)).await;
    }

    #[tokio::test]
    async fn empty_storage_seeds_general_chat() {
        let store = fresh_store().await;
        let rooms = store.conversations().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].title, DEFAULT_TITLE);
        assert_eq!(rooms[0].messages.len(), 3);
        assert_eq!(rooms[0].last_message.as_ref(), rooms[0].messages.last());
        assert_eq!(store.current_conversation_id().await, Some(rooms[0].id));
    }

    #[tokio::test]
    async fn create_trims_prepends_and_selects() {
        let store = fresh_store().await;
        let room = store.create_conversation("  My Chat  ").await.unwrap();

        assert_eq!(room.title, "My Chat");
        assert_eq!(store.conversations().await[0].id, room.id);
        assert_eq!(store.current_conversation_id().await, Some(room.id));
        assert_eq!(
            store.create_conversation("   ").await,
            Err(ConversationError::EmptyTitle)
        );
    }

    #[tokio::test]
    async fn last_conversation_cannot_be_deleted() {
        let store = fresh_store().await;
        let only = store.conversations().await[0].id;

        assert_eq!(
            store.delete_conversation(only).await,
            Err(ConversationError::LastConversation)
        );
        assert_eq!(store.conversations().await.len(), 1);
        assert_eq!(store.current_conversation_id().await, Some(only));
    }

    #[tokio::test]
    async fn deleting_current_moves_pointer_to_first_remaining() {
        let store = fresh_store().await;
        let general = store.conversations().await[0].id;
        let first = store.create_conversation("First").await.unwrap();
        let second = store.create_conversation("Second").await.unwrap();

        store.delete_conversation(second.id).await.unwrap();
        assert_eq!(store.current_conversation_id().await, Some(first.id));

        store.select_conversation(general).await;
        store.delete_conversation(first.id).await.unwrap();
        assert_eq!(store.current_conversation_id().await, Some(general));

        let missing = generate_id();
        store.create_conversation("Third").await.unwrap();
        assert_eq!(
            store.delete_conversation(missing).await,
            Err(ConversationError::NotFound(missing))
        );
    }

    #[tokio::test]
    async fn search_is_a_case_insensitive_projection() {
        let store = fresh_store().await;
        store.create_conversation("Random").await.unwrap();

        store.set_search_filter("gen").await;
        let titles: Vec<_> = store
            .visible_conversations()
            .await
            .into_iter()
            .map(|room| room.title)
            .collect();
        assert_eq!(titles, ["General Chat"]);
        assert_eq!(store.conversations().await.len(), 2);

        store.set_search_filter("").await;
        assert_eq!(store.visible_conversations().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn user_message_gets_exactly_one_reply() {
        let store = fresh_store().await;
        let id = store.create_conversation("Chat").await.unwrap().id;

        let posted = store.post_message(id, NewMessage::user("hello")).await.unwrap();
        assert!(posted.reply.is_some());
        assert_eq!(count(&store, id).await, 1);
        assert!(store.is_composing().await);

        let_replies_fire().await;
        let room = store.conversation(id).await.unwrap();
        assert_eq!(room.messages.len(), 2);
        let reply = &room.messages[1];
        assert_eq!(reply.origin, Origin::Assistant);
        assert!(CANNED_REPLIES.contains(&reply.content.as_str()));
        assert_eq!(room.last_message.as_ref(), Some(reply));
        assert!(!store.is_composing().await);

        let_replies_fire().await;
        assert_eq!(count(&store, id).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_does_not_arrive_before_the_minimum_delay() {
        let store = fresh_store().await;
        let id = store.create_conversation("Chat").await.unwrap().id;
        store.post_message(id, NewMessage::user("hello")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(count(&store, id).await, 1);
        assert!(store.is_composing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn assistant_message_schedules_nothing() {
        let store = fresh_store().await;
        let id = store.create_conversation("Chat").await.unwrap().id;

        let posted = store
            .post_message(id, NewMessage::assistant("noted"))
            .await
            .unwrap();
        assert!(posted.reply.is_none());
        assert!(!store.is_composing().await);

        let_replies_fire().await;
        assert_eq!(count(&store, id).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn two_quick_posts_schedule_two_replies() {
        let store = fresh_store().await;
        let id = store.create_conversation("Chat").await.unwrap().id;
        store.post_message(id, NewMessage::user("one")).await.unwrap();
        store.post_message(id, NewMessage::user("two")).await.unwrap();

        let_replies_fire().await;
        assert_eq!(count(&store, id).await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn composing_holds_while_another_reply_is_pending() {
        let store = fresh_store().await;
        let id = store.create_conversation("Chat").await.unwrap().id;
        let first = store.post_message(id, NewMessage::user("one")).await.unwrap();
        store.post_message(id, NewMessage::user("two")).await.unwrap();

        first.reply.unwrap().cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.is_composing().await);
        assert_eq!(count(&store, id).await, 2);

        let_replies_fire().await;
        assert_eq!(count(&store, id).await, 3);
        assert!(!store.is_composing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_reply_never_arrives() {
        let store = fresh_store().await;
        let id = store.create_conversation("Chat").await.unwrap().id;
        let posted = store
            .post_message(id, NewMessage::user("hello").with_image(Some("data:image/png;base64,AA==".into())))
            .await
            .unwrap();
        assert!(posted.message.image.is_some());

        posted.reply.unwrap().cancel();
        let_replies_fire().await;
        assert_eq!(count(&store, id).await, 1);
        assert!(!store.is_composing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_a_conversation_cancels_its_replies() {
        let store = fresh_store().await;
        let id = store.create_conversation("Doomed").await.unwrap().id;
        let posted = store.post_message(id, NewMessage::user("hello")).await.unwrap();

        store.delete_conversation(id).await.unwrap();
        assert!(posted.reply.unwrap().is_cancelled());
        assert!(!store.is_composing().await);

        let_replies_fire().await;
        assert!(store.conversation(id).await.is_none());
        assert_eq!(store.conversations().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_replies_stops_everything() {
        let store = fresh_store().await;
        let a = store.create_conversation("A").await.unwrap().id;
        let b = store.create_conversation("B").await.unwrap().id;
        store.post_message(a, NewMessage::user("x")).await.unwrap();
        store.post_message(b, NewMessage::user("y")).await.unwrap();

        store.cancel_pending_replies().await;
        let_replies_fire().await;
        assert_eq!(count(&store, a).await, 1);
        assert_eq!(count(&store, b).await, 1);
    }

    #[tokio::test]
    async fn posting_to_unknown_conversation_is_rejected() {
        let store = fresh_store().await;
        let missing = generate_id();
        let err = store
            .post_message(missing, NewMessage::user("hello"))
            .await
            .unwrap_err();
        assert_eq!(err, ConversationError::NotFound(missing));
        assert!(!store.is_composing().await);
    }

    #[tokio::test]
    async fn older_messages_are_prepended() {
        let store = fresh_store().await;
        let room = store.conversations().await.remove(0);

        store.load_older_messages(room.id).await.unwrap();
        let after = store.conversation(room.id).await.unwrap();
        assert_eq!(after.messages.len(), room.messages.len() + OLDER_BATCH_SIZE);
        assert_eq!(after.messages[0].content, "This is an older message #1");
        assert_eq!(after.messages.last(), room.messages.last());
        assert_eq!(after.last_message, room.last_message);

        store.load_older_messages(room.id).await.unwrap();
        let twice = store.conversation(room.id).await.unwrap();
        assert_eq!(twice.messages.len(), room.messages.len() + 2 * OLDER_BATCH_SIZE);
        assert!(twice
            .messages
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn current_conversation_follows_selection() {
        let store = fresh_store().await;
        let general = store.conversations().await[0].id;
        let created = store.create_conversation("Other").await.unwrap();
        assert_eq!(store.current_conversation().await.map(|r| r.id), Some(created.id));

        store.select_conversation(general).await;
        assert_eq!(store.current_conversation().await.map(|r| r.id), Some(general));

        store.select_conversation(generate_id()).await;
        assert!(store.current_conversation().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reload_reproduces_messages_and_instants() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone()).await;
        let id = store.create_conversation("Persisted").await.unwrap().id;
        store.post_message(id, NewMessage::user("hello")).await.unwrap();
        let_replies_fire().await;
        store.set_search_filter("zzz").await;

        let reloaded = store_with(storage).await;
        assert_eq!(reloaded.conversations().await, store.conversations().await);
        assert_eq!(reloaded.current_conversation_id().await, Some(id));
        assert_eq!(reloaded.search_filter().await, "");
    }
}
