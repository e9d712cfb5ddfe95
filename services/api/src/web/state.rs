//! services/api/src/web/state.rs
//!
//! Defines the application's shared state: the three stores plus the collaborators
//! they need, injected into every handler.

use crate::config::Config;
use chat_demo_core::ports::{CountryDirectory, StateStorage};
use chat_demo_core::{AppearanceStore, ConversationStore, SessionStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: SessionStore,
    pub conversations: ConversationStore,
    pub appearance: AppearanceStore,
    pub countries: Arc<dyn CountryDirectory>,
}

impl AppState {
    /// Rehydrates every store from `storage` before the first request is served.
    pub async fn load(
        config: Arc<Config>,
        storage: Arc<dyn StateStorage>,
        countries: Arc<dyn CountryDirectory>,
    ) -> Self {
        let session = SessionStore::load(storage.clone(), config.session.clone()).await;
        let conversations = ConversationStore::load(storage.clone(), config.replies.clone()).await;
        let appearance = AppearanceStore::load(storage).await;
        Self {
            config,
            session,
            conversations,
            appearance,
            countries,
        }
    }
}
