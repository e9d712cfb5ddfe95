//! crates/chat_demo_core/src/appearance.rs
//!
//! Dark/light appearance flag.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::persistence::{self, AppearanceSnapshot, APPEARANCE_NAMESPACE};
use crate::ports::{PortResult, StateStorage};

#[derive(Clone)]
pub struct AppearanceStore {
    is_dark: Arc<Mutex<bool>>,
    storage: Arc<dyn StateStorage>,
}

impl AppearanceStore {
    pub async fn load(storage: Arc<dyn StateStorage>) -> Self {
        let is_dark = match Self::rehydrate(storage.as_ref()).await {
            Ok(is_dark) => is_dark,
            Err(e) => {
                warn!("Discarding unreadable appearance state: {}", e);
                false
            }
        };
        Self {
            is_dark: Arc::new(Mutex::new(is_dark)),
            storage,
        }
    }

    async fn rehydrate(storage: &dyn StateStorage) -> PortResult<bool> {
        match storage.load(APPEARANCE_NAMESPACE).await? {
            Some(payload) => Ok(persistence::decode::<AppearanceSnapshot>(&payload)?.is_dark),
            None => Ok(false),
        }
    }

    pub async fn is_dark(&self) -> bool {
        *self.is_dark.lock().await
    }

    /// Flips the flag and returns the new value.
    pub async fn toggle(&self) -> bool {
        let mut is_dark = self.is_dark.lock().await;
        *is_dark = !*is_dark;

        let snapshot = AppearanceSnapshot { is_dark: *is_dark };
        let result = match persistence::encode(&snapshot) {
            Ok(payload) => self.storage.save(APPEARANCE_NAMESPACE, &payload).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!("Failed to persist appearance: {}", e);
        }
        *is_dark
    }
}
