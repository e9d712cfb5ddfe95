//! crates/chat_demo_core/src/session.rs
//!
//! The session store: simulated phone/OTP login and the persisted identity.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::domain::{Country, Identity};
use crate::persistence::{self, IdentityRecord, SessionSnapshot, SESSION_NAMESPACE};
use crate::ports::{CountryDirectory, PortResult, StateStorage};

/// Length of a one-time code.
pub const CODE_LENGTH: usize = 6;

/// Artificial latencies of the simulated code service.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub send_code_delay: Duration,
    pub login_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_code_delay: Duration::from_millis(2000),
            login_delay: Duration::from_millis(1500),
        }
    }
}

#[derive(Default)]
struct SessionState {
    identity: Option<Identity>,
    /// Code requests and verifications currently in flight.
    in_flight: usize,
    countries: Vec<Country>,
}

/// Holds the authenticated identity. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<Mutex<SessionState>>,
    storage: Arc<dyn StateStorage>,
    config: SessionConfig,
}

/// True iff `code` is exactly six ASCII digits.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Keeps countries that have a usable dial code, ordered by display name.
pub fn usable_countries(countries: Vec<Country>) -> Vec<Country> {
    let mut usable: Vec<Country> = countries.into_iter().filter(Country::has_dial_code).collect();
    usable.sort_by_cached_key(|c| c.name.to_lowercase());
    usable
}

impl SessionStore {
    /// Creates the store and rehydrates any persisted identity.
    pub async fn load(storage: Arc<dyn StateStorage>, config: SessionConfig) -> Self {
        let identity = match Self::rehydrate(storage.as_ref()).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Discarding unreadable session state: {}", e);
                None
            }
        };
        if let Some(identity) = &identity {
            info!("Restored session for identity {}", identity.id);
        }

        Self {
            state: Arc::new(Mutex::new(SessionState {
                identity,
                ..SessionState::default()
            })),
            storage,
            config,
        }
    }

    async fn rehydrate(storage: &dyn StateStorage) -> PortResult<Option<Identity>> {
        let Some(payload) = storage.load(SESSION_NAMESPACE).await? else {
            return Ok(None);
        };
        let snapshot: SessionSnapshot = persistence::decode(&payload)?;
        snapshot.user.map(IdentityRecord::to_domain).transpose()
    }

    /// Writes the identity while the guard is held, so writes land in mutation order.
    async fn commit(&self, state: &MutexGuard<'_, SessionState>) {
        let snapshot = SessionSnapshot {
            user: state.identity.as_ref().map(IdentityRecord::from_domain),
        };
        let result = match persistence::encode(&snapshot) {
            Ok(payload) => self.storage.save(SESSION_NAMESPACE, &payload).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!("Failed to persist session state: {}", e);
        }
    }

    async fn begin_work(&self) {
        self.state.lock().await.in_flight += 1;
    }

    fn end_work(state: &mut SessionState) {
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Simulates sending a one-time code. Always succeeds.
    pub async fn request_code(&self, phone: &str, dial_code: &str) -> bool {
        self.begin_work().await;
        tokio::time::sleep(self.config.send_code_delay).await;
        Self::end_work(&mut *self.state.lock().await);
        info!("Issued one-time code to {} {}", dial_code, phone);
        true
    }

    /// Accepts any six-digit code and stores a fresh authenticated identity.
    ///
    /// On rejection the current identity, if any, is left untouched.
    pub async fn verify_and_login(&self, phone: &str, dial_code: &str, code: &str) -> bool {
        self.begin_work().await;
        tokio::time::sleep(self.config.login_delay).await;

        let mut state = self.state.lock().await;
        Self::end_work(&mut state);
        if !is_valid_code(code) {
            warn!("Rejected malformed one-time code for {} {}", dial_code, phone);
            return false;
        }

        let identity = Identity::verified(phone, dial_code);
        state.identity = Some(identity.clone());
        self.commit(&state).await;
        info!("Identity {} logged in", identity.id);
        true
    }

    /// Clears the identity unconditionally.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        let previous = state.identity.take();
        self.commit(&state).await;
        if let Some(identity) = previous {
            info!("Identity {} logged out", identity.id);
        }
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.state.lock().await.identity.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.identity.is_some()
    }

    pub async fn is_busy(&self) -> bool {
        self.state.lock().await.in_flight > 0
    }

    pub async fn countries(&self) -> Vec<Country> {
        self.state.lock().await.countries.clone()
    }

    /// Returns the cached country list, fetching it once from `directory` when empty.
    pub async fn load_countries(&self, directory: &dyn CountryDirectory) -> PortResult<Vec<Country>> {
        {
            let state = self.state.lock().await;
            if !state.countries.is_empty() {
                return Ok(state.countries.clone());
            }
        }

        let countries = usable_countries(directory.fetch_countries().await?);
        info!("Loaded {} countries with dial codes", countries.len());
        self.state.lock().await.countries = countries.clone();
        Ok(countries)
    }
}
