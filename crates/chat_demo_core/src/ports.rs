//! crates/chat_demo_core/src/ports.rs
//!
//! Defines the service contracts (traits) the stores depend on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of where state is written or where country data comes from.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::Country;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Malformed stored state: {0}")]
    Serialization(String),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

impl From<serde_json::Error> for PortError {
    fn from(e: serde_json::Error) -> Self {
        PortError::Serialization(e.to_string())
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable key/value storage, one opaque text payload per namespace.
///
/// Writes are last-write-wins; there is no conflict resolution.
#[async_trait]
pub trait StateStorage: Send + Sync {
    async fn load(&self, namespace: &str) -> PortResult<Option<String>>;

    async fn save(&self, namespace: &str, payload: &str) -> PortResult<()>;

    async fn remove(&self, namespace: &str) -> PortResult<()>;
}

/// Third-party lookup of country metadata for the dial-code picker.
#[async_trait]
pub trait CountryDirectory: Send + Sync {
    async fn fetch_countries(&self) -> PortResult<Vec<Country>>;
}

//=========================================================================================
// In-Memory Storage
//=========================================================================================

/// A `StateStorage` that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> PortResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| PortError::Storage("memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl StateStorage for MemoryStorage {
    async fn load(&self, namespace: &str) -> PortResult<Option<String>> {
        Ok(self.entries()?.get(namespace).cloned())
    }

    async fn save(&self, namespace: &str, payload: &str) -> PortResult<()> {
        self.entries()?
            .insert(namespace.to_string(), payload.to_string());
        Ok(())
    }

    async fn remove(&self, namespace: &str) -> PortResult<()> {
        self.entries()?.remove(namespace);
        Ok(())
    }
}
