//! services/api/src/adapters/file_storage.rs
//!
//! This module contains the file-backed storage adapter, the concrete implementation
//! of the `StateStorage` port from the `core` crate. Each namespace is one JSON
//! file under the data directory.

use async_trait::async_trait;
use chat_demo_core::ports::{PortError, PortResult, StateStorage};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A storage adapter that implements the `StateStorage` port on the local filesystem.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Creates a new `FileStorage`, creating the data directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> PortResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| PortError::Storage(format!("{}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    fn path_for(&self, namespace: &str) -> PortResult<PathBuf> {
        let valid = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PortError::Storage(format!("invalid namespace '{}'", namespace)));
        }
        Ok(self.root.join(format!("{}.json", namespace)))
    }
}

//=========================================================================================
// `StateStorage` Trait Implementation
//=========================================================================================

#[async_trait]
impl StateStorage for FileStorage {
    async fn load(&self, namespace: &str) -> PortResult<Option<String>> {
        let path = self.path_for(namespace)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Storage(format!("{}: {}", path.display(), e))),
        }
    }

    /// Writes to a sibling temp file and renames it over the target.
    async fn save(&self, namespace: &str, payload: &str) -> PortResult<()> {
        let path = self.path_for(namespace)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|e| PortError::Storage(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PortError::Storage(format!("{}: {}", path.display(), e)))
    }

    async fn remove(&self, namespace: &str) -> PortResult<()> {
        let path = self.path_for(namespace)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Storage(format!("{}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_demo_core::{ConversationStore, NewMessage, ReplyConfig};
    use std::sync::Arc;

    #[tokio::test]
    async fn missing_namespace_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        assert!(storage.load("chat-storage").await.unwrap().is_none());
        storage.remove("chat-storage").await.unwrap();
    }

    #[tokio::test]
    async fn save_overwrites_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("nested")).await.unwrap();

        storage.save("theme-storage", "one").await.unwrap();
        storage.save("theme-storage", "two").await.unwrap();
        assert_eq!(
            storage.load("theme-storage").await.unwrap().as_deref(),
            Some("two")
        );
        assert!(!dir.path().join("nested/theme-storage.json.tmp").exists());
    }

    #[tokio::test]
    async fn namespaces_cannot_escape_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        assert!(storage.save("../outside", "x").await.is_err());
        assert!(storage.load("").await.is_err());
    }

    #[tokio::test]
    async fn conversations_survive_a_restart_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn StateStorage> = Arc::new(FileStorage::open(dir.path()).await.unwrap());
        let store = ConversationStore::load(storage.clone(), ReplyConfig::default()).await;
        let id = store.create_conversation("On disk").await.unwrap().id;
        store
            .post_message(id, NewMessage::assistant("kept"))
            .await
            .unwrap();

        let reopened: Arc<dyn StateStorage> = Arc::new(FileStorage::open(dir.path()).await.unwrap());
        let reloaded = ConversationStore::load(reopened, ReplyConfig::default()).await;
        assert_eq!(reloaded.conversations().await, store.conversations().await);
    }
}
