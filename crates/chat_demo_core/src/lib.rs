pub mod appearance;
pub mod conversation;
pub mod domain;
pub mod persistence;
pub mod ports;
pub mod session;

pub use appearance::AppearanceStore;
pub use conversation::{ConversationError, ConversationStore, Posted, ReplyConfig, ReplyHandle};
pub use domain::{Conversation, ConversationSummary, Country, Identity, Message, NewMessage, Origin};
pub use ports::{CountryDirectory, MemoryStorage, PortError, PortResult, StateStorage};
pub use session::{SessionConfig, SessionStore};
