pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export the handlers so the binary can build the router from one place.
pub use auth::{countries_handler, logout_handler, me_handler, send_code_handler, verify_handler};
pub use middleware::require_identity;
pub use rest::{
    appearance_handler, create_conversation_handler, current_conversation_handler, delete_conversation_handler,
    get_conversation_handler, list_conversations_handler, older_messages_handler,
    post_message_handler, search_handler, select_conversation_handler, status_handler,
    toggle_appearance_handler,
};
