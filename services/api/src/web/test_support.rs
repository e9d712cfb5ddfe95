//! Shared fixtures for handler tests.

use async_trait::async_trait;
use axum::response::Response;
use chat_demo_core::domain::Country;
use chat_demo_core::ports::{CountryDirectory, MemoryStorage, PortResult};
use chat_demo_core::{ReplyConfig, SessionConfig};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::web::state::AppState;

pub struct StaticDirectory;

fn country(name: &str, code: &str, root: &str, suffixes: &[&str]) -> Country {
    Country {
        name: name.to_string(),
        flag: String::new(),
        code: code.to_string(),
        dial_root: root.to_string(),
        dial_suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
    }
}

#[async_trait]
impl CountryDirectory for StaticDirectory {
    async fn fetch_countries(&self) -> PortResult<Vec<Country>> {
        Ok(vec![
            country("Sweden", "SE", "+4", &["6"]),
            country("Bouvet Island", "BV", "", &[]),
            country("Brazil", "BR", "+5", &["5"]),
        ])
    }
}

/// App state over in-memory storage with every simulated delay at zero.
pub async fn test_state() -> Arc<AppState> {
    let mut config = Config::from_lookup(|_| None).expect("default config");
    config.session = SessionConfig {
        send_code_delay: Duration::ZERO,
        login_delay: Duration::ZERO,
    };
    config.replies = ReplyConfig {
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };

    Arc::new(
        AppState::load(
            Arc::new(config),
            Arc::new(MemoryStorage::new()),
            Arc::new(StaticDirectory),
        )
        .await,
    )
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    serde_json::from_slice(&bytes).expect("json body")
}
