//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{FileStorage, RestCountriesAdapter},
    config::Config,
    error::ApiError,
    web::{
        appearance_handler, countries_handler, create_conversation_handler,
        current_conversation_handler, delete_conversation_handler, get_conversation_handler,
        list_conversations_handler,
        logout_handler, me_handler, older_messages_handler, post_message_handler,
        require_identity, search_handler, select_conversation_handler, send_code_handler,
        state::AppState, status_handler, toggle_appearance_handler, verify_handler,
    },
};
use axum::http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method};
use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open Local Storage & Initialize Adapters ---
    info!("Opening state storage in {}", config.data_dir.display());
    let storage = Arc::new(FileStorage::open(&config.data_dir).await?);
    let countries = Arc::new(RestCountriesAdapter::new(
        reqwest::Client::new(),
        config.countries_url.clone(),
    ));

    // --- 3. Rehydrate the Stores ---
    let app_state = Arc::new(AppState::load(config.clone(), storage, countries).await);
    info!("Stores rehydrated.");

    let allowed_origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!(
            "Invalid ALLOWED_ORIGIN '{}': {}",
            config.allowed_origin, e
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Public routes (no identity required)
    let public_routes = Router::new()
        .route("/auth/send-code", post(send_code_handler))
        .route("/auth/verify", post(verify_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/me", get(me_handler))
        .route("/countries", get(countries_handler))
        .route("/appearance", get(appearance_handler))
        .route("/appearance/toggle", post(toggle_appearance_handler));

    // Protected routes (identity required)
    let protected_routes = Router::new()
        .route(
            "/conversations",
            get(list_conversations_handler).post(create_conversation_handler),
        )
        .route(
            "/conversations/current",
            get(current_conversation_handler).put(select_conversation_handler),
        )
        .route("/conversations/search", put(search_handler))
        .route(
            "/conversations/{id}",
            get(get_conversation_handler).delete(delete_conversation_handler),
        )
        .route("/conversations/{id}/messages", post(post_message_handler))
        .route("/conversations/{id}/older", post(older_messages_handler))
        .route("/status", get(status_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_identity,
        ));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
