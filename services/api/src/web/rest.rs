//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the conversation and appearance endpoints and the
//! master definition for the OpenAPI specification.

use crate::web::protocol::{
    AppearanceResponse, ConversationListResponse, ConversationResponse,
    ConversationSummaryResponse, CountryResponse, CreateConversationRequest, IdentityResponse,
    MessageResponse, OlderMessagesResponse, OriginBody, PostMessageRequest, PostMessageResponse,
    SearchParams, SearchRequest, SelectConversationRequest, SendCodeRequest, SendCodeResponse,
    StatusResponse, VerifyRequest,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chat_demo_core::{ConversationError, NewMessage};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::send_code_handler,
        crate::web::auth::verify_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::me_handler,
        crate::web::auth::countries_handler,
        list_conversations_handler,
        create_conversation_handler,
        get_conversation_handler,
        current_conversation_handler,
        delete_conversation_handler,
        select_conversation_handler,
        search_handler,
        post_message_handler,
        older_messages_handler,
        status_handler,
        appearance_handler,
        toggle_appearance_handler,
    ),
    components(
        schemas(
            SendCodeRequest, SendCodeResponse, VerifyRequest, IdentityResponse,
            CountryResponse, CreateConversationRequest, SelectConversationRequest,
            SearchRequest, PostMessageRequest, PostMessageResponse, MessageResponse,
            OriginBody, ConversationResponse, ConversationSummaryResponse,
            ConversationListResponse, OlderMessagesResponse, StatusResponse,
            AppearanceResponse
        )
    ),
    tags(
        (name = "Chat Demo API", description = "Simulated OTP login, conversations and canned assistant replies.")
    )
)]
pub struct ApiDoc;

/// Maps store rejections onto HTTP statuses.
fn conversation_error(e: ConversationError) -> (StatusCode, String) {
    let status = match e {
        ConversationError::EmptyTitle => StatusCode::BAD_REQUEST,
        ConversationError::LastConversation => StatusCode::CONFLICT,
        ConversationError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    warn!("Conversation request rejected: {}", e);
    (status, e.to_string())
}

/// Largest accepted image attachment, in decoded bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

fn bad_request(reason: &str) -> (StatusCode, String) {
    warn!("Message rejected: {}", reason);
    (StatusCode::BAD_REQUEST, reason.to_string())
}

/// Checks that an attachment is a base64 `data:image/*` URL within the size limit.
fn check_image(image: &str) -> Result<(), (StatusCode, String)> {
    let (header, data) = image
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| bad_request("Attachment must be an image data URL"))?;
    if !header.ends_with(";base64") {
        return Err(bad_request("Image data must be base64 encoded"));
    }

    let bytes = BASE64_STANDARD
        .decode(data)
        .map_err(|_| bad_request("Image data is not valid base64"))?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(bad_request("Image must be 5MB or smaller"));
    }
    Ok(())
}

/// Turns a composer submission into a user message: trimmed text, optional image.
fn compose_user_message(req: PostMessageRequest) -> Result<NewMessage, (StatusCode, String)> {
    let content = req.content.trim();
    if content.is_empty() && req.image.is_none() {
        return Err(bad_request("Message must have text or an image"));
    }
    if let Some(image) = &req.image {
        check_image(image)?;
    }
    Ok(NewMessage::user(content).with_image(req.image))
}

//=========================================================================================
// Conversation Handlers
//=========================================================================================

/// List conversations matching the stored search filter.
#[utoipa::path(
    get,
    path = "/conversations",
    params(SearchParams),
    responses(
        (status = 200, description = "Visible conversations", body = ConversationListResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_conversations_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let store = &state.conversations;
    if let Some(q) = params.q {
        store.set_search_filter(&q).await;
    }

    let conversations = store
        .visible_conversations()
        .await
        .iter()
        .map(|room| ConversationSummaryResponse::from(room.summary()))
        .collect();
    Json(ConversationListResponse {
        current_id: store.current_conversation_id().await,
        search_filter: store.search_filter().await,
        conversations,
    })
}

/// Create a conversation; it becomes the current one.
#[utoipa::path(
    post,
    path = "/conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = ConversationResponse),
        (status = 400, description = "Empty title")
    )
)]
pub async fn create_conversation_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let room = state
        .conversations
        .create_conversation(&req.title)
        .await
        .map_err(conversation_error)?;
    Ok((StatusCode::CREATED, Json(ConversationResponse::from(room))))
}

/// Fetch one conversation with its messages.
#[utoipa::path(
    get,
    path = "/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation", body = ConversationResponse),
        (status = 404, description = "Unknown conversation")
    )
)]
pub async fn get_conversation_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .conversations
        .conversation(id)
        .await
        .map(|room| Json(ConversationResponse::from(room)))
        .ok_or_else(|| conversation_error(ConversationError::NotFound(id)))
}

/// Fetch the current conversation.
#[utoipa::path(
    get,
    path = "/conversations/current",
    responses(
        (status = 200, description = "Current conversation", body = ConversationResponse),
        (status = 404, description = "No current conversation")
    )
)]
pub async fn current_conversation_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .conversations
        .current_conversation()
        .await
        .map(|room| Json(ConversationResponse::from(room)))
        .ok_or((StatusCode::NOT_FOUND, "No current conversation".to_string()))
}

/// Delete a conversation. The last one cannot be deleted.
#[utoipa::path(
    delete,
    path = "/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Unknown conversation"),
        (status = 409, description = "Last remaining conversation")
    )
)]
pub async fn delete_conversation_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .conversations
        .delete_conversation(id)
        .await
        .map_err(conversation_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Make a conversation current.
#[utoipa::path(
    put,
    path = "/conversations/current",
    request_body = SelectConversationRequest,
    responses((status = 204, description = "Selected"))
)]
pub async fn select_conversation_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectConversationRequest>,
) -> impl IntoResponse {
    state.conversations.select_conversation(req.id).await;
    StatusCode::NO_CONTENT
}

/// Replace the stored search filter.
#[utoipa::path(
    put,
    path = "/conversations/search",
    request_body = SearchRequest,
    responses((status = 204, description = "Filter stored"))
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    state.conversations.set_search_filter(&req.query).await;
    StatusCode::NO_CONTENT
}

/// Post a user message. One assistant reply follows after a short random delay.
#[utoipa::path(
    post,
    path = "/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = PostMessageResponse),
        (status = 400, description = "Empty message or unacceptable image"),
        (status = 404, description = "Unknown conversation")
    )
)]
pub async fn post_message_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let message = compose_user_message(req)?;
    let posted = state
        .conversations
        .post_message(id, message)
        .await
        .map_err(conversation_error)?;

    let response = PostMessageResponse {
        message: MessageResponse::from(posted.message),
        reply_id: posted.reply.map(|handle| handle.id()),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Prepend a batch of older history.
#[utoipa::path(
    post,
    path = "/conversations/{id}/older",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "History loaded", body = OlderMessagesResponse),
        (status = 404, description = "Unknown conversation")
    )
)]
pub async fn older_messages_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let loaded = state
        .conversations
        .load_older_messages(id)
        .await
        .map_err(conversation_error)?;
    Ok(Json(OlderMessagesResponse { loaded }))
}

/// Whether an assistant reply or a login step is pending.
#[utoipa::path(
    get,
    path = "/status",
    responses((status = 200, description = "Activity flags", body = StatusResponse))
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        composing: state.conversations.is_composing().await,
        busy: state.session.is_busy().await,
    })
}

//=========================================================================================
// Appearance Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/appearance",
    responses((status = 200, description = "Current appearance", body = AppearanceResponse))
)]
pub async fn appearance_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(AppearanceResponse {
        dark: state.appearance.is_dark().await,
    })
}

#[utoipa::path(
    post,
    path = "/appearance/toggle",
    responses((status = 200, description = "Toggled appearance", body = AppearanceResponse))
)]
pub async fn toggle_appearance_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dark = state.appearance.toggle().await;
    info!("Appearance set to {}", if dark { "dark" } else { "light" });
    Json(AppearanceResponse { dark })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support::{body_json, test_state};
    use std::time::Duration;

    async fn create(state: &Arc<AppState>, title: &str) -> Uuid {
        let response = create_conversation_handler(
            State(state.clone()),
            Json(CreateConversationRequest {
                title: title.to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn list_applies_the_query_filter() {
        let state = test_state().await;
        create(&state, "Random").await;

        let response = list_conversations_handler(
            State(state.clone()),
            Query(SearchParams {
                q: Some("GEN".to_string()),
            }),
        )
        .await
        .into_response();
        let body = body_json(response).await;
        let rooms = body["conversations"].as_array().unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0]["title"], "General Chat");
        assert_eq!(body["search_filter"], "GEN");
    }

    #[tokio::test]
    async fn deleting_the_last_conversation_conflicts() {
        let state = test_state().await;
        let only = state.conversations.conversations().await[0].id;

        let response = delete_conversation_handler(State(state.clone()), Path(only))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let extra = create(&state, "Extra").await;
        let response = delete_conversation_handler(State(state.clone()), Path(Uuid::new_v4()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = delete_conversation_handler(State(state.clone()), Path(extra))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.conversations.conversations().await.len(), 1);
    }

    #[tokio::test]
    async fn blank_title_is_a_bad_request() {
        let state = test_state().await;
        let response = create_conversation_handler(
            State(state),
            Json(CreateConversationRequest {
                title: "  ".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn posted_message_is_answered() {
        let state = test_state().await;
        let id = create(&state, "Chat").await;

        let response = post_message_handler(
            State(state.clone()),
            Path(id),
            Json(PostMessageRequest {
                content: "hello".to_string(),
                image: None,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["message"]["origin"], "user");
        assert!(body["reply_id"].is_string());

        tokio::time::sleep(Duration::from_millis(10)).await;
        let response = get_conversation_handler(State(state.clone()), Path(id))
            .await
            .into_response();
        let body = body_json(response).await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["last_message"]["origin"], "assistant");

        let status = body_json(status_handler(State(state)).await.into_response()).await;
        assert_eq!(status["composing"], false);
    }

    async fn post(
        state: &Arc<AppState>,
        id: Uuid,
        content: &str,
        image: Option<String>,
    ) -> axum::response::Response {
        post_message_handler(
            State(state.clone()),
            Path(id),
            Json(PostMessageRequest {
                content: content.to_string(),
                image,
            }),
        )
        .await
        .into_response()
    }

    fn png_data_url(len: usize) -> String {
        format!("data:image/png;base64,{}", BASE64_STANDARD.encode(vec![0u8; len]))
    }

    #[tokio::test(start_paused = true)]
    async fn posted_content_is_trimmed() {
        let state = test_state().await;
        let id = create(&state, "Chat").await;

        let response = post(&state, id, "  hi there \n", None).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["message"]["content"], "hi there");
    }

    #[tokio::test(start_paused = true)]
    async fn blank_post_without_image_is_rejected() {
        let state = test_state().await;
        let id = create(&state, "Chat").await;

        let response = post(&state, id, "   ", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.conversations.conversation(id).await.unwrap().messages.is_empty());
        assert!(!state.conversations.is_composing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn image_only_post_is_accepted() {
        let state = test_state().await;
        let id = create(&state, "Chat").await;

        let response = post(&state, id, "", Some(png_data_url(16))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["message"]["content"], "");
        assert!(body["message"]["image"].as_str().unwrap().starts_with("data:image/png"));
    }

    #[tokio::test]
    async fn non_image_attachment_is_rejected() {
        let state = test_state().await;
        let id = create(&state, "Chat").await;

        for image in [
            "data:text/plain;base64,aGVsbG8=".to_string(),
            "not a data url".to_string(),
            "data:image/png,rawbytes".to_string(),
            "data:image/png;base64,@@@".to_string(),
        ] {
            let response = post(&state, id, "look", Some(image)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert!(state.conversations.conversation(id).await.unwrap().messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn image_size_limit_is_five_megabytes() {
        let state = test_state().await;
        let id = create(&state, "Chat").await;

        let too_big = post(&state, id, "big", Some(png_data_url(MAX_IMAGE_BYTES + 1))).await;
        assert_eq!(too_big.status(), StatusCode::BAD_REQUEST);

        let at_limit = post(&state, id, "ok", Some(png_data_url(MAX_IMAGE_BYTES))).await;
        assert_eq!(at_limit.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn current_conversation_tracks_the_pointer() {
        let state = test_state().await;
        create(&state, "Fresh").await;

        let response = current_conversation_handler(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["title"], "Fresh");

        select_conversation_handler(
            State(state.clone()),
            Json(SelectConversationRequest { id: Uuid::new_v4() }),
        )
        .await;
        let response = current_conversation_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let state = test_state().await;
        let missing = Uuid::new_v4();

        let response = get_conversation_handler(State(state.clone()), Path(missing))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = older_messages_handler(State(state), Path(missing))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn appearance_toggles() {
        let state = test_state().await;
        let before = body_json(appearance_handler(State(state.clone())).await.into_response()).await;
        assert_eq!(before["dark"], false);

        let after =
            body_json(toggle_appearance_handler(State(state)).await.into_response()).await;
        assert_eq!(after["dark"], true);
    }

    #[test]
    fn openapi_lists_the_conversation_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/conversations/{id}/messages"));
        assert!(doc.paths.paths.contains_key("/auth/verify"));
        assert!(doc.paths.paths.contains_key("/conversations/current"));
    }
}
