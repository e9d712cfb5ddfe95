//! services/api/src/web/auth.rs
//!
//! Simulated phone/OTP authentication endpoints and the country lookup that feeds
//! the dial-code picker.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{error, info};

use crate::web::protocol::{
    CountryResponse, IdentityResponse, SendCodeRequest, SendCodeResponse, VerifyRequest,
};
use crate::web::state::AppState;

/// POST /auth/send-code - Simulate sending a one-time code
#[utoipa::path(
    post,
    path = "/auth/send-code",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code issued", body = SendCodeResponse)
    )
)]
pub async fn send_code_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendCodeRequest>,
) -> impl IntoResponse {
    let sent = state.session.request_code(&req.phone, &req.dial_code).await;
    Json(SendCodeResponse { sent })
}

/// POST /auth/verify - Verify the code and log in
#[utoipa::path(
    post,
    path = "/auth/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Login successful", body = IdentityResponse),
        (status = 401, description = "Invalid OTP")
    )
)]
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !state
        .session
        .verify_and_login(&req.phone, &req.dial_code, &req.code)
        .await
    {
        return Err((StatusCode::UNAUTHORIZED, "Invalid OTP".to_string()));
    }

    let identity = state.session.identity().await.ok_or_else(|| {
        error!("Login succeeded but no identity is stored");
        (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
    })?;
    Ok(Json(IdentityResponse::from(identity)))
}

/// POST /auth/logout - Clear the identity and stop pending assistant replies
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful")
    )
)]
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.logout().await;
    state.conversations.cancel_pending_replies().await;
    StatusCode::OK
}

/// GET /auth/me - The current identity
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Logged in", body = IdentityResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .session
        .identity()
        .await
        .map(|identity| Json(IdentityResponse::from(identity)))
        .ok_or((StatusCode::UNAUTHORIZED, "Not logged in".to_string()))
}

/// GET /countries - Countries with a dial code, sorted by name
#[utoipa::path(
    get,
    path = "/countries",
    responses(
        (status = 200, description = "Country list", body = [CountryResponse]),
        (status = 502, description = "Country lookup failed")
    )
)]
pub async fn countries_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let countries = state
        .session
        .load_countries(state.countries.as_ref())
        .await
        .map_err(|e| {
            error!("Failed to load countries: {:?}", e);
            (StatusCode::BAD_GATEWAY, "Failed to load countries".to_string())
        })?;
    info!("Serving {} countries", countries.len());

    let body: Vec<CountryResponse> = countries.into_iter().map(CountryResponse::from).collect();
    Ok(Json(body))
}
