//! services/api/src/web/middleware.rs
//!
//! Gate for routes that need a logged-in identity.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::web::state::AppState;

/// Middleware that rejects the request with 401 unless an identity is stored.
///
/// If one is, it is inserted into request extensions for handlers to use.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let identity = state.session.identity().await.ok_or_else(|| {
        debug!("Rejecting {} {}: not logged in", req.method(), req.uri().path());
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
