//! Session creation and quota status endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{info, warn};

use super::identity::{resolve_client_identity, with_identity_cookie};
use super::messages::{LimitStatus, OfferAnswer, OfferRequest};
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Create a relay session for the calling client.
///
/// Rejected with 429 before any upstream connection is attempted if the
/// client has no quota left.
pub async fn create_offer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(offer): Json<OfferRequest>,
) -> Response {
    let identity = resolve_client_identity(&headers);
    let response = match create_session(&state, &identity.client_id, offer).await {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => e.into_response(),
    };
    with_identity_cookie(response, &identity, &state.config)
}

async fn create_session(
    state: &AppState,
    client_id: &str,
    offer: OfferRequest,
) -> AppResult<OfferAnswer> {
    if state.usage.is_exhausted(client_id) {
        warn!(client_id = %client_id, "Offer rejected, usage limit reached");
        return Err(AppError::LimitExceeded);
    }

    let model = offer
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.default_model.clone());
    let voice = offer
        .voice
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| state.config.default_voice.clone());

    let session = state
        .sessions
        .create(client_id, &model, &voice)
        .await
        .map_err(AppError::SessionCreation)?;

    info!(
        session_id = %session.id(),
        client_id = %client_id,
        "Realtime session created"
    );
    Ok(OfferAnswer::connected(session.id().to_string(), offer.sdp))
}

/// Report whether the calling client has exhausted its quota.
///
/// Never creates a usage entry for unseen clients.
pub async fn limit_status(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let identity = resolve_client_identity(&headers);
    let status = LimitStatus {
        limit_reached: state.usage.is_exhausted(&identity.client_id),
        consumed_ms: state.usage.consumed(&identity.client_id),
        quota_ms: state.usage.quota_ms(),
    };
    with_identity_cookie(Json(status).into_response(), &identity, &state.config)
}
