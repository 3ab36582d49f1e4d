//! Realtime relay route configuration

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::{create_offer, limit_status, realtime_ws_handler};
use crate::state::AppState;
use std::sync::Arc;

/// Create the realtime relay router
///
/// # Endpoints
///
/// - `POST /api/realtime/offer` - create a session, answers with its id
/// - `GET /api/realtime/limit` - `{"limit_reached": bool, ...}` for the caller
/// - `GET /api/realtime/ws/{session_id}` - WebSocket upgrade onto a session
///
/// # Example
///
/// ```json
/// // POST /api/realtime/offer
/// {"sdp": "v=0...", "voice": "shimmer"}
///
/// // 200 OK
/// {"session_id": "...", "type": "answer", "sdp": "v=0...", "status": "connected"}
///
/// // 429 Too Many Requests
/// {"type": "error", "code": "LIMIT_REACHED", "error": "Time usage limit exceeded."}
/// ```
pub fn create_realtime_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/realtime/offer", post(create_offer))
        .route("/api/realtime/limit", get(limit_status))
        .route("/api/realtime/ws/{session_id}", get(realtime_ws_handler))
        .layer(TraceLayer::new_for_http())
}
