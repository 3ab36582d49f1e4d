//! Realtime relay handlers
//!
//! # Endpoints
//!
//! - `POST /api/realtime/offer` - create a session for the calling client
//! - `GET /api/realtime/limit` - report whether the client's quota is used up
//! - `GET /api/realtime/ws/{session_id}` - WebSocket attached to a session
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **audio**: `{"type":"audio","audio":"<base64 pcm16>"}`
//! - **stop_speaking**: commit the learner's turn and request a reply
//! - **Binary frames**: raw PCM16 audio
//!
//! ## Server → Client
//!
//! - **audio**: base64 synthesized audio
//! - **ai_transcript** / **user_transcript**: transcript deltas
//! - **response_started** / **response_done**: response lifecycle
//! - **error**: `{"type":"error","code":...,"message":...}`

mod handler;
pub mod identity;
pub mod messages;
mod offer;

pub use handler::realtime_ws_handler;
pub use offer::{create_offer, limit_status};
