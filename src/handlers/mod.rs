//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `realtime` - Session offers, quota status and the relay WebSocket

pub mod api;
pub mod realtime;

pub use realtime::{create_offer, limit_status, realtime_ws_handler};
