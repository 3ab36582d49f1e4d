//! Realtime WebSocket handler
//!
//! Attaches a browser WebSocket to an existing relay session. The socket
//! carries base64 audio and `stop_speaking` from the browser, and relayed
//! upstream events back to it.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::realtime::RealtimeError;
use crate::core::session::{ClientRoute, Session};
use crate::state::AppState;

use super::messages::{RealtimeIncomingMessage, RealtimeMessageRoute, RealtimeOutgoingMessage};

/// Buffered events between the relay and the socket writer
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// How long the writer gets to flush queued frames after the session ends
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Realtime WebSocket handler
///
/// Upgrades `GET /api/realtime/ws/{session_id}`. Unknown session ids receive a
/// single `NOT_FOUND` error and the socket is closed.
pub async fn realtime_ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!(session_id = %session_id, "Realtime WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_realtime_socket(socket, state, session_id))
}

async fn reject_socket(mut socket: WebSocket, message: RealtimeOutgoingMessage) {
    match serde_json::to_string(&message) {
        Ok(json) => {
            if let Err(e) = socket.send(Message::Text(json.into())).await {
                debug!("Failed to send rejection: {}", e);
            }
        }
        Err(e) => error!("Failed to serialize rejection: {}", e),
    }
    let _ = socket.send(Message::Close(None)).await;
}

async fn handle_realtime_socket(socket: WebSocket, app_state: Arc<AppState>, session_id: String) {
    let session = match app_state.sessions.get(&session_id) {
        Ok(session) => session,
        Err(_) => {
            warn!(session_id = %session_id, "WebSocket attached to unknown session");
            reject_socket(
                socket,
                RealtimeOutgoingMessage::error("NOT_FOUND", "Session not found"),
            )
            .await;
            return;
        }
    };

    let (link_tx, mut link_rx) = mpsc::channel::<ClientRoute>(CHANNEL_BUFFER_SIZE);
    if let Err(e) = session.attach_client(&link_tx) {
        warn!(session_id = %session_id, error = %e, "Session not accepting clients");
        reject_socket(
            socket,
            RealtimeOutgoingMessage::error("NOT_FOUND", "Session not found"),
        )
        .await;
        return;
    }

    info!(session_id = %session_id, "Realtime WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();

    // Sender task for outgoing messages
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = link_rx.recv().await {
            let result = match RealtimeMessageRoute::from(route) {
                RealtimeMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                RealtimeMessageRoute::Close => {
                    debug!("Closing realtime WebSocket connection");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    loop {
        match receiver.next().await {
            Some(Ok(msg)) => {
                if !process_realtime_message(msg, &session, &link_tx).await {
                    break;
                }
            }
            Some(Err(e)) => {
                warn!(session_id = %session_id, "Realtime WebSocket error: {}", e);
                break;
            }
            None => {
                info!(session_id = %session_id, "Realtime WebSocket connection closed by client");
                break;
            }
        }
    }

    // Cleanup
    drop(session);
    app_state.sessions.remove(&session_id).await;
    drop(link_tx);
    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        debug!(session_id = %session_id, "WebSocket writer did not drain in time");
        sender_task.abort();
    }

    info!(session_id = %session_id, "Realtime WebSocket connection terminated");
}

async fn send_error(link: &mpsc::Sender<ClientRoute>, code: &str, message: String) {
    let event = crate::core::realtime::RealtimeEvent::error(code, message);
    if link.send(ClientRoute::Event(event)).await.is_err() {
        debug!("Client link closed before error could be sent");
    }
}

/// Whether the socket should keep running after a failed forward.
async fn forward_result(
    result: Result<(), RealtimeError>,
    session: &Session,
    link: &mpsc::Sender<ClientRoute>,
) -> bool {
    match result {
        Ok(()) => true,
        Err(RealtimeError::InvalidPayload(reason)) => {
            send_error(link, "INVALID_AUDIO", format!("Invalid audio payload: {reason}")).await;
            true
        }
        Err(e) => {
            warn!(session_id = %session.id(), error = %e, "Failed to forward client input");
            false
        }
    }
}

/// Process incoming WebSocket message
async fn process_realtime_message(
    msg: Message,
    session: &Session,
    link: &mpsc::Sender<ClientRoute>,
) -> bool {
    match msg {
        Message::Text(text) => {
            let incoming: RealtimeIncomingMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    debug!("Failed to parse realtime message: {}", e);
                    send_error(link, "INVALID_MESSAGE", format!("Invalid message format: {e}"))
                        .await;
                    return true;
                }
            };

            if let Err(e) = incoming.validate_size() {
                send_error(link, "INVALID_MESSAGE", e).await;
                return true;
            }

            match incoming {
                RealtimeIncomingMessage::Audio { audio } => {
                    if audio.is_empty() {
                        return true;
                    }
                    let result = session.send_audio_from_client(&audio).await;
                    forward_result(result, session, link).await
                }
                RealtimeIncomingMessage::StopSpeaking => {
                    debug!(session_id = %session.id(), "Learner stopped speaking");
                    let result = session.commit_and_request_response().await;
                    forward_result(result, session, link).await
                }
                RealtimeIncomingMessage::Unknown => {
                    debug!("Ignoring unknown realtime message type");
                    true
                }
            }
        }
        Message::Binary(data) => {
            if data.is_empty() {
                return true;
            }
            let result = session.send_pcm_from_client(Bytes::from(data)).await;
            forward_result(result, session, link).await
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!(session_id = %session.id(), "Realtime WebSocket close received");
            false
        }
    }
}
