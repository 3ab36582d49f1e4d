//! Upstream-to-client relay loop.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{Delivery, Session};
use crate::core::realtime::{AudioParams, EventStream, RealtimeEvent, StreamItem};

tokio::task_local! {
    /// Id of the session whose relay task is currently running.
    pub(super) static RELAY_SESSION: String;
}

/// Error code sent to the client when the upstream connection fails.
pub const UPSTREAM_ERROR_CODE: &str = "UPSTREAM_ERROR";

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Stop,
}

/// Consume upstream events until the stream ends, the quota runs out, or the
/// client link goes away, then close the session.
pub(super) async fn run(session: Arc<Session>, mut events: EventStream) {
    let params = session.upstream.audio_params();
    debug!(session_id = %session.id, "Relay started");

    loop {
        let step = match events.next().await {
            StreamItem::Event(event) => relay_event(&session, event, params).await,
            StreamItem::Closed => {
                info!(session_id = %session.id, "Upstream closed the connection");
                Step::Stop
            }
            StreamItem::Failed(e) => {
                error!(session_id = %session.id, error = %e, "Upstream connection failed");
                let notice = RealtimeEvent::error(UPSTREAM_ERROR_CODE, e.to_string());
                if session.deliver(notice).await != Delivery::Delivered {
                    debug!(session_id = %session.id, "Upstream failure not delivered to client");
                }
                Step::Stop
            }
        };

        if step == Step::Stop {
            break;
        }
    }

    session.close().await;
}

async fn relay_event(session: &Session, event: RealtimeEvent, params: AudioParams) -> Step {
    // Audio is only charged once there is someone to hear it.
    if let RealtimeEvent::Audio(audio) = &event {
        match session.link_status() {
            Delivery::Delivered => {}
            Delivery::NoClient => {
                debug!(session_id = %session.id, "No client attached, dropping audio");
                return Step::Continue;
            }
            Delivery::ClientGone => {
                info!(session_id = %session.id, "Client link closed");
                return Step::Stop;
            }
        }
        let duration_ms = params.duration_ms(audio.len());
        if !session.meter.try_consume(&session.client_id, duration_ms) {
            warn!(
                session_id = %session.id,
                client_id = %session.client_id,
                quota_ms = session.meter.quota_ms(),
                "Usage limit reached"
            );
            session.deliver(RealtimeEvent::limit_reached()).await;
            return Step::Stop;
        }
    }

    let kind = event.kind();
    match session.deliver(event).await {
        Delivery::Delivered => Step::Continue,
        Delivery::NoClient => {
            debug!(session_id = %session.id, event = kind, "No client attached, dropping event");
            Step::Continue
        }
        Delivery::ClientGone => {
            info!(session_id = %session.id, "Client link closed");
            Step::Stop
        }
    }
}
