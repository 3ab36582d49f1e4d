//! Relay sessions.
//!
//! A [`Session`] owns one upstream connection and relays its events to at most
//! one attached client link, metering synthesized audio against the client's
//! quota as it goes.
//!
//! ```text
//! INITIALIZING --initialize ok--> ACTIVE --close--> CLOSING --> CLOSED
//!      |                                                          ^
//!      +----------------- handshake failure ----------------------+
//! ```
//!
//! `close` may be invoked by the client handler, by the registry, or by the
//! relay task itself (quota exhausted, upstream ended, client gone).

mod registry;
mod relay;

pub use registry::SessionRegistry;

use base64::prelude::*;
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::realtime::{BoxedUpstream, RealtimeError, RealtimeEvent, RealtimeResult};
use crate::core::usage::UsageMeter;

use relay::RELAY_SESSION;

/// Map of live sessions shared between the registry and its sessions.
pub(crate) type SessionMap = dashmap::DashMap<String, Arc<Session>>;

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Initializing => write!(f, "initializing"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Message delivered to a client over its link.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRoute {
    Event(RealtimeEvent),
    /// The session is gone; the client transport should close.
    Close,
}

/// Outcome of delivering one event to the client link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// No client has attached yet.
    NoClient,
    /// The client link was attached and is now closed.
    ClientGone,
}

pub struct Session {
    id: String,
    client_id: String,
    model: String,
    voice: String,
    state: watch::Sender<SessionState>,
    upstream: BoxedUpstream,
    meter: Arc<UsageMeter>,
    client_link: Mutex<Option<mpsc::WeakSender<ClientRoute>>>,
    relay_task: Mutex<Option<JoinHandle<()>>>,
    registry: Weak<SessionMap>,
}

impl Session {
    pub(crate) fn new(
        id: String,
        client_id: String,
        model: String,
        voice: String,
        upstream: BoxedUpstream,
        meter: Arc<UsageMeter>,
        registry: Weak<SessionMap>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Initializing);
        Self {
            id,
            client_id,
            model,
            voice,
            state,
            upstream,
            meter,
            client_link: Mutex::new(None),
            relay_task: Mutex::new(None),
            registry,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches CLOSED.
    pub async fn closed(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns once closed.
        let _ = rx.wait_for(|s| *s == SessionState::Closed).await;
    }

    /// Atomically move from one of `from` to `to`.
    fn transition(&self, from: &[SessionState], to: SessionState) -> bool {
        self.state.send_if_modified(|current| {
            if from.contains(current) {
                *current = to;
                true
            } else {
                false
            }
        })
    }

    fn ensure_active(&self) -> RealtimeResult<()> {
        match self.state() {
            SessionState::Active => Ok(()),
            other => Err(RealtimeError::InvalidState(format!(
                "session {} is {}",
                self.id, other
            ))),
        }
    }

    /// Connect the upstream, start the relay task and become ACTIVE.
    ///
    /// On failure the upstream is closed and the session ends up CLOSED
    /// without ever having been ACTIVE.
    pub async fn initialize(self: &Arc<Self>) -> RealtimeResult<()> {
        if self.state() != SessionState::Initializing {
            return Err(RealtimeError::InvalidState(format!(
                "session {} is {}",
                self.id,
                self.state()
            )));
        }

        let events = match self.upstream.connect(&self.model, &self.voice).await {
            Ok(()) => self.upstream.events(),
            Err(e) => Err(e),
        };
        let events = match events {
            Ok(events) => events,
            Err(e) => {
                error!(session_id = %self.id, error = %e, "Upstream handshake failed");
                self.upstream.close().await;
                self.state.send_replace(SessionState::Closed);
                return Err(match e {
                    RealtimeError::ConnectError(_) => e,
                    other => RealtimeError::ConnectError(other.to_string()),
                });
            }
        };

        let started = {
            let mut relay_task = self.relay_task.lock();
            if self.transition(&[SessionState::Initializing], SessionState::Active) {
                let session = Arc::clone(self);
                let relay = relay::run(session, events);
                *relay_task = Some(tokio::spawn(RELAY_SESSION.scope(self.id.clone(), relay)));
                true
            } else {
                false
            }
        };

        if !started {
            self.upstream.close().await;
            return Err(RealtimeError::InvalidState(format!(
                "session {} was closed during initialization",
                self.id
            )));
        }

        info!(
            session_id = %self.id,
            client_id = %self.client_id,
            model = %self.model,
            voice = %self.voice,
            "Session active"
        );
        Ok(())
    }

    /// Register the client link that receives relayed events.
    ///
    /// Only a weak handle is kept; the client side owns the channel. A second
    /// attach replaces the first.
    pub fn attach_client(&self, link: &mpsc::Sender<ClientRoute>) -> RealtimeResult<()> {
        self.ensure_active()?;
        let previous = self.client_link.lock().replace(link.downgrade());
        if previous.is_some() {
            warn!(session_id = %self.id, "Replacing previously attached client link");
        } else {
            debug!(session_id = %self.id, "Client link attached");
        }
        Ok(())
    }

    /// Decode a base64 audio chunk from the client and forward it upstream.
    pub async fn send_audio_from_client(&self, payload: &str) -> RealtimeResult<()> {
        self.ensure_active()?;
        let audio = BASE64_STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| RealtimeError::InvalidPayload(e.to_string()))?;
        self.upstream.send_audio(Bytes::from(audio)).await
    }

    /// Forward raw PCM audio from the client upstream.
    pub async fn send_pcm_from_client(&self, audio: Bytes) -> RealtimeResult<()> {
        self.ensure_active()?;
        self.upstream.send_audio(audio).await
    }

    /// End the learner's turn and ask the upstream to respond.
    pub async fn commit_and_request_response(&self) -> RealtimeResult<()> {
        self.ensure_active()?;
        self.upstream.commit_and_request_response().await
    }

    /// Where an event would go right now, without sending it. `Delivered`
    /// means an open link is attached.
    pub(crate) fn link_status(&self) -> Delivery {
        match self.client_link.lock().as_ref() {
            None => Delivery::NoClient,
            Some(link) if link.upgrade().is_some() => Delivery::Delivered,
            Some(_) => Delivery::ClientGone,
        }
    }

    pub(crate) async fn deliver(&self, event: RealtimeEvent) -> Delivery {
        let link = self.client_link.lock().clone();
        let Some(link) = link else {
            return Delivery::NoClient;
        };
        let Some(sender) = link.upgrade() else {
            return Delivery::ClientGone;
        };
        match sender.send(ClientRoute::Event(event)).await {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::ClientGone,
        }
    }

    /// Close the session. Safe to call any number of times from any task.
    ///
    /// The first caller tears down the relay, the upstream, and the client
    /// link, then removes the session from its registry. Other callers wait
    /// for that to finish, except the relay task itself, which returns
    /// immediately so it never waits on its own teardown.
    pub async fn close(&self) {
        let in_relay = RELAY_SESSION
            .try_with(|id| id == &self.id)
            .unwrap_or(false);

        let first = self.transition(
            &[SessionState::Initializing, SessionState::Active],
            SessionState::Closing,
        );
        if !first {
            if !in_relay {
                self.closed().await;
            }
            return;
        }

        info!(session_id = %self.id, "Closing session");

        let relay = self.relay_task.lock().take();
        if let Some(handle) = relay {
            if in_relay {
                debug!(session_id = %self.id, "Close requested by relay task");
            } else {
                handle.abort();
                match handle.await {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => warn!(session_id = %self.id, error = %e, "Relay task failed"),
                }
            }
        }

        self.upstream.close().await;

        let link = self.client_link.lock().take();
        if let Some(sender) = link.and_then(|l| l.upgrade()) {
            if sender.send(ClientRoute::Close).await.is_err() {
                debug!(session_id = %self.id, "Client link already closed");
            }
        }

        // A CLOSED session is never resolvable by id.
        if let Some(sessions) = self.registry.upgrade() {
            sessions.remove_if(&self.id, |_, s| std::ptr::eq(Arc::as_ptr(s), self));
        }

        self.state.send_replace(SessionState::Closed);

        info!(session_id = %self.id, client_id = %self.client_id, "Session closed");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("state", &self.state())
            .finish()
    }
}
