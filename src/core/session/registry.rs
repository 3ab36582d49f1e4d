//! Process-wide directory of live sessions.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Session, SessionMap, SessionState};
use crate::core::realtime::{RealtimeError, RealtimeResult, UpstreamFactory};
use crate::core::usage::UsageMeter;

/// Creates, looks up and tears down sessions by id.
///
/// Only sessions whose upstream handshake succeeded are ever registered.
/// A session that closes itself removes its own entry.
pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
    factory: Arc<dyn UpstreamFactory>,
    meter: Arc<UsageMeter>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn UpstreamFactory>, meter: Arc<UsageMeter>) -> Self {
        Self {
            sessions: Arc::new(SessionMap::new()),
            factory,
            meter,
        }
    }

    pub fn usage(&self) -> &Arc<UsageMeter> {
        &self.meter
    }

    /// Create a session, complete its upstream handshake and register it.
    pub async fn create(
        &self,
        client_id: &str,
        model: &str,
        voice: &str,
    ) -> RealtimeResult<Arc<Session>> {
        let id = Uuid::new_v4().to_string();
        let upstream = self.factory.create()?;
        let session = Arc::new(Session::new(
            id,
            client_id.to_string(),
            model.to_string(),
            voice.to_string(),
            upstream,
            Arc::clone(&self.meter),
            Arc::downgrade(&self.sessions),
        ));

        session.initialize().await?;
        self.register(session)
    }

    /// Insert an initialized session, unless it already started closing.
    pub(super) fn register(&self, session: Arc<Session>) -> RealtimeResult<Arc<Session>> {
        let id = session.id().to_string();
        self.sessions.insert(id.clone(), Arc::clone(&session));

        // The relay may have started closing before the entry existed.
        if matches!(
            session.state(),
            SessionState::Closing | SessionState::Closed
        ) {
            self.sessions
                .remove_if(&id, |_, s| Arc::ptr_eq(s, &session));
            warn!(session_id = %id, "Session closed before it was registered");
            return Err(RealtimeError::ConnectError(format!(
                "session {id} closed during setup"
            )));
        }

        info!(session_id = %id, client_id = %session.client_id(), "Session registered");
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> RealtimeResult<Arc<Session>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RealtimeError::NotFound(session_id.to_string()))
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Close and unregister a session. Unknown ids are a no-op.
    pub async fn remove(&self, session_id: &str) {
        let Ok(session) = self.get(session_id) else {
            debug!(session_id = %session_id, "Remove requested for unknown session");
            return;
        };

        session.close().await;
        self.sessions
            .remove_if(session_id, |_, s| Arc::ptr_eq(s, &session));
    }

    /// Close every registered session.
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        if !ids.is_empty() {
            info!(count = ids.len(), "Closing all sessions");
        }
        for id in ids {
            self.remove(&id).await;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
