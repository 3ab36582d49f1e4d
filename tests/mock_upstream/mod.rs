//! Scripted upstream for relay tests
//!
//! Every upstream handed out by [`MockFactory`] is driven by an unbounded
//! frame channel the test holds on to, and records what the session sent it.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use parking_lot::Mutex;
use serde_json::json;

use tutor_relay::core::realtime::openai::translate_server_event;
use tutor_relay::core::realtime::{
    AudioParams, BoxedUpstream, ConnectionState, EventStream, InboundFrame, RealtimeError,
    RealtimeResult, RealtimeUpstream, UpstreamFactory,
};

pub type FrameResult = Result<InboundFrame, RealtimeError>;

/// 24kHz PCM16, the default OpenAI output format.
pub const PCM16_24K: AudioParams = AudioParams::new(24000, 2);

/// Bytes of PCM16 24kHz audio lasting `ms` milliseconds.
pub fn pcm_bytes_for_ms(ms: usize) -> usize {
    ms * 48
}

/// Test-side controls of one mock upstream.
#[derive(Clone)]
pub struct UpstreamHandle {
    frames: UnboundedSender<FrameResult>,
    pub model: Arc<Mutex<Option<String>>>,
    pub voice: Arc<Mutex<Option<String>>>,
    pub sent_audio: Arc<Mutex<Vec<Bytes>>>,
    pub commits: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    fail_sends: Arc<AtomicBool>,
}

impl UpstreamHandle {
    /// Make every later client-to-upstream send fail with a transport error.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.frames.unbounded_send(Ok(InboundFrame::Text(text.into())));
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.push_text(value.to_string());
    }

    pub fn push_audio(&self, len: usize) {
        let audio = vec![0u8; len];
        self.push_json(json!({
            "type": "response.audio.delta",
            "delta": BASE64_STANDARD.encode(&audio),
        }));
    }

    pub fn push_close(&self) {
        let _ = self.frames.unbounded_send(Ok(InboundFrame::Close));
    }

    pub fn push_failure(&self, reason: &str) {
        let _ = self
            .frames
            .unbounded_send(Err(RealtimeError::Transport(reason.to_string())));
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct MockUpstream {
    fail_connect: bool,
    params: AudioParams,
    handle: UpstreamHandle,
    frames: Mutex<Option<UnboundedReceiver<FrameResult>>>,
    state: Mutex<ConnectionState>,
}

#[async_trait]
impl RealtimeUpstream for MockUpstream {
    async fn connect(&self, model: &str, voice: &str) -> RealtimeResult<()> {
        *self.handle.model.lock() = Some(model.to_string());
        *self.handle.voice.lock() = Some(voice.to_string());
        if self.fail_connect {
            return Err(RealtimeError::ConnectError(
                "expected session.created".to_string(),
            ));
        }
        *self.state.lock() = ConnectionState::Connected;
        Ok(())
    }

    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        if *self.state.lock() != ConnectionState::Connected {
            return Err(RealtimeError::NotConnected);
        }
        if self.handle.fail_sends.load(Ordering::SeqCst) {
            return Err(RealtimeError::Transport("broken pipe".to_string()));
        }
        self.handle.sent_audio.lock().push(audio);
        Ok(())
    }

    async fn commit_and_request_response(&self) -> RealtimeResult<()> {
        if *self.state.lock() != ConnectionState::Connected {
            return Err(RealtimeError::NotConnected);
        }
        self.handle.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn events(&self) -> RealtimeResult<EventStream> {
        let rx = self
            .frames
            .lock()
            .take()
            .ok_or(RealtimeError::NotConnected)?;
        Ok(EventStream::new(Box::pin(rx), translate_server_event))
    }

    fn audio_params(&self) -> AudioParams {
        self.params
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn close(&self) {
        *self.state.lock() = ConnectionState::Closed;
        self.handle.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out [`MockUpstream`]s and keeps their handles in creation order.
pub struct MockFactory {
    fail_connect: AtomicBool,
    params: AudioParams,
    created: AtomicUsize,
    handles: Mutex<Vec<UpstreamHandle>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Self::with_params(PCM16_24K)
    }

    pub fn with_params(params: AudioParams) -> Arc<Self> {
        Arc::new(Self {
            fail_connect: AtomicBool::new(false),
            params,
            created: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        let factory = Self::new();
        factory.set_fail_connect(true);
        factory
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Number of upstream connections attempted so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn handle(&self, index: usize) -> UpstreamHandle {
        self.handles.lock()[index].clone()
    }

    pub fn last_handle(&self) -> UpstreamHandle {
        self.handles
            .lock()
            .last()
            .cloned()
            .expect("no upstream created yet")
    }
}

impl UpstreamFactory for MockFactory {
    fn create(&self) -> RealtimeResult<BoxedUpstream> {
        let (tx, rx) = unbounded();
        let handle = UpstreamHandle {
            frames: tx,
            model: Arc::new(Mutex::new(None)),
            voice: Arc::new(Mutex::new(None)),
            sent_audio: Arc::new(Mutex::new(Vec::new())),
            commits: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_sends: Arc::new(AtomicBool::new(false)),
        };
        self.handles.lock().push(handle.clone());
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockUpstream {
            fail_connect: self.fail_connect.load(Ordering::SeqCst),
            params: self.params,
            handle,
            frames: Mutex::new(Some(rx)),
            state: Mutex::new(ConnectionState::Disconnected),
        }))
    }
}
