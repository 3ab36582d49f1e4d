//! OpenAI Realtime API client.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! The connection is split on connect. The write half is owned by a writer
//! task fed through a bounded channel, so client events reach the upstream in
//! the order they were sent. The read half is handed out once as an
//! [`EventStream`].

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::config::{Modality, OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice, resolve_model};
use super::messages::{
    ClientEvent, InputAudioTranscription, SessionConfig, TurnDetection, translate_server_event,
};
use crate::core::realtime::base::{
    AudioParams, BoxedUpstream, ConnectionState, Inbound, RealtimeConfig, RealtimeError,
    RealtimeResult, RealtimeUpstream, UpstreamFactory,
};
use crate::core::realtime::stream::{EventStream, InboundFrame};

/// Channel capacity for outgoing upstream events.
const WS_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// OpenAI Realtime API client. One instance backs one relay session.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    audio_format: OpenAIRealtimeAudioFormat,
    state: Mutex<ConnectionState>,
    upstream_session_id: Mutex<Option<String>>,
    ws_sender: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    writer_handle: Mutex<Option<JoinHandle<()>>>,
    events: Mutex<Option<EventStream>>,
}

impl OpenAIRealtime {
    pub fn new(config: RealtimeConfig) -> Self {
        let audio_format = OpenAIRealtimeAudioFormat::from_str_or_default(&config.output_audio_format);
        Self {
            config,
            audio_format,
            state: Mutex::new(ConnectionState::Disconnected),
            upstream_session_id: Mutex::new(None),
            ws_sender: Mutex::new(None),
            writer_handle: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    /// Session id assigned by the upstream during the handshake.
    pub fn upstream_session_id(&self) -> Option<String> {
        self.upstream_session_id.lock().clone()
    }

    fn build_request(
        &self,
        model: &str,
    ) -> RealtimeResult<tungstenite::handshake::client::Request> {
        let mut url = url::Url::parse(&self.config.url).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("invalid realtime url: {e}"))
        })?;
        url.query_pairs_mut().append_pair("model", model);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectError(format!("failed to build request: {e}")))?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| RealtimeError::InvalidConfiguration("invalid API key".to_string()))?;
        let headers = request.headers_mut();
        headers.insert(http::header::AUTHORIZATION, auth);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        Ok(request)
    }

    fn session_update(&self, voice: &str) -> ClientEvent {
        let format = self.audio_format.as_str().to_string();
        let td = self.config.turn_detection;
        ClientEvent::SessionUpdate {
            session: SessionConfig {
                modalities: vec![
                    Modality::Text.as_str().to_string(),
                    Modality::Audio.as_str().to_string(),
                ],
                instructions: self.config.instructions.clone(),
                voice: OpenAIRealtimeVoice::from_str_or_default(voice).to_string(),
                input_audio_format: format.clone(),
                output_audio_format: format,
                input_audio_transcription: InputAudioTranscription {
                    model: self.config.transcription_model.clone(),
                },
                turn_detection: TurnDetection::ServerVad {
                    threshold: td.threshold,
                    prefix_padding_ms: td.prefix_padding_ms,
                    silence_duration_ms: td.silence_duration_ms,
                },
            },
        }
    }

    async fn handshake(&self, model: &str, voice: &str) -> RealtimeResult<(WsSink, SplitStream<WsStream>, String)> {
        let request = self.build_request(model)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectError(e.to_string()))?;
        let (mut sink, mut stream) = ws_stream.split();

        let update = serde_json::to_string(&self.session_update(voice))?;
        sink.send(Message::Text(update.into()))
            .await
            .map_err(|e| RealtimeError::ConnectError(format!("failed to send session.update: {e}")))?;

        let session_id = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match translate_server_event(text.as_str()) {
                    Inbound::SessionCreated(id) => break id,
                    other => {
                        return Err(RealtimeError::ConnectError(format!(
                            "expected session.created, got {other:?}"
                        )));
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err(RealtimeError::ConnectError(
                        "connection closed during handshake".to_string(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(RealtimeError::ConnectError(e.to_string())),
            }
        };

        Ok((sink, stream, session_id))
    }

    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        let sender = self.ws_sender.lock().clone();
        let Some(sender) = sender else {
            return Err(RealtimeError::NotConnected);
        };
        let event_type = event.event_type();
        sender
            .send(event)
            .await
            .map_err(|_| RealtimeError::Transport(format!("upstream writer closed ({event_type})")))
    }
}

fn frame_from(message: Result<Message, tungstenite::Error>) -> Result<InboundFrame, RealtimeError> {
    match message {
        Ok(Message::Text(text)) => Ok(InboundFrame::Text(text.as_str().to_string())),
        Ok(Message::Close(_)) => Ok(InboundFrame::Close),
        Ok(_) => Ok(InboundFrame::Control),
        Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
            Ok(InboundFrame::Close)
        }
        Err(e) => Err(RealtimeError::Transport(e.to_string())),
    }
}

async fn write_loop(mut sink: WsSink, mut rx: mpsc::Receiver<ClientEvent>) {
    while let Some(event) = rx.recv().await {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize {}: {}", event.event_type(), e);
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            tracing::error!("Failed to send upstream message: {}", e);
            return;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!("Upstream close handshake failed: {}", e);
    }
}

#[async_trait]
impl RealtimeUpstream for OpenAIRealtime {
    async fn connect(&self, model: &str, voice: &str) -> RealtimeResult<()> {
        if self.config.api_key.is_empty() {
            return Err(RealtimeError::ConnectError("API key is required".to_string()));
        }

        {
            let mut state = self.state.lock();
            match *state {
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
                ConnectionState::Connected => return Ok(()),
                other => {
                    return Err(RealtimeError::ConnectError(format!(
                        "cannot connect while {other}"
                    )));
                }
            }
        }

        let model = resolve_model(model);
        let (sink, stream, session_id) = match self.handshake(&model, voice).await {
            Ok(parts) => parts,
            Err(e) => {
                let mut state = self.state.lock();
                if *state == ConnectionState::Connecting {
                    *state = ConnectionState::Disconnected;
                }
                return Err(e);
            }
        };

        let mut state = self.state.lock();
        if *state != ConnectionState::Connecting {
            return Err(RealtimeError::ConnectError(
                "client closed during handshake".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        *self.ws_sender.lock() = Some(tx);
        *self.writer_handle.lock() = Some(tokio::spawn(write_loop(sink, rx)));
        *self.events.lock() = Some(EventStream::new(
            Box::pin(stream.map(frame_from)),
            translate_server_event,
        ));
        *self.upstream_session_id.lock() = Some(session_id.clone());
        *state = ConnectionState::Connected;

        tracing::info!(
            "Connected to OpenAI Realtime API (model={}, upstream_session={})",
            model,
            session_id
        );
        Ok(())
    }

    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        self.send_event(ClientEvent::audio_append(&audio)).await
    }

    async fn commit_and_request_response(&self) -> RealtimeResult<()> {
        self.send_event(ClientEvent::InputAudioBufferCommit).await?;
        self.send_event(ClientEvent::ResponseCreate).await
    }

    fn events(&self) -> RealtimeResult<EventStream> {
        if let Some(events) = self.events.lock().take() {
            return Ok(events);
        }
        match *self.state.lock() {
            ConnectionState::Connected => Err(RealtimeError::InvalidState(
                "event stream already taken".to_string(),
            )),
            _ => Err(RealtimeError::NotConnected),
        }
    }

    fn audio_params(&self) -> AudioParams {
        self.audio_format.audio_params()
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), ConnectionState::Closed);
        if previous == ConnectionState::Closed {
            return;
        }

        // Dropping the sender lets the writer drain and send a close frame.
        self.ws_sender.lock().take();
        self.events.lock().take();
        let writer = self.writer_handle.lock().take();
        if let Some(handle) = writer {
            if let Err(e) = handle.await {
                tracing::warn!("Upstream writer task ended abnormally: {}", e);
            }
        }

        if previous != ConnectionState::Disconnected {
            tracing::info!("Closed OpenAI Realtime connection");
        }
    }
}

/// Creates one [`OpenAIRealtime`] client per session.
#[derive(Debug, Clone)]
pub struct OpenAIRealtimeFactory {
    config: RealtimeConfig,
}

impl OpenAIRealtimeFactory {
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }
}

impl UpstreamFactory for OpenAIRealtimeFactory {
    fn create(&self) -> RealtimeResult<BoxedUpstream> {
        Ok(Box::new(OpenAIRealtime::new(self.config.clone())))
    }
}
