//! Base traits and types for realtime upstream dialogue services.
//!
//! A relay session talks to exactly one upstream connection. The upstream
//! accepts raw PCM audio from the learner, and produces a stream of
//! [`RealtimeEvent`]s (synthesized audio, transcripts, response markers).
//!
//! # Audio Format
//!
//! Audio crossing the relay is 16-bit signed little-endian PCM. The sample
//! rate is provider and format specific and is reported by
//! [`RealtimeUpstream::audio_params`] so that the usage meter can convert
//! byte counts into milliseconds.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::stream::EventStream;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to an upstream service or driving a session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The upstream connection or its initial handshake failed
    #[error("Connection failed: {0}")]
    ConnectError(String),

    /// Operation requires an established upstream connection
    #[error("Not connected")]
    NotConnected,

    /// Operation is not valid in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Transport failure after the connection was established
    #[error("Transport error: {0}")]
    Transport(String),

    /// Client audio payload could not be decoded
    #[error("Invalid audio payload: {0}")]
    InvalidPayload(String),

    /// No session with the given identifier
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::Serialization(err.to_string())
    }
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Server-side voice activity detection parameters sent during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnDetectionConfig {
    /// Activation threshold (0.0 to 1.0).
    pub threshold: f32,
    /// Audio retained before detected speech (ms).
    pub prefix_padding_ms: u32,
    /// Silence required to end a turn (ms).
    pub silence_duration_ms: u32,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// Provider configuration shared by every upstream connection the process opens.
///
/// Model and voice are chosen per session and passed to
/// [`RealtimeUpstream::connect`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key for the upstream service.
    #[serde(skip_serializing)]
    pub api_key: String,

    /// WebSocket endpoint of the upstream service.
    pub url: String,

    /// System instructions for the assistant.
    pub instructions: String,

    /// Model used for transcribing learner audio.
    pub transcription_model: String,

    /// Output audio format identifier (e.g. "pcm16").
    pub output_audio_format: String,

    /// Server VAD settings.
    pub turn_detection: TurnDetectionConfig,
}

// =============================================================================
// Event Types
// =============================================================================

/// Speaker of a transcript fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    /// Learner speech recognized by the upstream.
    User,
    /// Text of the synthesized reply.
    Assistant,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Error code sent to the client when its quota runs out mid-session.
pub const LIMIT_REACHED_CODE: &str = "LIMIT_REACHED";

/// Message paired with [`LIMIT_REACHED_CODE`].
pub const LIMIT_REACHED_MESSAGE: &str = "Time usage limit exceeded.";

/// A provider-neutral event produced by the upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// A chunk of synthesized PCM audio. Never empty.
    Audio(Bytes),

    /// A transcript fragment.
    TranscriptDelta { role: TranscriptRole, text: String },

    /// The upstream started generating a response.
    ResponseStarted { response_id: Option<String> },

    /// The upstream finished a response.
    ResponseDone { response_id: Option<String> },

    /// An error reported by the upstream or by the relay itself.
    Error { code: String, message: String },
}

impl RealtimeEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        RealtimeEvent::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn limit_reached() -> Self {
        Self::error(LIMIT_REACHED_CODE, LIMIT_REACHED_MESSAGE)
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RealtimeEvent::Audio(_) => "audio",
            RealtimeEvent::TranscriptDelta {
                role: TranscriptRole::User,
                ..
            } => "user_transcript",
            RealtimeEvent::TranscriptDelta { .. } => "ai_transcript",
            RealtimeEvent::ResponseStarted { .. } => "response_started",
            RealtimeEvent::ResponseDone { .. } => "response_done",
            RealtimeEvent::Error { .. } => "error",
        }
    }
}

/// Result of translating one upstream text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A frame that maps onto a [`RealtimeEvent`].
    Event(RealtimeEvent),
    /// Handshake acknowledgement carrying the upstream session id.
    SessionCreated(String),
    /// A well-formed frame the relay does not care about, by type name.
    Ignored(String),
    /// A frame that could not be parsed.
    Malformed(String),
}

/// Converts a raw upstream text frame into an [`Inbound`].
pub type Translator = fn(&str) -> Inbound;

/// PCM layout of upstream output audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub sample_rate_hz: u32,
    pub bytes_per_sample: u32,
}

impl AudioParams {
    pub const fn new(sample_rate_hz: u32, bytes_per_sample: u32) -> Self {
        Self {
            sample_rate_hz,
            bytes_per_sample,
        }
    }

    /// Playback duration of `byte_len` bytes of audio, truncated to whole milliseconds.
    pub fn duration_ms(&self, byte_len: usize) -> u64 {
        if self.sample_rate_hz == 0 || self.bytes_per_sample == 0 {
            return 0;
        }
        let samples = byte_len as u64 / u64::from(self.bytes_per_sample);
        samples * 1000 / u64::from(self.sample_rate_hz)
    }
}

/// Connection state of an upstream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

// =============================================================================
// Upstream Trait
// =============================================================================

/// One duplex connection to an upstream dialogue service.
///
/// Methods take `&self` so a session can keep sending client audio while its
/// relay task consumes the [`EventStream`].
#[async_trait]
pub trait RealtimeUpstream: Send + Sync {
    /// Open the connection and complete the session handshake.
    ///
    /// Fails with [`RealtimeError::ConnectError`] if the transport cannot be
    /// established or the upstream does not acknowledge the session.
    async fn connect(&self, model: &str, voice: &str) -> RealtimeResult<()>;

    /// Append a chunk of PCM audio to the upstream input buffer.
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()>;

    /// End the current input turn and ask the upstream to respond.
    async fn commit_and_request_response(&self) -> RealtimeResult<()>;

    /// Take the inbound event stream. Can be taken once per connection.
    fn events(&self) -> RealtimeResult<EventStream>;

    /// PCM layout of the audio this upstream emits.
    fn audio_params(&self) -> AudioParams;

    fn connection_state(&self) -> ConnectionState;

    /// Close the connection. Best-effort and idempotent.
    async fn close(&self);
}

/// Type alias for boxed upstream connections.
pub type BoxedUpstream = Box<dyn RealtimeUpstream>;

/// Creates unconnected upstream clients, one per session.
pub trait UpstreamFactory: Send + Sync {
    fn create(&self) -> RealtimeResult<BoxedUpstream>;
}
