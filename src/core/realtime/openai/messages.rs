//! OpenAI Realtime API WebSocket message types.
//!
//! Client events (sent to the upstream):
//! - session.update - Configure the session right after connecting
//! - input_audio_buffer.append - Append base64 audio to the input buffer
//! - input_audio_buffer.commit - Close the current input turn
//! - response.create - Ask for a response
//!
//! Server events the relay cares about:
//! - session.created - Handshake acknowledgement
//! - response.audio.delta - Synthesized audio chunk
//! - response.audio_transcript.delta - Transcript of the synthesized reply
//! - conversation.item.input_audio_transcription.delta - Learner transcript
//! - response.created / response.started / response.done - Response lifecycle
//! - error - Upstream error
//!
//! Everything else is parsed as [`ServerEvent::Other`] and dropped.

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::core::realtime::base::{Inbound, RealtimeEvent, TranscriptRole};

// =============================================================================
// Session Configuration
// =============================================================================

/// Body of a `session.update` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: InputAudioTranscription,
    pub turn_detection: TurnDetection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// Turn detection block. Only server VAD is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad {
        threshold: f32,
        prefix_padding_ms: u32,
        silence_duration_ms: u32,
    },
}

// =============================================================================
// Client Events
// =============================================================================

/// Events sent from the relay to the upstream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio
        audio: String,
    },

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    pub fn audio_append(audio: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(audio),
        }
    }

    /// Event type string, for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            ClientEvent::InputAudioBufferCommit => "input_audio_buffer.commit",
            ClientEvent::ResponseCreate => "response.create",
        }
    }
}

// =============================================================================
// Server Events
// =============================================================================

/// Events received from the upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputTranscriptionDelta {
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        response: Option<ResponseRef>,
    },

    #[serde(rename = "response.started")]
    ResponseStarted {
        #[serde(default)]
        response: Option<ResponseRef>,
    },

    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: Option<ResponseRef>,
    },

    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseRef {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
struct EventType<'a> {
    #[serde(rename = "type", borrow)]
    kind: Cow<'a, str>,
}

/// Translate one upstream text frame.
///
/// Frames whose `type` is missing or not a string are malformed.
pub fn translate_server_event(text: &str) -> Inbound {
    // serde would otherwise accept an integer tag as a variant index.
    let kind = match serde_json::from_str::<EventType<'_>>(text) {
        Ok(tag) => tag.kind,
        Err(e) => return Inbound::Malformed(e.to_string()),
    };

    let event: ServerEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => return Inbound::Malformed(e.to_string()),
    };

    match event {
        ServerEvent::SessionCreated { session } => Inbound::SessionCreated(session.id),
        ServerEvent::AudioDelta { delta } => {
            if delta.is_empty() {
                return Inbound::Ignored("response.audio.delta (empty)".to_string());
            }
            match BASE64_STANDARD.decode(delta.as_bytes()) {
                Ok(audio) if audio.is_empty() => {
                    Inbound::Ignored("response.audio.delta (empty)".to_string())
                }
                Ok(audio) => Inbound::Event(RealtimeEvent::Audio(Bytes::from(audio))),
                Err(e) => Inbound::Malformed(format!("invalid audio delta: {e}")),
            }
        }
        ServerEvent::AudioTranscriptDelta { delta } => {
            Inbound::Event(RealtimeEvent::TranscriptDelta {
                role: TranscriptRole::Assistant,
                text: delta,
            })
        }
        ServerEvent::InputTranscriptionDelta { delta } => {
            Inbound::Event(RealtimeEvent::TranscriptDelta {
                role: TranscriptRole::User,
                text: delta,
            })
        }
        ServerEvent::ResponseCreated { response } | ServerEvent::ResponseStarted { response } => {
            Inbound::Event(RealtimeEvent::ResponseStarted {
                response_id: response.and_then(|r| r.id),
            })
        }
        ServerEvent::ResponseDone { response } => Inbound::Event(RealtimeEvent::ResponseDone {
            response_id: response.and_then(|r| r.id),
        }),
        ServerEvent::Error { error } => {
            let code = match error.code {
                Some(code) if !code.is_empty() => code,
                _ if !error.error_type.is_empty() => error.error_type,
                _ => "UPSTREAM_ERROR".to_string(),
            };
            Inbound::Event(RealtimeEvent::Error {
                code,
                message: error.message,
            })
        }
        ServerEvent::Other => Inbound::Ignored(kind.into_owned()),
    }
}
