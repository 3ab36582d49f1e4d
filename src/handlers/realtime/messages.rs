//! Realtime message types
//!
//! JSON bodies of the offer/limit endpoints and the WebSocket protocol spoken
//! with the browser.

use serde::{Deserialize, Serialize};

use crate::core::realtime::{RealtimeEvent, TranscriptRole};
use crate::core::session::ClientRoute;

/// Maximum accepted size of one base64 audio payload (1 MB)
pub const MAX_AUDIO_PAYLOAD_SIZE: usize = 1024 * 1024;

// =============================================================================
// HTTP Bodies
// =============================================================================

/// Body of `POST /api/realtime/offer`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OfferRequest {
    /// Opaque session description, echoed back in the answer.
    #[serde(default)]
    pub sdp: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

/// Successful answer to an offer.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OfferAnswer {
    pub session_id: String,
    #[serde(rename = "type")]
    pub answer_type: String,
    pub sdp: String,
    pub status: String,
}

impl OfferAnswer {
    pub fn connected(session_id: String, sdp: String) -> Self {
        Self {
            session_id,
            answer_type: "answer".to_string(),
            sdp,
            status: "connected".to_string(),
        }
    }
}

/// Body of `GET /api/realtime/limit`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LimitStatus {
    pub limit_reached: bool,
    pub consumed_ms: u64,
    pub quota_ms: u64,
}

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from the browser
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum RealtimeIncomingMessage {
    /// Base64-encoded PCM16 audio chunk
    #[serde(rename = "audio")]
    Audio {
        #[serde(default)]
        audio: String,
    },

    /// The learner finished speaking
    #[serde(rename = "stop_speaking")]
    StopSpeaking,

    /// Any other message type; ignored
    #[serde(other)]
    Unknown,
}

impl RealtimeIncomingMessage {
    pub fn validate_size(&self) -> Result<(), String> {
        match self {
            RealtimeIncomingMessage::Audio { audio } if audio.len() > MAX_AUDIO_PAYLOAD_SIZE => {
                Err(format!(
                    "Audio payload too large: {} bytes (max {})",
                    audio.len(),
                    MAX_AUDIO_PAYLOAD_SIZE
                ))
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing WebSocket messages to the browser
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum RealtimeOutgoingMessage {
    /// Base64-encoded synthesized audio
    #[serde(rename = "audio")]
    Audio { audio: String },

    /// Transcript of the assistant's reply
    #[serde(rename = "ai_transcript")]
    AiTranscript { text: String },

    /// Transcript of the learner's speech
    #[serde(rename = "user_transcript")]
    UserTranscript { text: String },

    #[serde(rename = "response_started")]
    ResponseStarted { response_id: Option<String> },

    #[serde(rename = "response_done")]
    ResponseDone { response_id: Option<String> },

    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl RealtimeOutgoingMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        RealtimeOutgoingMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<RealtimeEvent> for RealtimeOutgoingMessage {
    fn from(event: RealtimeEvent) -> Self {
        use base64::prelude::*;

        match event {
            RealtimeEvent::Audio(audio) => RealtimeOutgoingMessage::Audio {
                audio: BASE64_STANDARD.encode(&audio),
            },
            RealtimeEvent::TranscriptDelta {
                role: TranscriptRole::Assistant,
                text,
            } => RealtimeOutgoingMessage::AiTranscript { text },
            RealtimeEvent::TranscriptDelta {
                role: TranscriptRole::User,
                text,
            } => RealtimeOutgoingMessage::UserTranscript { text },
            RealtimeEvent::ResponseStarted { response_id } => {
                RealtimeOutgoingMessage::ResponseStarted { response_id }
            }
            RealtimeEvent::ResponseDone { response_id } => {
                RealtimeOutgoingMessage::ResponseDone { response_id }
            }
            RealtimeEvent::Error { code, message } => {
                RealtimeOutgoingMessage::Error { code, message }
            }
        }
    }
}

/// What the socket writer task should do next
#[derive(Debug)]
pub enum RealtimeMessageRoute {
    Outgoing(RealtimeOutgoingMessage),
    Close,
}

impl From<ClientRoute> for RealtimeMessageRoute {
    fn from(route: ClientRoute) -> Self {
        match route {
            ClientRoute::Event(event) => RealtimeMessageRoute::Outgoing(event.into()),
            ClientRoute::Close => RealtimeMessageRoute::Close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    #[test]
    fn test_parse_incoming() {
        let msg: RealtimeIncomingMessage =
            serde_json::from_str(r#"{"type":"audio","audio":"AAEC"}"#).unwrap();
        assert_eq!(
            msg,
            RealtimeIncomingMessage::Audio {
                audio: "AAEC".to_string()
            }
        );

        let msg: RealtimeIncomingMessage =
            serde_json::from_str(r#"{"type":"stop_speaking"}"#).unwrap();
        assert_eq!(msg, RealtimeIncomingMessage::StopSpeaking);

        let msg: RealtimeIncomingMessage =
            serde_json::from_str(r#"{"type":"ping","seq":1}"#).unwrap();
        assert_eq!(msg, RealtimeIncomingMessage::Unknown);

        assert!(serde_json::from_str::<RealtimeIncomingMessage>(r#"{"audio":"x"}"#).is_err());
    }

    #[test]
    fn test_validate_size() {
        let big = RealtimeIncomingMessage::Audio {
            audio: "A".repeat(MAX_AUDIO_PAYLOAD_SIZE + 1),
        };
        assert!(big.validate_size().is_err());
        assert!(RealtimeIncomingMessage::StopSpeaking.validate_size().is_ok());
    }

    #[test]
    fn test_outgoing_from_events() {
        let audio: RealtimeOutgoingMessage =
            RealtimeEvent::Audio(Bytes::from_static(&[0, 1, 2])).into();
        assert_eq!(
            serde_json::to_value(&audio).unwrap(),
            json!({"type": "audio", "audio": "AAEC"})
        );

        let ai: RealtimeOutgoingMessage = RealtimeEvent::TranscriptDelta {
            role: TranscriptRole::Assistant,
            text: "Great job!".into(),
        }
        .into();
        assert_eq!(
            serde_json::to_value(&ai).unwrap(),
            json!({"type": "ai_transcript", "text": "Great job!"})
        );

        let user: RealtimeOutgoingMessage = RealtimeEvent::TranscriptDelta {
            role: TranscriptRole::User,
            text: "hello".into(),
        }
        .into();
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            json!({"type": "user_transcript", "text": "hello"})
        );

        let limit: RealtimeOutgoingMessage = RealtimeEvent::limit_reached().into();
        assert_eq!(
            serde_json::to_value(&limit).unwrap(),
            json!({"type": "error", "code": "LIMIT_REACHED", "message": "Time usage limit exceeded."})
        );

        let started: RealtimeOutgoingMessage = RealtimeEvent::ResponseStarted {
            response_id: Some("resp_1".into()),
        }
        .into();
        assert_eq!(
            serde_json::to_value(&started).unwrap(),
            json!({"type": "response_started", "response_id": "resp_1"})
        );
    }

    #[test]
    fn test_offer_answer_shape() {
        let answer = OfferAnswer::connected("abc".into(), "v=0".into());
        assert_eq!(
            serde_json::to_value(&answer).unwrap(),
            json!({"session_id": "abc", "type": "answer", "sdp": "v=0", "status": "connected"})
        );
    }

    #[test]
    fn test_offer_request_defaults() {
        let offer: OfferRequest = serde_json::from_str(r#"{"sdp":"v=0"}"#).unwrap();
        assert_eq!(offer.sdp, "v=0");
        assert!(offer.model.is_none());
        assert!(offer.voice.is_none());
    }
}
