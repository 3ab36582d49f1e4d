//! Models, voices and audio formats understood by the OpenAI Realtime API.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::realtime::base::AudioParams;

/// Default WebSocket endpoint of the OpenAI Realtime API.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Sample rate of PCM16 audio on the Realtime API (24kHz mono).
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// Sample rate of the G.711 formats.
pub const G711_SAMPLE_RATE: u32 = 8000;

// =============================================================================
// Models
// =============================================================================

/// Realtime models the relay knows by name.
///
/// Unknown names are still accepted by the upstream, so [`resolve_model`]
/// passes them through instead of rejecting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenAIRealtimeModel {
    #[default]
    Gpt4oRealtimePreview,
    Gpt4oRealtimePreview20241217,
    Gpt4oRealtimePreview20250603,
    Gpt4oMiniRealtimePreview,
    GptRealtime,
}

impl OpenAIRealtimeModel {
    const ALL: [Self; 5] = [
        Self::Gpt4oRealtimePreview,
        Self::Gpt4oRealtimePreview20241217,
        Self::Gpt4oRealtimePreview20250603,
        Self::Gpt4oMiniRealtimePreview,
        Self::GptRealtime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oRealtimePreview => "gpt-4o-realtime-preview",
            Self::Gpt4oRealtimePreview20241217 => "gpt-4o-realtime-preview-2024-12-17",
            Self::Gpt4oRealtimePreview20250603 => "gpt-4o-realtime-preview-2025-06-03",
            Self::Gpt4oMiniRealtimePreview => "gpt-4o-mini-realtime-preview",
            Self::GptRealtime => "gpt-realtime",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for OpenAIRealtimeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model name to put on the connect URL.
///
/// Blank names fall back to the default model. Names the relay does not
/// recognise are forwarded unchanged.
pub fn resolve_model(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return OpenAIRealtimeModel::default().to_string();
    }
    match OpenAIRealtimeModel::parse(trimmed) {
        Some(model) => model.to_string(),
        None => trimmed.to_string(),
    }
}

// =============================================================================
// Voices
// =============================================================================

/// Voices available for synthesized replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    #[default]
    Shimmer,
    Verse,
}

impl OpenAIRealtimeVoice {
    pub const ALL: [Self; 8] = [
        Self::Alloy,
        Self::Ash,
        Self::Ballad,
        Self::Coral,
        Self::Echo,
        Self::Sage,
        Self::Shimmer,
        Self::Verse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse a voice name, falling back to the default voice.
    pub fn from_str_or_default(name: &str) -> Self {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(name))
            .unwrap_or_default()
    }
}

impl fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Wire audio formats. Input and output use the same format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenAIRealtimeAudioFormat {
    /// 16-bit signed little-endian PCM, 24kHz mono.
    #[default]
    Pcm16,
    G711Ulaw,
    G711Alaw,
}

impl OpenAIRealtimeAudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm16 => "pcm16",
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
        }
    }

    pub fn from_str_or_default(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "g711_ulaw" => Self::G711Ulaw,
            "g711_alaw" => Self::G711Alaw,
            _ => Self::Pcm16,
        }
    }

    /// Sample rate and width used for converting byte counts into durations.
    pub fn audio_params(&self) -> AudioParams {
        match self {
            Self::Pcm16 => AudioParams::new(OPENAI_REALTIME_SAMPLE_RATE, 2),
            Self::G711Ulaw | Self::G711Alaw => AudioParams::new(G711_SAMPLE_RATE, 1),
        }
    }
}

impl fmt::Display for OpenAIRealtimeAudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response modalities requested in `session.update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Audio,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Audio => "audio",
        }
    }
}
