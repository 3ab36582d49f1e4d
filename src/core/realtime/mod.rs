//! Upstream realtime dialogue services.
//!
//! - `RealtimeUpstream` abstracts one duplex upstream connection
//! - `UpstreamFactory` creates a fresh connection per relay session
//! - `EventStream` yields provider-neutral `RealtimeEvent`s
//!
//! The only provider today is the OpenAI Realtime API.

mod base;
pub mod openai;
mod stream;

pub use base::{
    AudioParams, BoxedUpstream, ConnectionState, Inbound, LIMIT_REACHED_CODE,
    LIMIT_REACHED_MESSAGE, RealtimeConfig, RealtimeError, RealtimeEvent, RealtimeResult,
    RealtimeUpstream, TranscriptRole, Translator, TurnDetectionConfig, UpstreamFactory,
};
pub use openai::{OpenAIRealtime, OpenAIRealtimeFactory};
pub use stream::{EventStream, FrameSource, InboundFrame, StreamItem};
