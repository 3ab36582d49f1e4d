pub mod realtime;
pub mod session;
pub mod usage;

// Re-export commonly used types for convenience
pub use realtime::{
    OpenAIRealtime, OpenAIRealtimeFactory, RealtimeConfig, RealtimeError, RealtimeEvent,
    RealtimeResult, RealtimeUpstream, UpstreamFactory,
};
pub use session::{ClientRoute, Session, SessionRegistry, SessionState};
pub use usage::UsageMeter;
