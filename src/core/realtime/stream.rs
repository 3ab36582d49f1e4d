//! Pull-based stream of upstream events.
//!
//! The upstream read half is wrapped once per connection. Text frames are
//! translated into [`RealtimeEvent`]s; frames the relay has no use for are
//! dropped here so consumers only ever see meaningful events.

use futures::Stream;
use futures_util::StreamExt;
use std::fmt;
use std::pin::Pin;
use tracing::{debug, warn};

use super::base::{Inbound, RealtimeError, RealtimeEvent, Translator};

/// Transport-level frame coming off an upstream connection.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Text(String),
    /// Ping, pong and binary frames.
    Control,
    /// The peer closed the connection.
    Close,
}

/// Boxed source of transport frames.
pub type FrameSource =
    Pin<Box<dyn Stream<Item = Result<InboundFrame, RealtimeError>> + Send + 'static>>;

/// Item yielded by [`EventStream::next`].
#[derive(Debug)]
pub enum StreamItem {
    Event(RealtimeEvent),
    /// The upstream closed cleanly.
    Closed,
    /// The upstream connection failed.
    Failed(RealtimeError),
}

enum StreamEnd {
    Closed,
    Failed(String),
}

/// Lazy, finite, non-restartable sequence of upstream events.
///
/// Once the stream ends every further call to [`next`](Self::next) returns the
/// same terminal item.
pub struct EventStream {
    source: Option<FrameSource>,
    translate: Translator,
    end: Option<StreamEnd>,
}

impl EventStream {
    pub fn new(source: FrameSource, translate: Translator) -> Self {
        Self {
            source: Some(source),
            translate,
            end: None,
        }
    }

    /// Wait for the next relevant event or the end of the stream.
    pub async fn next(&mut self) -> StreamItem {
        loop {
            let Some(source) = self.source.as_mut() else {
                return self.terminal();
            };

            match source.next().await {
                Some(Ok(InboundFrame::Text(text))) => match (self.translate)(&text) {
                    Inbound::Event(event) => return StreamItem::Event(event),
                    Inbound::SessionCreated(id) => {
                        debug!(upstream_session_id = %id, "Late session acknowledgement ignored");
                    }
                    Inbound::Ignored(kind) => {
                        debug!(event_type = %kind, "Dropping unhandled upstream event");
                    }
                    Inbound::Malformed(reason) => {
                        warn!(error = %reason, "Dropping malformed upstream frame");
                    }
                },
                Some(Ok(InboundFrame::Control)) => {}
                Some(Ok(InboundFrame::Close)) | None => {
                    self.finish(StreamEnd::Closed);
                    return StreamItem::Closed;
                }
                Some(Err(e)) => {
                    self.finish(StreamEnd::Failed(e.to_string()));
                    return StreamItem::Failed(e);
                }
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.end.is_some()
    }

    fn finish(&mut self, end: StreamEnd) {
        self.source = None;
        self.end = Some(end);
    }

    fn terminal(&self) -> StreamItem {
        match &self.end {
            Some(StreamEnd::Failed(msg)) => StreamItem::Failed(RealtimeError::Transport(msg.clone())),
            _ => StreamItem::Closed,
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::base::TranscriptRole;
    use bytes::Bytes;

    fn toy_translate(text: &str) -> Inbound {
        match text.split_once(':') {
            Some(("audio", payload)) => {
                Inbound::Event(RealtimeEvent::Audio(Bytes::copy_from_slice(payload.as_bytes())))
            }
            Some(("say", payload)) => Inbound::Event(RealtimeEvent::TranscriptDelta {
                role: TranscriptRole::Assistant,
                text: payload.to_string(),
            }),
            Some(("ack", id)) => Inbound::SessionCreated(id.to_string()),
            Some((kind, _)) => Inbound::Ignored(kind.to_string()),
            None => Inbound::Malformed(text.to_string()),
        }
    }

    fn stream_of(frames: Vec<Result<InboundFrame, RealtimeError>>) -> EventStream {
        EventStream::new(Box::pin(futures::stream::iter(frames)), toy_translate)
    }

    fn text(s: &str) -> Result<InboundFrame, RealtimeError> {
        Ok(InboundFrame::Text(s.to_string()))
    }

    #[tokio::test]
    async fn test_events_in_order_and_irrelevant_dropped() {
        let mut stream = stream_of(vec![
            text("audio:ab"),
            text("rate_limits:{}"),
            Ok(InboundFrame::Control),
            text("garbage"),
            text("ack:sess_1"),
            text("say:hello"),
            Ok(InboundFrame::Close),
        ]);

        match stream.next().await {
            StreamItem::Event(RealtimeEvent::Audio(b)) => assert_eq!(&b[..], b"ab"),
            other => panic!("unexpected {other:?}"),
        }
        match stream.next().await {
            StreamItem::Event(RealtimeEvent::TranscriptDelta { text, .. }) => {
                assert_eq!(text, "hello")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(stream.next().await, StreamItem::Closed));
        assert!(stream.is_terminated());
    }

    #[tokio::test]
    async fn test_exhausted_source_is_clean_close() {
        let mut stream = stream_of(vec![text("audio:x")]);
        assert!(matches!(stream.next().await, StreamItem::Event(_)));
        assert!(matches!(stream.next().await, StreamItem::Closed));
        assert!(matches!(stream.next().await, StreamItem::Closed));
    }

    #[tokio::test]
    async fn test_failure_is_sticky() {
        let mut stream = stream_of(vec![
            Err(RealtimeError::Transport("reset by peer".into())),
            text("audio:never"),
        ]);

        match stream.next().await {
            StreamItem::Failed(RealtimeError::Transport(msg)) => assert_eq!(msg, "reset by peer"),
            other => panic!("unexpected {other:?}"),
        }
        match stream.next().await {
            StreamItem::Failed(RealtimeError::Transport(msg)) => assert_eq!(msg, "reset by peer"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
