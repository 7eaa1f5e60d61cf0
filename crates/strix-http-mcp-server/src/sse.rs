//! Server-Sent Events framing and the streaming response body
//!
//! Wire format per event:
//! `id: <epoch-millis>\nevent: message\ndata: <json-one-line>\n\n`.
//! The stream opens with the `: connected` comment and emits `: ping`
//! comments at every idle poll boundary as keep-alives.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use http_body::{Body, Frame};
use serde_json::Value;
use tracing::debug;

use crate::session::{MessagePoll, Session, now_millis};

pub(crate) const SSE_CONNECTED: &str = ": connected\n\n";
pub(crate) const SSE_PING: &str = ": ping\n\n";

/// Format one queued message as a full SSE event block
pub(crate) fn sse_event(message: &Value) -> String {
    let payload = serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string());
    format!("id: {}\nevent: message\ndata: {}\n\n", now_millis(), payload)
}

/// Drain a session's queue into SSE frames until the session goes
/// inactive. Every delivered event and every keep-alive counts as
/// activity.
pub(crate) fn session_stream(
    session: Arc<Session>,
    poll: Duration,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream! {
        yield Ok(Bytes::from_static(SSE_CONNECTED.as_bytes()));

        while session.is_active() {
            match session.next_message(poll).await {
                MessagePoll::Message(message) => {
                    yield Ok(Bytes::from(sse_event(&message)));
                    session.touch();
                }
                MessagePoll::Idle => {
                    yield Ok(Bytes::from_static(SSE_PING.as_bytes()));
                    session.touch();
                }
                MessagePoll::Closed => break,
            }
        }

        debug!(session = %session.id(), "sse stream finished");
    }
}

/// SSE response body: adapts a `Stream` of byte chunks to hyper's `Body`
pub struct SseStreamBody {
    stream: Pin<Box<dyn Stream<Item = Result<Bytes, Infallible>> + Send>>,
}

impl SseStreamBody {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }
}

impl Body for SseStreamBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.stream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(data))) => Poll::Ready(Some(Ok(Frame::data(data)))),
            Poll::Ready(Some(Err(never))) => match never {},
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
