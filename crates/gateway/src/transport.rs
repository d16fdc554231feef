//! SSE framing for session events.
//!
//! Every [`SessionEvent`] becomes one frame whose `event:` field is the
//! event type and whose `data:` field is the event as JSON. After the
//! session's channel closes, a single `data: [DONE]` frame ends the stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use careers_agent::SessionEvent;
use careers_core::error::ErrorKind;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

/// Data payload of the end-of-stream frame.
pub const DONE_MARKER: &str = "[DONE]";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Convert one session event into an SSE frame.
///
/// An event that cannot be encoded is replaced by an `error` frame.
pub fn to_frame(event: &SessionEvent) -> SseEvent {
    match serde_json::to_string(event) {
        Ok(data) => SseEvent::default().event(event.event_type()).data(data),
        Err(e) => {
            warn!(event = event.event_type(), error = %e, "Failed to encode session event");
            encoding_error_frame(&e)
        }
    }
}

fn encoding_error_frame(error: &serde_json::Error) -> SseEvent {
    let body = serde_json::json!({
        "type": "error",
        "kind": ErrorKind::Internal,
        "message": format!("failed to encode event: {error}"),
        "retryable": false,
    });
    SseEvent::default().event("error").data(body.to_string())
}

/// Frame a session's events in channel order, then the end-of-stream marker.
pub fn frame_stream(
    rx: mpsc::Receiver<SessionEvent>,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    ReceiverStream::new(rx)
        .map(|event| Ok::<_, Infallible>(to_frame(&event)))
        .chain(tokio_stream::once(Ok(SseEvent::default().data(DONE_MARKER))))
}

/// The full SSE response for one run, with keep-alive comments while the
/// run is busy (long tool calls, slow providers).
pub fn sse_response(
    rx: mpsc::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    Sse::new(frame_stream(rx)).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
