//! `text/event-stream` framing.
//!
//! Every event goes out as `data: <payload>\n\n` followed by an explicit
//! flush, which is what a browser `EventSource` expects. The payload is
//! written verbatim: it is the producer's job to keep it free of newlines if
//! the client needs single-line events.

use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue};
use bytes::{BufMut, Bytes, BytesMut};
use std::io;

use crate::event::Event;
use crate::sink::EventSink;

pub const DATA_PREFIX: &[u8] = b"data: ";
pub const EVENT_TERMINATOR: &[u8] = b"\n\n";

/// Tells nginx-style proxies not to buffer the response.
pub const X_ACCEL_BUFFERING: &str = "x-accel-buffering";

/// Headers every attached response must carry before the first flush.
pub fn response_headers() -> [(HeaderName, HeaderValue); 4] {
    [
        (CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
        (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (CONNECTION, HeaderValue::from_static("keep-alive")),
        (
            HeaderName::from_static(X_ACCEL_BUFFERING),
            HeaderValue::from_static("no"),
        ),
    ]
}

pub(crate) fn write_headers(sink: &mut dyn EventSink) {
    for (name, value) in response_headers() {
        sink.set_header(name, value);
    }
}

/// Writes one framed event and flushes it through to the client.
pub async fn write_event(sink: &mut dyn EventSink, event: &Event) -> io::Result<()> {
    sink.write(DATA_PREFIX).await?;
    sink.write(event.data()).await?;
    sink.write(EVENT_TERMINATOR).await?;
    sink.flush().await
}

/// The exact bytes [`write_event`] puts on the wire for `event`.
pub fn encode(event: &Event) -> Bytes {
    let mut buf =
        BytesMut::with_capacity(DATA_PREFIX.len() + event.len() + EVENT_TERMINATOR.len());
    buf.put_slice(DATA_PREFIX);
    buf.put_slice(event.data());
    buf.put_slice(EVENT_TERMINATOR);
    buf.freeze()
}
