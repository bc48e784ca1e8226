use crate::{AppState, Error};
use async_stream::stream;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::Response;
use bytes::Bytes;
use log::*;
use sse::{ChannelSink, Connection, StreamRegistry};
use std::convert::Infallible;
use std::sync::Arc;

/// Flushed chunks that may wait between the thread's writer and the socket.
const BODY_CHANNEL_CAPACITY: usize = 16;

/// GET attach to a thread's event stream
#[utoipa::path(
    get,
    path = "/threads/{thread_id}/stream",
    params(
        ("thread_id" = String, Path, description = "Thread to attach to")
    ),
    responses(
        (status = 200, description = "text/event-stream of the thread's events", content_type = "text/event-stream", body = String),
        (status = 500, description = "Internal Server Error")
    )
)]
pub(crate) async fn stream_handler(
    State(app_state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Response, Error> {
    debug!("Establishing SSE connection for thread {thread_id}");

    open_stream(&app_state.sse_registry, thread_id).await
}

/// Attaches a new response to `thread_id` and returns it.
///
/// The response body ends when the connection is cancelled (a newer
/// connection attached, a write failed, or the thread was closed). When the
/// body is dropped, including because the client went away, the connection
/// is detached so the thread can become idle.
pub(crate) async fn open_stream(
    registry: &Arc<StreamRegistry>,
    thread_id: String,
) -> Result<Response, Error> {
    let (sink, body) = ChannelSink::new(BODY_CHANNEL_CAPACITY);
    let connection = registry.attach(&thread_id, sink).await?;

    let (headers, mut rx) = body.into_parts();
    let cancelled = connection.cancellation_token();
    let guard = DetachOnDrop {
        registry: Arc::clone(registry),
        thread_id,
        connection,
    };

    let stream = stream! {
        let _guard = guard;

        loop {
            let next = tokio::select! {
                biased;
                chunk = rx.recv() => chunk,
                _ = cancelled.cancelled() => None,
            };

            match next {
                Some(chunk) => yield Ok::<Bytes, Infallible>(chunk),
                None => break,
            }
        }

        // Chunks flushed before the cancellation still belong to this client
        while let Ok(chunk) = rx.try_recv() {
            yield Ok(chunk);
        }
    };

    let mut response = Response::new(Body::from_stream(stream));
    *response.headers_mut() = headers;
    Ok(response)
}

struct DetachOnDrop {
    registry: Arc<StreamRegistry>,
    thread_id: String,
    connection: Arc<Connection>,
}

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        debug!(
            "SSE connection {} closed for thread {}, cleaning up",
            self.connection.id(),
            self.thread_id
        );
        self.registry.detach(&self.thread_id, &self.connection);
    }
}
