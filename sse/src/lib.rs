//! Server-Sent Events (SSE) delivery pool.
//!
//! This crate multiplexes server-generated events onto long-lived,
//! reconnectable `text/event-stream` responses, one logical channel per
//! thread (conversation/session).
//!
//! # Architecture
//!
//! - **Thread streams outlive connections**: producers post to a thread id
//!   whether or not a client is attached. Events wait in a bounded queue
//!   until a client attaches, and survive reconnects.
//! - **One current connection per thread**: attaching replaces (and cancels)
//!   the previous connection. The HTTP handler that owned the replaced
//!   connection observes the cancellation and ends its response.
//! - **Drop-oldest backpressure**: a full queue discards its oldest event to
//!   admit a new one. Producers never wait on clients.
//! - **One writer task per thread**: started on first attach, it retries a
//!   failed event on the next connection, so a reconnect loses nothing that
//!   was still queued.
//! - **Idle reaper**: threads without a connection, with nothing pending and
//!   no activity for a TTL are evicted periodically.
//!
//! # Message Flow
//!
//! 1. A producer calls `registry.post(thread_id, payload)`
//! 2. The registry finds or creates the thread's stream and queues the event
//! 3. A client's request handler calls `registry.attach(thread_id, sink)`
//! 4. The new connection becomes current and the writer starts (or resumes)
//!    writing `data: <payload>\n\n` frames to it
//! 5. On reconnect, step 3 repeats and the old request is released
//!
//! # Example
//!
//! ```rust,ignore
//! use sse::{ChannelSink, StreamRegistry};
//!
//! let registry = Arc::new(StreamRegistry::new(1024));
//! registry.start_cleanup(Duration::from_secs(3600), Duration::from_secs(3 * 3600));
//!
//! let (sink, body) = ChannelSink::new(16);
//! let connection = registry.attach("thread_1", sink).await?;
//! registry.post("thread_1", r#"{"status":"started"}"#);
//! ```
//!
//! # Modules
//!
//! - `registry`: thread id → stream map, attach/post/close and the reaper
//! - `stream`: per-thread queue, current connection and activity clock
//! - `writer`: the per-thread delivery loop
//! - `connection`: one physical attachment and its cancellation signal
//! - `queue`: bounded drop-oldest FIFO
//! - `sink`: the write-side trait and the channel-backed HTTP sink
//! - `wire`: `text/event-stream` framing and headers
//! - `global`: process-wide default registry

pub mod connection;
pub mod error;
pub mod event;
pub mod global;
pub mod queue;
pub mod registry;
pub mod sink;
pub mod stream;
pub mod wire;
mod writer;

#[cfg(test)]
mod test_support;

pub use connection::{Connection, ConnectionId};
pub use error::Error;
pub use event::{Event, ThreadId};
pub use registry::{
    StreamRegistry, DEFAULT_BUFFER_SIZE, DEFAULT_CLEANUP_INTERVAL, DEFAULT_IDLE_TTL,
};
pub use sink::{ChannelBody, ChannelSink, EventSink};
pub use stream::{EventStream, StreamStats};
