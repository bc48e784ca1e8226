use log::*;
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::event::Event;
use crate::sink::EventSink;
use crate::wire;

/// Unique identifier for a connection (server-generated, used for logging)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One physical streaming attachment of a client to a stream.
///
/// Connections are shared as `Arc<Connection>` and compared by pointer
/// identity: two handles are the same connection only if `Arc::ptr_eq`
/// says so. The HTTP layer holding the request open waits on
/// [`cancelled`](Connection::cancelled) and releases the request when it
/// fires, either because a newer connection replaced this one or because a
/// write to it failed.
pub struct Connection {
    id: ConnectionId,
    sink: Mutex<Box<dyn EventSink>>,
    cancel: CancellationToken,
}

impl Connection {
    pub(crate) fn new(sink: Box<dyn EventSink>) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            sink: Mutex::new(sink),
            cancel: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            trace!("Cancelling connection {}", self.id);
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once the connection has been cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// A token tied to this connection, for request bodies that must be `'static`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Writes one framed event and flushes it.
    ///
    /// A cancelled connection refuses the write, and a write still pending
    /// when the connection is cancelled is abandoned. Either way the caller
    /// hands the event to whichever connection replaced this one.
    pub(crate) async fn deliver(&self, event: &Event) -> io::Result<()> {
        if self.is_cancelled() {
            return Err(Self::not_connected());
        }

        let mut sink = self.sink.lock().await;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Self::not_connected()),
            written = wire::write_event(sink.as_mut(), event) => written,
        }
    }

    fn not_connected() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "connection was cancelled")
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
